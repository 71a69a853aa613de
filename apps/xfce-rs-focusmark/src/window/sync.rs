use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::core::backend::{BackendError, Notification, WindowHandle, WindowSystem};
use crate::window::directory::{QueryError, WindowDirectory};
use crate::window::error::{self, ErrorCategory, ErrorTracker};
use crate::window::inactive::compute_inactive;
use crate::window::overlay::{Overlay, OverlayError, OverlayManager};
use crate::window::placement::Placement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Rebuilding,
    Terminated,
}

/// Overlays currently on screen.
///
/// Tracked windows are derived from the overlays themselves, so the active
/// overlay exists exactly when there is a tracked active window and every
/// inactive window has exactly one overlay.
#[derive(Debug, Default)]
pub struct EngineState {
    active: Option<Overlay>,
    inactive: Vec<Overlay>,
}

impl EngineState {
    pub fn active_window(&self) -> Option<WindowHandle> {
        self.active.as_ref().map(|o| o.target)
    }

    #[cfg(test)]
    pub fn active_overlay(&self) -> Option<&Overlay> {
        self.active.as_ref()
    }

    pub fn inactive_windows(&self) -> Vec<WindowHandle> {
        self.inactive.iter().map(|o| o.target).collect()
    }

    #[cfg(test)]
    pub fn inactive_overlays(&self) -> &[Overlay] {
        &self.inactive
    }
}

/// What the directory looked like at the start of a rebuild.
struct Snapshot {
    active: Option<WindowHandle>,
    /// `None` when inactive windows are not tracked.
    clients: Option<Vec<WindowHandle>>,
}

/// Keeps the overlays in step with window focus.
pub struct SyncController<'a, W: WindowSystem> {
    ws: &'a W,
    directory: WindowDirectory<'a, W>,
    overlays: OverlayManager<'a, W>,
    config: Configuration,
    state: EngineState,
    phase: Phase,
    errors: ErrorTracker,
}

impl<'a, W: WindowSystem> SyncController<'a, W> {
    pub fn new(ws: &'a W, config: Configuration) -> Self {
        Self {
            ws,
            directory: WindowDirectory::new(ws),
            overlays: OverlayManager::new(ws),
            config,
            state: EngineState::default(),
            phase: Phase::Uninitialized,
            errors: ErrorTracker::new(),
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[cfg(test)]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[cfg(test)]
    pub fn errors(&self) -> &ErrorTracker {
        &self.errors
    }

    /// Build the initial overlays.
    pub fn start(&mut self) -> Result<(), BackendError> {
        debug_assert_eq!(self.phase, Phase::Uninitialized);
        self.resync()?;
        // A failed first read still leaves us ready to wait for the next change.
        self.phase = Phase::Ready;
        info!(
            "Tracking focus: active={:?}, {} inactive overlays",
            self.state.active_window(),
            self.state.inactive.len()
        );
        Ok(())
    }

    /// Process notifications until shutdown is requested or the connection
    /// breaks.
    pub fn run(&mut self) -> Result<(), BackendError> {
        loop {
            let notification = self.ws.next_notification()?;
            let rebuild = notification == Notification::ActiveWindowChanged;
            if !self.handle(notification)? {
                return Ok(());
            }

            if rebuild {
                if let Some(health) = self.errors.newly_degraded() {
                    warn!(
                        "Tracking degraded: {} query errors, {} overlay errors, {} release errors",
                        health.query_errors, health.overlay_errors, health.release_errors
                    );
                }
            }
        }
    }

    /// Returns `false` once the loop should stop.
    pub fn handle(&mut self, notification: Notification) -> Result<bool, BackendError> {
        match notification {
            Notification::ActiveWindowChanged => {
                self.resync()?;
                Ok(true)
            }
            Notification::Ignored => Ok(true),
            Notification::Shutdown => {
                info!("Shutdown requested");
                Ok(false)
            }
        }
    }

    /// Tear down and rebuild every overlay against the current directory.
    ///
    /// The directory is read before anything is destroyed: if a read fails
    /// the previous overlays stay up until the next notification.
    pub fn resync(&mut self) -> Result<(), BackendError> {
        let snapshot = match self.read_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_fatal() => return Err(e.source),
            Err(e) => {
                self.errors.record(ErrorCategory::Query, "resync", e);
                return Ok(());
            }
        };

        self.phase = Phase::Rebuilding;

        if let Some(overlay) = self.state.active.take() {
            self.destroy(overlay);
        }
        if let Some(active) = snapshot.active {
            self.state.active = self.build(active, Placement::Active)?;
        }

        if let Some(clients) = snapshot.clients {
            for overlay in std::mem::take(&mut self.state.inactive) {
                self.destroy(overlay);
            }
            for window in compute_inactive(&clients, snapshot.active) {
                if let Some(overlay) = self.build(window, Placement::Inactive)? {
                    self.state.inactive.push(overlay);
                }
            }
        }

        self.errors.release(self.ws.flush(), "flush");
        self.phase = Phase::Ready;
        debug!(
            "Resynced: active={:?}, inactive={:?}",
            self.state.active_window(),
            self.state.inactive_windows()
        );
        Ok(())
    }

    /// Destroy every overlay and release the session. Safe to call once the
    /// loop has stopped for any reason.
    pub fn terminate(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }
        if let Some(overlay) = self.state.active.take() {
            self.destroy(overlay);
        }
        for overlay in std::mem::take(&mut self.state.inactive) {
            self.destroy(overlay);
        }
        self.errors.release(self.ws.release(), "release session");
        self.phase = Phase::Terminated;
        error::report(&self.errors);
        info!("Overlays removed");
    }

    fn read_snapshot(&self) -> Result<Snapshot, QueryError> {
        let active = self.directory.active_window()?;
        let clients = if self.config.track_inactive() {
            Some(self.directory.client_windows()?)
        } else {
            None
        };
        Ok(Snapshot { active, clients })
    }

    /// `Ok(None)` when this one window could not get an overlay; only a lost
    /// connection aborts the rebuild.
    fn build(&self, window: WindowHandle, placement: Placement) -> Result<Option<Overlay>, BackendError> {
        let color = match placement {
            Placement::Active => self.config.active_color,
            Placement::Inactive => match self.config.inactive_color {
                Some(color) => color,
                None => return Ok(None),
            },
        };

        match self.overlays.create(window, color, self.config.marker, placement) {
            Ok(overlay) => Ok(Some(overlay)),
            Err(OverlayError::Backend(e)) if e.is_fatal() => Err(e),
            Err(e @ (OverlayError::TargetGone(_) | OverlayError::EmptyGeometry(_))) => {
                debug!("Skipping {}: {}", self.directory.describe(window), e);
                Ok(None)
            }
            Err(e) => {
                self.errors.record(ErrorCategory::Overlay, "create overlay", e);
                Ok(None)
            }
        }
    }

    fn destroy(&self, overlay: Overlay) {
        self.errors.release(self.overlays.destroy(overlay), "destroy overlay");
    }
}
