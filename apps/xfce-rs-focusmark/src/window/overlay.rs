use thiserror::Error;
use tracing::debug;

use crate::config::{MarkerSize, Rgba};
use crate::core::backend::{BackendError, ContextId, Rect, SurfaceId, WindowHandle, WindowSystem};
use crate::window::placement::Placement;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error("target window {0} is gone")]
    TargetGone(WindowHandle),

    #[error("target window {0} has no visible area")]
    EmptyGeometry(WindowHandle),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl OverlayError {
    #[cfg(test)]
    pub fn is_fatal(&self) -> bool {
        matches!(self, OverlayError::Backend(e) if e.is_fatal())
    }
}

/// A colored marker attached to one tracked window.
///
/// The context, surface and window are released together, in that order,
/// by [`OverlayManager::destroy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub target: WindowHandle,
    pub window: WindowHandle,
    pub surface: SurfaceId,
    pub context: ContextId,
    /// Relative to the target.
    pub geometry: Rect,
    pub color: Rgba,
}

pub struct OverlayManager<'a, W: WindowSystem> {
    ws: &'a W,
}

impl<'a, W: WindowSystem> OverlayManager<'a, W> {
    pub fn new(ws: &'a W) -> Self {
        Self { ws }
    }

    /// Create, map and paint an overlay on `target`. The overlay is visible
    /// when this returns. On failure nothing from this attempt is left behind.
    pub fn create(
        &self,
        target: WindowHandle,
        color: Rgba,
        size: MarkerSize,
        placement: Placement,
    ) -> Result<Overlay, OverlayError> {
        let target_geometry = self.ws.geometry(target).map_err(|e| gone_or(target, e))?;
        let geometry = placement.resolve(target_geometry, size);
        if geometry.is_empty() {
            return Err(OverlayError::EmptyGeometry(target));
        }

        let window = self
            .ws
            .create_child_window(target, geometry, color)
            .map_err(|e| gone_or(target, e))?;

        if let Err(e) = self.ws.map_window(window) {
            self.release(None, None, window);
            return Err(gone_or(target, e));
        }

        let surface = match self.ws.create_surface(window) {
            Ok(surface) => surface,
            Err(e) => {
                self.release(None, None, window);
                return Err(gone_or(target, e));
            }
        };

        let context = match self.ws.create_context(surface, color) {
            Ok(context) => context,
            Err(e) => {
                self.release(None, Some(surface), window);
                return Err(gone_or(target, e));
            }
        };

        let painted = self
            .ws
            .fill_rectangle(context, surface, geometry.at_origin())
            .and_then(|_| self.ws.flush());
        if let Err(e) = painted {
            self.release(Some(context), Some(surface), window);
            return Err(gone_or(target, e));
        }

        debug!("Overlay {} on {} at {:?} ({:?})", window, target, geometry, placement);
        Ok(Overlay { target, window, surface, context, geometry, color })
    }

    /// Release the overlay's context, surface and window, in that order.
    /// Every step is attempted; the first failure is returned.
    pub fn destroy(&self, overlay: Overlay) -> Result<(), BackendError> {
        let results = [
            self.ws.destroy_context(overlay.context),
            self.ws.destroy_surface(overlay.surface),
            self.ws.destroy_window(overlay.window),
        ];
        let mut first = None;
        for err in results.into_iter().filter_map(Result::err) {
            debug!("Teardown of overlay {} on {}: {}", overlay.window, overlay.target, err);
            first.get_or_insert(err);
        }
        first.map_or(Ok(()), Err)
    }

    fn release(&self, context: Option<ContextId>, surface: Option<SurfaceId>, window: WindowHandle) {
        if let Some(context) = context {
            if let Err(e) = self.ws.destroy_context(context) {
                debug!("Cleanup of context {:?}: {}", context, e);
            }
        }
        if let Some(surface) = surface {
            if let Err(e) = self.ws.destroy_surface(surface) {
                debug!("Cleanup of surface {:?}: {}", surface, e);
            }
        }
        if let Err(e) = self.ws.destroy_window(window) {
            debug!("Cleanup of window {}: {}", window, e);
        }
    }
}

/// Any trace of the target disappearing maps to `TargetGone`, including our
/// own child window vanishing along with it.
fn gone_or(target: WindowHandle, e: BackendError) -> OverlayError {
    match e {
        BackendError::WindowGone(_) => OverlayError::TargetGone(target),
        other => OverlayError::Backend(other),
    }
}
