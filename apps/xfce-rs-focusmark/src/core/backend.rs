//! The seam between the engine and the display server.
//!
//! Everything the engine needs from the windowing system goes through
//! [`WindowSystem`]. The X11 session in [`crate::core::x11`] is the production
//! implementation; tests drive the engine through a recording mock.

use std::fmt;

use thiserror::Error;

use crate::config::Rgba;

/// A top-level window (or one of our overlay windows) on the display server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u32);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// A rendering surface bound to an overlay window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// A rendering context (paint source) attached to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

/// Position and size, either of a window relative to its parent or of an
/// overlay relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// The same size anchored at the origin.
    pub fn at_origin(&self) -> Self {
        Self { x: 0, y: 0, ..*self }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the notification stream delivered, already filtered down to the
/// cases the engine distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The active-window property on the root window changed.
    ActiveWindowChanged,
    /// Anything else: unrelated property changes, protocol errors from
    /// unchecked requests, events for other windows.
    Ignored,
    /// The process was asked to stop.
    Shutdown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("window {0} no longer exists")]
    WindowGone(WindowHandle),

    #[error("request {request} failed: {reason}")]
    Protocol { request: &'static str, reason: String },

    #[error("connection to the display server lost: {0}")]
    Connection(String),
}

impl BackendError {
    /// A broken connection cannot be recovered from; everything else only
    /// affects the window or request at hand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

/// Synchronous round-trips to the windowing system.
///
/// All methods take `&self`: a session is a shared handle and the engine never
/// needs exclusive access to issue requests.
pub trait WindowSystem {
    /// Value of the root window's active-window property. `None` when no
    /// window is focused.
    fn active_window(&self) -> Result<Option<WindowHandle>, BackendError>;

    /// Top-level client windows in the order reported by the window manager.
    fn client_windows(&self) -> Result<Vec<WindowHandle>, BackendError>;

    /// Current geometry of `window` relative to its parent.
    fn geometry(&self, window: WindowHandle) -> Result<Rect, BackendError>;

    fn window_name(&self, window: WindowHandle) -> Result<Option<String>, BackendError>;

    /// Create a borderless, input-transparent child of `parent`. The window is
    /// not mapped yet.
    fn create_child_window(
        &self,
        parent: WindowHandle,
        rect: Rect,
        background: Rgba,
    ) -> Result<WindowHandle, BackendError>;

    /// Map `window` and raise it above its siblings.
    fn map_window(&self, window: WindowHandle) -> Result<(), BackendError>;

    fn destroy_window(&self, window: WindowHandle) -> Result<(), BackendError>;

    fn create_surface(&self, window: WindowHandle) -> Result<SurfaceId, BackendError>;

    fn create_context(&self, surface: SurfaceId, color: Rgba) -> Result<ContextId, BackendError>;

    /// Paint `rect` of `surface` with the context's color.
    fn fill_rectangle(
        &self,
        context: ContextId,
        surface: SurfaceId,
        rect: Rect,
    ) -> Result<(), BackendError>;

    fn flush(&self) -> Result<(), BackendError>;

    fn destroy_context(&self, context: ContextId) -> Result<(), BackendError>;

    fn destroy_surface(&self, surface: SurfaceId) -> Result<(), BackendError>;

    /// Block until the next notification.
    fn next_notification(&self) -> Result<Notification, BackendError>;

    /// Release session-wide resources. Called once on termination.
    fn release(&self) -> Result<(), BackendError>;
}
