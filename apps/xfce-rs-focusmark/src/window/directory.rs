use thiserror::Error;
use tracing::trace;

use crate::core::backend::{BackendError, WindowHandle, WindowSystem};

/// A directory read failed. Distinct from an empty answer so callers can
/// keep their previous view instead of concluding there are no windows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to read {property}: {source}")]
pub struct QueryError {
    pub property: &'static str,
    #[source]
    pub source: BackendError,
}

impl QueryError {
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// Read-only view of which windows exist and which one has focus.
pub struct WindowDirectory<'a, W: WindowSystem> {
    ws: &'a W,
}

impl<'a, W: WindowSystem> WindowDirectory<'a, W> {
    pub fn new(ws: &'a W) -> Self {
        Self { ws }
    }

    /// `Ok(None)` is a legitimate answer: nothing is focused.
    pub fn active_window(&self) -> Result<Option<WindowHandle>, QueryError> {
        let active = self
            .ws
            .active_window()
            .map_err(|source| QueryError { property: "_NET_ACTIVE_WINDOW", source })?;
        trace!("Active window: {:?}", active);
        Ok(active)
    }

    pub fn client_windows(&self) -> Result<Vec<WindowHandle>, QueryError> {
        let clients = self
            .ws
            .client_windows()
            .map_err(|source| QueryError { property: "_NET_CLIENT_LIST", source })?;
        trace!("{} client windows", clients.len());
        Ok(clients)
    }

    /// Best-effort window title, only used to make logs readable.
    pub fn describe(&self, window: WindowHandle) -> String {
        match self.ws.window_name(window) {
            Ok(Some(name)) => format!("{} \"{}\"", window, name),
            _ => window.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::mock::MockWindowSystem;

    #[test]
    fn test_no_focus_is_not_an_error() {
        let ws = MockWindowSystem::new();
        ws.add_window(WindowHandle(1), 800, 600);
        ws.set_clients(&[1]);

        let directory = WindowDirectory::new(&ws);
        assert_eq!(directory.active_window(), Ok(None));
        assert_eq!(directory.client_windows(), Ok(vec![WindowHandle(1)]));
    }

    #[test]
    fn test_read_failure_is_distinct_from_empty() {
        let ws = MockWindowSystem::new();
        ws.fail_queries(true);

        let directory = WindowDirectory::new(&ws);
        let err = directory.client_windows().unwrap_err();
        assert_eq!(err.property, "_NET_CLIENT_LIST");
        assert!(!err.is_fatal());
        assert!(directory.active_window().is_err());
    }

    #[test]
    fn test_describe_includes_name_when_known() {
        let ws = MockWindowSystem::new();
        ws.add_window(WindowHandle(0x10), 100, 100);
        ws.set_name(WindowHandle(0x10), "Terminal");

        let directory = WindowDirectory::new(&ws);
        assert_eq!(directory.describe(WindowHandle(0x10)), "0x00000010 \"Terminal\"");
        assert_eq!(directory.describe(WindowHandle(0x11)), "0x00000011");
    }
}
