//! In-memory window system that records every request, for engine tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::Rgba;
use crate::core::backend::{
    BackendError, ContextId, Notification, Rect, SurfaceId, WindowHandle, WindowSystem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateWindow { parent: WindowHandle, rect: Rect },
    Map(WindowHandle),
    DestroyWindow(WindowHandle),
    CreateSurface(WindowHandle),
    CreateContext { surface: SurfaceId, color: Rgba },
    Fill { context: ContextId, surface: SurfaceId, rect: Rect },
    Flush,
    DestroyContext(ContextId),
    DestroySurface(SurfaceId),
    Release,
}

/// Point during overlay creation at which the target can be made to vanish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Map,
    CreateSurface,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveOverlay {
    pub parent: WindowHandle,
    pub rect: Rect,
    pub color: Rgba,
    pub mapped: bool,
}

#[derive(Default)]
struct State {
    targets: HashMap<WindowHandle, Rect>,
    names: HashMap<WindowHandle, String>,
    active: Option<WindowHandle>,
    clients: Vec<WindowHandle>,
    overlays: BTreeMap<WindowHandle, LiveOverlay>,
    surfaces: HashMap<SurfaceId, WindowHandle>,
    contexts: HashMap<ContextId, Rgba>,
    next_id: u32,
    calls: Vec<Call>,
    notifications: VecDeque<Notification>,
    fail_queries: bool,
    disconnected: bool,
    close_target_at: Option<Step>,
    released: bool,
}

impl State {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        0x0100_0000 + self.next_id
    }

    fn close(&mut self, target: WindowHandle) {
        self.targets.remove(&target);
        let children: Vec<_> = self
            .overlays
            .iter()
            .filter(|(_, o)| o.parent == target)
            .map(|(&w, _)| w)
            .collect();
        for child in children {
            self.overlays.remove(&child);
            self.surfaces.retain(|_, w| *w != child);
        }
    }

    fn maybe_close_parent_of(&mut self, step: Step, window: WindowHandle) {
        if self.close_target_at == Some(step) {
            self.close_target_at = None;
            if let Some(parent) = self.overlays.get(&window).map(|o| o.parent) {
                self.close(parent);
            }
        }
    }
}

pub struct MockWindowSystem {
    state: RefCell<State>,
}

impl MockWindowSystem {
    pub fn new() -> Self {
        Self { state: RefCell::new(State::default()) }
    }

    pub fn add_window(&self, window: WindowHandle, width: u16, height: u16) {
        self.state.borrow_mut().targets.insert(window, Rect::new(10, 10, width, height));
    }

    pub fn set_name(&self, window: WindowHandle, name: &str) {
        self.state.borrow_mut().names.insert(window, name.to_string());
    }

    pub fn set_active(&self, active: Option<u32>) {
        self.state.borrow_mut().active = active.map(WindowHandle);
    }

    pub fn set_clients(&self, clients: &[u32]) {
        self.state.borrow_mut().clients = clients.iter().copied().map(WindowHandle).collect();
    }

    pub fn fail_queries(&self, fail: bool) {
        self.state.borrow_mut().fail_queries = fail;
    }

    pub fn disconnect(&self) {
        self.state.borrow_mut().disconnected = true;
    }

    /// The window disappears, taking any overlay children with it. The
    /// directory still lists it, as it would right after the close.
    pub fn close_window(&self, window: WindowHandle) {
        self.state.borrow_mut().close(window);
    }

    pub fn close_target_at(&self, step: Step) {
        self.state.borrow_mut().close_target_at = Some(step);
    }

    pub fn push_notification(&self, notification: Notification) {
        self.state.borrow_mut().notifications.push_back(notification);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn is_mapped(&self, window: WindowHandle) -> bool {
        self.state.borrow().overlays.get(&window).map_or(false, |o| o.mapped)
    }

    pub fn parent_of(&self, window: WindowHandle) -> Option<WindowHandle> {
        self.state.borrow().overlays.get(&window).map(|o| o.parent)
    }

    /// Overlay windows, surfaces and contexts not yet released.
    pub fn live_resources(&self) -> usize {
        let state = self.state.borrow();
        state.overlays.len() + state.surfaces.len() + state.contexts.len()
    }

    pub fn mapped_overlays(&self) -> usize {
        self.state.borrow().overlays.values().filter(|o| o.mapped).count()
    }

    /// Live overlays sorted by parent, for comparing whole-screen outcomes.
    pub fn live_overlays(&self) -> Vec<LiveOverlay> {
        let mut overlays: Vec<_> = self.state.borrow().overlays.values().cloned().collect();
        overlays.sort_by_key(|o| (o.parent, o.rect.x, o.rect.y));
        overlays
    }

    pub fn released(&self) -> bool {
        self.state.borrow().released
    }

    fn begin(&self, call: Option<Call>) -> Result<std::cell::RefMut<'_, State>, BackendError> {
        let mut state = self.state.borrow_mut();
        if state.disconnected {
            return Err(BackendError::Connection("mock disconnected".into()));
        }
        if let Some(call) = call {
            state.calls.push(call);
        }
        Ok(state)
    }
}

impl WindowSystem for MockWindowSystem {
    fn active_window(&self) -> Result<Option<WindowHandle>, BackendError> {
        let state = self.begin(None)?;
        if state.fail_queries {
            return Err(BackendError::Protocol { request: "GetProperty", reason: "Value".into() });
        }
        Ok(state.active)
    }

    fn client_windows(&self) -> Result<Vec<WindowHandle>, BackendError> {
        let state = self.begin(None)?;
        if state.fail_queries {
            return Err(BackendError::Protocol { request: "GetProperty", reason: "Value".into() });
        }
        Ok(state.clients.clone())
    }

    fn geometry(&self, window: WindowHandle) -> Result<Rect, BackendError> {
        let state = self.begin(None)?;
        state.targets.get(&window).copied().ok_or(BackendError::WindowGone(window))
    }

    fn window_name(&self, window: WindowHandle) -> Result<Option<String>, BackendError> {
        let state = self.begin(None)?;
        if !state.targets.contains_key(&window) {
            return Err(BackendError::WindowGone(window));
        }
        Ok(state.names.get(&window).cloned())
    }

    fn create_child_window(
        &self,
        parent: WindowHandle,
        rect: Rect,
        background: Rgba,
    ) -> Result<WindowHandle, BackendError> {
        let mut state = self.begin(Some(Call::CreateWindow { parent, rect }))?;
        if !state.targets.contains_key(&parent) {
            return Err(BackendError::WindowGone(parent));
        }
        let window = WindowHandle(state.allocate());
        state.overlays.insert(window, LiveOverlay { parent, rect, color: background, mapped: false });
        Ok(window)
    }

    fn map_window(&self, window: WindowHandle) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::Map(window)))?;
        state.maybe_close_parent_of(Step::Map, window);
        let overlay = state.overlays.get_mut(&window).ok_or(BackendError::WindowGone(window))?;
        overlay.mapped = true;
        Ok(())
    }

    fn destroy_window(&self, window: WindowHandle) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::DestroyWindow(window)))?;
        state.overlays.remove(&window).map(|_| ()).ok_or(BackendError::WindowGone(window))
    }

    fn create_surface(&self, window: WindowHandle) -> Result<SurfaceId, BackendError> {
        let mut state = self.begin(Some(Call::CreateSurface(window)))?;
        state.maybe_close_parent_of(Step::CreateSurface, window);
        if !state.overlays.contains_key(&window) {
            return Err(BackendError::WindowGone(window));
        }
        let surface = SurfaceId(state.allocate());
        state.surfaces.insert(surface, window);
        Ok(surface)
    }

    fn create_context(&self, surface: SurfaceId, color: Rgba) -> Result<ContextId, BackendError> {
        let mut state = self.begin(Some(Call::CreateContext { surface, color }))?;
        let context = ContextId(state.allocate());
        state.contexts.insert(context, color);
        Ok(context)
    }

    fn fill_rectangle(&self, context: ContextId, surface: SurfaceId, rect: Rect) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::Fill { context, surface, rect }))?;
        let window = state.surfaces.get(&surface).copied();
        if let Some(window) = window {
            state.maybe_close_parent_of(Step::Fill, window);
        }
        if !state.contexts.contains_key(&context) {
            return Err(BackendError::Protocol { request: "Composite", reason: "Picture".into() });
        }
        match state.surfaces.get(&surface) {
            Some(_) => Ok(()),
            None => Err(BackendError::WindowGone(WindowHandle(surface.0))),
        }
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.begin(Some(Call::Flush)).map(|_| ())
    }

    fn destroy_context(&self, context: ContextId) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::DestroyContext(context)))?;
        state
            .contexts
            .remove(&context)
            .map(|_| ())
            .ok_or(BackendError::Protocol { request: "FreePicture", reason: "Picture".into() })
    }

    fn destroy_surface(&self, surface: SurfaceId) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::DestroySurface(surface)))?;
        state
            .surfaces
            .remove(&surface)
            .map(|_| ())
            .ok_or(BackendError::Protocol { request: "FreePicture", reason: "Picture".into() })
    }

    fn next_notification(&self) -> Result<Notification, BackendError> {
        let mut state = self.begin(None)?;
        // An exhausted script ends the session.
        Ok(state.notifications.pop_front().unwrap_or(Notification::Shutdown))
    }

    fn release(&self) -> Result<(), BackendError> {
        let mut state = self.begin(Some(Call::Release))?;
        state.released = true;
        Ok(())
    }
}
