use tracing::{debug, trace};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::render::{Color, ConnectionExt as RenderExt, CreatePictureAux, PictOp};
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::{
    AtomEnum, ClipOrdering, ConfigureWindowAux, ConnectionExt, CreateWindowAux, StackMode,
    Window, WindowClass,
};
use x11rb::protocol::{ErrorKind, Event};

use crate::config::Rgba;
use crate::core::backend::{
    BackendError, ContextId, Notification, Rect, SurfaceId, WindowHandle, WindowSystem,
};
use crate::core::context::Context;
use crate::ewmh::atoms::AtomCollection;

/// Longest property value read, in 32-bit units.
const MAX_PROPERTY_LENGTH: u32 = 4096;

fn connection_error(e: ConnectionError) -> BackendError {
    BackendError::Connection(e.to_string())
}

fn reply_error(request: &'static str, window: Option<WindowHandle>, e: ReplyError) -> BackendError {
    match e {
        ReplyError::ConnectionError(e) => connection_error(e),
        ReplyError::X11Error(e) => match (e.error_kind, window) {
            (ErrorKind::Window | ErrorKind::Drawable, Some(window)) => BackendError::WindowGone(window),
            _ => BackendError::Protocol { request, reason: format!("{:?}", e.error_kind) },
        },
    }
}

fn id_error(request: &'static str, e: ReplyOrIdError) -> BackendError {
    match e {
        ReplyOrIdError::ConnectionError(e) => connection_error(e),
        other => BackendError::Protocol { request, reason: other.to_string() },
    }
}

/// Reduce a raw event to what the engine acts on: a change of
/// `_NET_ACTIVE_WINDOW` on the root, or our own shutdown message.
fn classify(event: &Event, root: Window, control: Window, atoms: &AtomCollection) -> Notification {
    match event {
        Event::PropertyNotify(e) if e.window == root && e.atom == atoms._NET_ACTIVE_WINDOW => {
            Notification::ActiveWindowChanged
        }
        Event::ClientMessage(e) if e.window == control && e.type_ == atoms.FOCUSMARK_SHUTDOWN => {
            Notification::Shutdown
        }
        Event::Error(e) => {
            debug!("Asynchronous X11 error: {:?} (major {})", e.error_kind, e.major_opcode);
            Notification::Ignored
        }
        other => {
            trace!("Ignoring event {:?}", other);
            Notification::Ignored
        }
    }
}

impl Context {
    fn read_windows(&self, property: u32) -> Result<Vec<WindowHandle>, BackendError> {
        let reply = self
            .conn
            .get_property(false, self.root_window, property, AtomEnum::WINDOW, 0, MAX_PROPERTY_LENGTH)
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetProperty", None, e))?;

        // An unset property comes back with format 0 and no value.
        Ok(reply
            .value32()
            .map(|values| values.filter(|&w| w != x11rb::NONE).map(WindowHandle).collect::<Vec<_>>())
            .unwrap_or_default())
    }

    fn read_text(&self, window: WindowHandle, property: u32, type_: u32) -> Result<Option<String>, BackendError> {
        let reply = self
            .conn
            .get_property(false, window.0, property, type_, 0, MAX_PROPERTY_LENGTH)
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetProperty", Some(window), e))?;
        if reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    }
}

impl WindowSystem for Context {
    fn active_window(&self) -> Result<Option<WindowHandle>, BackendError> {
        Ok(self.read_windows(self.atoms._NET_ACTIVE_WINDOW)?.into_iter().next())
    }

    fn client_windows(&self) -> Result<Vec<WindowHandle>, BackendError> {
        self.read_windows(self.atoms._NET_CLIENT_LIST)
    }

    fn geometry(&self, window: WindowHandle) -> Result<Rect, BackendError> {
        let geom = self
            .conn
            .get_geometry(window.0)
            .map_err(connection_error)?
            .reply()
            .map_err(|e| reply_error("GetGeometry", Some(window), e))?;
        Ok(Rect::new(geom.x, geom.y, geom.width, geom.height))
    }

    fn window_name(&self, window: WindowHandle) -> Result<Option<String>, BackendError> {
        if let Some(name) = self.read_text(window, self.atoms._NET_WM_NAME, self.atoms.UTF8_STRING)? {
            return Ok(Some(name));
        }
        self.read_text(window, AtomEnum::WM_NAME.into(), AtomEnum::ANY.into())
    }

    fn create_child_window(
        &self,
        parent: WindowHandle,
        rect: Rect,
        background: Rgba,
    ) -> Result<WindowHandle, BackendError> {
        let window = self.conn.generate_id().map_err(|e| id_error("CreateWindow", e))?;
        let values = CreateWindowAux::new()
            .background_pixel(background.argb_pixel())
            .border_pixel(0)
            .colormap(self.colormap);

        self.conn
            .create_window(
                self.depth,
                window,
                parent.0,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                0,
                WindowClass::INPUT_OUTPUT,
                self.visual,
                &values,
            )
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("CreateWindow", Some(parent), e))?;
        let overlay = WindowHandle(window);

        if self.has_shape {
            // Empty input region: pointer events fall through to the target.
            let shaped = self
                .conn
                .shape_rectangles(SO::SET, SK::INPUT, ClipOrdering::UNSORTED, window, 0, 0, &[])
                .map_err(connection_error)?
                .check();
            if let Err(e) = shaped {
                debug!("Could not clear input shape of {}: {}", overlay, e);
            }
        }

        Ok(overlay)
    }

    fn map_window(&self, window: WindowHandle) -> Result<(), BackendError> {
        self.conn
            .configure_window(window.0, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .map_err(connection_error)?;
        self.conn
            .map_window(window.0)
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("MapWindow", Some(window), e))
    }

    fn destroy_window(&self, window: WindowHandle) -> Result<(), BackendError> {
        self.conn
            .destroy_window(window.0)
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("DestroyWindow", Some(window), e))
    }

    fn create_surface(&self, window: WindowHandle) -> Result<SurfaceId, BackendError> {
        let picture = self.conn.generate_id().map_err(|e| id_error("CreatePicture", e))?;
        self.conn
            .render_create_picture(picture, window.0, self.pict_format, &CreatePictureAux::new())
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("CreatePicture", Some(window), e))?;
        Ok(SurfaceId(picture))
    }

    fn create_context(&self, _surface: SurfaceId, color: Rgba) -> Result<ContextId, BackendError> {
        let [red, green, blue, alpha] = color.premultiplied16();
        let picture = self.conn.generate_id().map_err(|e| id_error("CreateSolidFill", e))?;
        self.conn
            .render_create_solid_fill(picture, Color { red, green, blue, alpha })
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("CreateSolidFill", None, e))?;
        Ok(ContextId(picture))
    }

    fn fill_rectangle(&self, context: ContextId, surface: SurfaceId, rect: Rect) -> Result<(), BackendError> {
        self.conn
            .render_composite(
                PictOp::SRC,
                context.0,
                x11rb::NONE,
                surface.0,
                0, 0,
                0, 0,
                rect.x, rect.y,
                rect.width, rect.height,
            )
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("Composite", None, e))
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.conn.flush().map_err(connection_error)
    }

    fn destroy_context(&self, context: ContextId) -> Result<(), BackendError> {
        self.conn
            .render_free_picture(context.0)
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("FreePicture", None, e))
    }

    fn destroy_surface(&self, surface: SurfaceId) -> Result<(), BackendError> {
        self.conn
            .render_free_picture(surface.0)
            .map_err(connection_error)?
            .check()
            .map_err(|e| reply_error("FreePicture", None, e))
    }

    fn next_notification(&self) -> Result<Notification, BackendError> {
        self.conn.flush().map_err(connection_error)?;
        let event = self.conn.wait_for_event().map_err(connection_error)?;
        Ok(classify(&event, self.root_window, self.control_window, &self.atoms))
    }

    fn release(&self) -> Result<(), BackendError> {
        self.conn
            .destroy_window(self.control_window)
            .map_err(connection_error)?;
        self.conn
            .free_colormap(self.colormap)
            .map_err(connection_error)?;
        self.conn.flush().map_err(connection_error)
    }
}
