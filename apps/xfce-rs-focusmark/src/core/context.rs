use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use tracing::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::render::{ConnectionExt as RenderExt, PictType, Pictformat};
use x11rb::protocol::shape::ConnectionExt as ShapeExt;
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, ClientMessageEvent, ColormapAlloc, ConnectionExt, CreateWindowAux,
    EventMask, Screen, VisualClass, Visualid, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;

use crate::ewmh::atoms::AtomCollection;

/// A live session with the X server: the one connection every component
/// shares, plus the per-session resources overlays are created with.
pub struct Context {
    pub conn: Arc<RustConnection>,
    pub screen_num: usize,
    pub root_window: Window,
    pub atoms: AtomCollection,
    /// 32-bit TrueColor visual used for every overlay window.
    pub visual: Visualid,
    pub depth: u8,
    pub colormap: u32,
    /// RENDER picture format matching `visual`.
    pub pict_format: Pictformat,
    /// Unmapped window that receives our own shutdown message.
    pub control_window: Window,
    pub has_shape: bool,
}

impl Context {
    pub fn new(display: Option<&str>) -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(display).map_err(|e| anyhow!("failed to open display: {}", e))?;
        let screen = &conn.setup().roots[screen_num];
        let root_window = screen.root;

        let atoms = AtomCollection::new(&conn)?.reply()?;

        let (visual, depth) = find_argb_visual(screen).ok_or_else(|| anyhow!("32-bit color not supported"))?;

        conn.render_query_version(0, 11)?
            .reply()
            .context("RENDER extension not available")?;
        let pict_format = find_format(&conn, visual)?;

        let has_shape = match conn.shape_query_version() {
            Ok(cookie) => cookie.reply().is_ok(),
            Err(_) => false,
        };
        if !has_shape {
            info!("SHAPE extension missing, overlays will not be input-transparent");
        }

        let colormap = conn.generate_id()?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root_window, visual)?;

        // Only property changes on the root are interesting: that is where
        // the window manager publishes the active window.
        conn.change_window_attributes(
            root_window,
            &ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE),
        )?
        .check()?;

        let control_window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            control_window,
            root_window,
            -1, -1, 1, 1, 0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        conn.flush()?;

        debug!(
            "Session ready: screen {}, root 0x{:x}, visual 0x{:x}, format 0x{:x}",
            screen_num, root_window, visual, pict_format
        );

        Ok(Self {
            conn: Arc::new(conn),
            screen_num,
            root_window,
            atoms,
            visual,
            depth,
            colormap,
            pict_format,
            control_window,
            has_shape,
        })
    }

    /// A handle other threads can use to stop the event loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            conn: Arc::clone(&self.conn),
            window: self.control_window,
            message_type: self.atoms.FOCUSMARK_SHUTDOWN,
        }
    }
}

/// Wakes the blocked event loop with a private client message.
#[derive(Clone)]
pub struct ShutdownHandle {
    conn: Arc<RustConnection>,
    window: Window,
    message_type: u32,
}

impl ShutdownHandle {
    pub fn request(&self) -> Result<()> {
        let event = ClientMessageEvent::new(32, self.window, self.message_type, [0u32; 5]);
        // With an empty mask the event goes to the client that created the
        // window, which is us.
        self.conn.send_event(false, self.window, EventMask::NO_EVENT, event)?;
        self.conn.flush()?;
        Ok(())
    }
}

fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
    screen
        .allowed_depths
        .iter()
        .filter(|d| d.depth == 32)
        .flat_map(|d| d.visuals.iter())
        .find(|v| v.class == VisualClass::TRUE_COLOR)
        .map(|v| (v.visual_id, 32))
}

fn find_format<C: Connection>(conn: &C, visual: Visualid) -> Result<Pictformat> {
    let formats = conn.render_query_pict_formats()?.reply()?;

    let by_visual = formats
        .screens
        .iter()
        .flat_map(|s| s.depths.iter())
        .flat_map(|d| d.visuals.iter())
        .find(|v| v.visual == visual)
        .map(|v| v.format);
    if let Some(format) = by_visual {
        return Ok(format);
    }

    // Fallback: any direct 32-bit format with an alpha channel.
    formats
        .formats
        .iter()
        .find(|f| f.type_ == PictType::DIRECT && f.depth == 32 && f.direct.alpha_mask != 0)
        .map(|f| f.id)
        .ok_or_else(|| anyhow!("no RENDER picture format for the 32-bit visual"))
}
