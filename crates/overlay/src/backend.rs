//! Native window and GPU backends driven by the render thread.

pub mod headless;
#[cfg(windows)]
pub mod win32;

use egui::{ClippedPrimitive, CursorIcon, Pos2, TexturesDelta};
use glasspane_event::{WindowEvent, input::Modifiers};

use crate::{clickthrough::NativeStyle, input::InputCapture, overlay::OverlayOptions};

/// Tessellated output of a frame.
pub struct RenderFrame<'a> {
    pub primitives: &'a [ClippedPrimitive],
    pub textures_delta: &'a TexturesDelta,
    pub pixels_per_point: f32,

    /// Premultiplied clear color of the backbuffer.
    pub clear_color: [f32; 4],
}

/// Error message for paint callbacks reaching a backend.
pub const PAINT_CALLBACK_UNSUPPORTED: &str = "paint callbacks are not supported";

/// A native window with a render surface.
///
/// Created and used on the render thread only.
pub trait Backend: NativeStyle {
    /// Process at most one pending native message, appending raised events.
    fn pump_message(&mut self, events: &mut Vec<WindowEvent>) -> anyhow::Result<()>;

    /// Current client area size.
    fn client_size(&self) -> (u32, u32);

    /// System cursor position relative to the client area.
    fn cursor_position(&self) -> Option<Pos2>;

    /// Modifier keys held right now.
    fn modifiers(&self) -> Modifiers;

    /// Cursor icon shown while the cursor is over the client area.
    fn set_cursor(&mut self, cursor: CursorIcon);

    /// Inputs consumed by the UI. Native messages of captured inputs are not
    /// passed to the default window procedure.
    fn set_capture(&mut self, capture: InputCapture);

    fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()>;

    fn set_size(&mut self, width: u32, height: u32) -> anyhow::Result<()>;

    fn set_visible(&mut self, visible: bool) -> anyhow::Result<()>;

    /// Drop and create the render surface.
    fn recreate_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()>;

    /// Resize the existing render surface in place.
    fn resize_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()>;

    /// Apply texture changes and draw the frame to the backbuffer.
    fn render(&mut self, frame: RenderFrame) -> anyhow::Result<()>;

    fn present(&mut self, vsync: bool) -> anyhow::Result<()>;
}

/// Creates a [`Backend`] on the render thread.
pub trait BackendFactory: Send + 'static {
    type Backend: Backend;

    fn create(self, options: &OverlayOptions) -> anyhow::Result<Self::Backend>;
}
