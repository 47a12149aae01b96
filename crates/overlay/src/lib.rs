//! Click-through transparent desktop overlay rendered with [`egui`].
//!
//! An [`Overlay`] owns a borderless, topmost, per-pixel transparent window and a
//! dedicated render thread. Every frame the UI decides whether the window takes
//! mouse input: while the pointer is over an interactive element the window is
//! clickable, otherwise input passes through to the application beneath.
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> anyhow::Result<()> {
//! use glasspane::{Overlay, OverlayOptions};
//!
//! let mut overlay = Overlay::new(OverlayOptions::default(), |frame: &mut glasspane::Frame| {
//!     egui::Window::new("Hello").show(frame.ctx(), |ui| {
//!         if ui.button("Close").clicked() {
//!             frame.close();
//!         }
//!     });
//!
//!     Ok(())
//! });
//! overlay.run()
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

pub mod backend;
pub mod clickthrough;
pub mod display;
pub mod font;
pub mod hotkey;
pub mod image;
pub mod input;
pub mod pacing;
pub mod schedule;

#[cfg(windows)]
pub mod dbg;

mod lifecycle;
mod overlay;

pub use egui;
pub use glasspane_event as event;

pub use lifecycle::OverlayState;
pub use overlay::{
    Frame, FrameTimings, Overlay, OverlayApp, OverlayHandle, OverlayOptions, POLL_INTERVAL,
};

/// Declare the process per-monitor DPI aware.
///
/// Call once before any window is created. Later calls do nothing.
#[cfg(windows)]
pub fn declare_dpi_awareness() {
    use once_cell::sync::OnceCell;
    use windows::Win32::UI::HiDpi::{
        DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, SetProcessDpiAwarenessContext,
    };

    static DECLARED: OnceCell<()> = OnceCell::new();

    DECLARED.get_or_init(|| {
        if let Err(err) =
            unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }
        {
            tracing::warn!("failed to declare dpi awareness. err: {:?}", err);
        }
    });
}
