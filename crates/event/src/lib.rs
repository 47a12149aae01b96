//! The [`WindowEvent`] enum and assorted types describing what a native overlay
//! window reports to its render host.
//!
//! Backends translate platform messages into these types; the render host and the
//! input bridge consume them. For the actual usage information, see the
//! documentation of the `glasspane` crate.

pub mod input;

use input::InputEvent;

/// Describe an event raised by a native overlay window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    /// The window became visible.
    Shown {
        /// Whether if this is the first time the window is shown.
        ///
        /// The render surface must be recreated, not resized, on the first show.
        first: bool,
    },

    /// The window became invisible.
    Hidden,

    /// Client area size is changed.
    Resized {
        /// New width of the client area
        width: u32,

        /// New height of the client area
        height: u32,
    },

    /// Window is moved on the virtual screen.
    Moved {
        /// New left position of the window
        x: i32,

        /// New top position of the window
        y: i32,
    },

    /// Window gained or lost keyboard focus.
    FocusChanged(bool),

    /// Input event related to this window.
    Input(InputEvent),

    /// Window is destroyed by the system or the user.
    /// This is the last event for this window.
    Destroyed,
}
