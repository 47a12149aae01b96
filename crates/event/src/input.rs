//! Input event types delivered by a native overlay window.

use core::num::NonZeroU8;

/// Describe an input event captured from a window.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// A cursor input.
    Cursor(CursorInput),
    /// A keyboard input.
    Keyboard(KeyboardInput),
}

/// Describe a cursor related input.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorInput {
    /// The type of cursor input.
    pub event: CursorEvent,
    /// Cursor position relative to the left-top corner client area of the window.
    pub position: InputPosition,
}

/// Describe a cursor event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorEvent {
    /// Cursor entered the window from outside of the window.
    Enter,

    /// Cursor left the window to outside of the window.
    Leave,

    /// A cursor button is pressed or released.
    Action {
        /// The state of the input.
        state: CursorInputState,

        /// The button for this action.
        action: CursorAction,
    },

    /// Cursor is moved.
    Move,

    /// Wheel is scrolled.
    Scroll {
        /// The axis of the scroll.
        axis: ScrollAxis,

        /// The scroll delta in native wheel units.
        /// One notch of a standard wheel is [`WHEEL_DELTA`].
        ///
        /// Positive value means scrolling up/right, negative value means scrolling down/left.
        delta: i16,
    },
}

/// Wheel delta of a single notch.
pub const WHEEL_DELTA: i16 = 120;

/// Cursor position in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputPosition {
    pub x: i32,
    pub y: i32,
}

/// Describe the state of a cursor button input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorInputState {
    /// Button is pressed down.
    Pressed {
        /// Whether if this click is the second click of a double click.
        double_click: bool,
    },

    /// Button is released.
    Released,
}

impl CursorInputState {
    #[inline]
    pub const fn pressed(self) -> bool {
        matches!(self, Self::Pressed { .. })
    }
}

/// Describe a keyboard related input.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardInput {
    /// A raw key input which does not consider keyboard layout.
    Key {
        /// The key code of the input.
        key: Key,

        /// The state of the key input.
        state: KeyInputState,
    },

    /// A character input.
    ///
    /// This is usually sent after [`KeyboardInput::Key`] with [`KeyInputState::Pressed`] state
    /// if there was a printable character associated with the key.
    Char(char),
}

/// Describe a virtual key code.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Key {
    /// A Windows Virtual-Key code.
    ///
    /// Refer to [Virtual-Key Codes](https://learn.microsoft.com/en-us/windows/win32/inputdev/virtual-key-codes) for details.
    pub code: NonZeroU8,

    /// Whether if this key is an extended key.
    pub extended: bool,
}

impl Key {
    /// Create a new [`Key`] from a virtual-key code.
    pub fn new(code: u8, extended: bool) -> Option<Self> {
        NonZeroU8::new(code).map(|code| Key { code, extended })
    }
}

/// Number of mouse buttons tracked by a window.
pub const CURSOR_BUTTONS: usize = 5;

/// Describe a mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorAction {
    /// Left button
    Left,

    /// Right button
    Right,

    /// Wheel button
    Middle,

    /// Extra button 1 (usually mapped to `Back` action)
    Back,

    /// Extra button 2 (usually mapped to `Forward` action)
    Forward,
}

impl CursorAction {
    pub const ALL: [CursorAction; CURSOR_BUTTONS] = [
        CursorAction::Left,
        CursorAction::Right,
        CursorAction::Middle,
        CursorAction::Back,
        CursorAction::Forward,
    ];

    /// Index of the button in a `[_; CURSOR_BUTTONS]` table.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            CursorAction::Left => 0,
            CursorAction::Right => 1,
            CursorAction::Middle => 2,
            CursorAction::Back => 3,
            CursorAction::Forward => 4,
        }
    }
}

/// Describe a scroll axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    /// Horizontal axis
    X,

    /// Vertical axis
    Y,
}

/// Describe the state of a key input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInputState {
    /// The key is pressed down.
    Pressed,

    /// The key is released.
    Released,
}

bitflags::bitflags! {
    /// Modifier keys held while a frame is built.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const CTRL = 1;
        const SHIFT = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_indices_are_dense() {
        for (i, action) in CursorAction::ALL.into_iter().enumerate() {
            assert_eq!(action.index(), i);
        }
    }

    #[test]
    fn zero_key_code_is_rejected() {
        assert!(Key::new(0, false).is_none());
        assert_eq!(Key::new(0x41, false).map(|key| key.code.get()), Some(0x41));
    }
}
