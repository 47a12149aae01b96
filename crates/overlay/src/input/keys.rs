use egui::Key;

const LETTERS: [Key; 26] = [
    Key::A,
    Key::B,
    Key::C,
    Key::D,
    Key::E,
    Key::F,
    Key::G,
    Key::H,
    Key::I,
    Key::J,
    Key::K,
    Key::L,
    Key::M,
    Key::N,
    Key::O,
    Key::P,
    Key::Q,
    Key::R,
    Key::S,
    Key::T,
    Key::U,
    Key::V,
    Key::W,
    Key::X,
    Key::Y,
    Key::Z,
];

const DIGITS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

const FUNCTION_KEYS: [Key; 12] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
];

/// Keys left to the system. The window procedure never swallows them.
pub fn is_reserved(vk: u8) -> bool {
    matches!(
        vk,
        // VK_MENU, VK_LMENU, VK_RMENU
        0x12 | 0xA4 | 0xA5
        // VK_LWIN, VK_RWIN
        | 0x5B | 0x5C
        // VK_SNAPSHOT
        | 0x2C
        // VK_CAPITAL, VK_NUMLOCK
        | 0x14 | 0x90
    )
}

/// Whether a captured key message may be kept from the default window procedure.
///
/// `system` is set for `WM_SYSKEYDOWN`/`WM_SYSKEYUP`, the messages behind Alt
/// shortcuts such as Alt+F4.
pub fn can_swallow(vk: u8, system: bool) -> bool {
    !system && !is_reserved(vk)
}

/// Map a virtual-key code to an egui key.
///
/// Modifier keys map to [`None`], their state is polled once per frame instead.
pub fn to_egui_key(vk: u8) -> Option<Key> {
    Some(match vk {
        0x41..=0x5A => LETTERS[(vk - 0x41) as usize],
        0x30..=0x39 => DIGITS[(vk - 0x30) as usize],
        // numpad
        0x60..=0x69 => DIGITS[(vk - 0x60) as usize],
        0x70..=0x7B => FUNCTION_KEYS[(vk - 0x70) as usize],

        0x08 => Key::Backspace,
        0x09 => Key::Tab,
        0x0D => Key::Enter,
        0x1B => Key::Escape,
        0x20 => Key::Space,
        0x21 => Key::PageUp,
        0x22 => Key::PageDown,
        0x23 => Key::End,
        0x24 => Key::Home,
        0x25 => Key::ArrowLeft,
        0x26 => Key::ArrowUp,
        0x27 => Key::ArrowRight,
        0x28 => Key::ArrowDown,
        0x2D => Key::Insert,
        0x2E => Key::Delete,

        0x6B => Key::Plus,
        0x6D => Key::Minus,
        0x6E => Key::Period,
        0x6F => Key::Slash,

        0xBA => Key::Semicolon,
        0xBB => Key::Equals,
        0xBC => Key::Comma,
        0xBD => Key::Minus,
        0xBE => Key::Period,
        0xBF => Key::Slash,
        0xC0 => Key::Backtick,
        0xDB => Key::OpenBracket,
        0xDC => Key::Backslash,
        0xDD => Key::CloseBracket,

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_and_digit_ranges() {
        assert_eq!(to_egui_key(b'A'), Some(Key::A));
        assert_eq!(to_egui_key(b'Z'), Some(Key::Z));
        assert_eq!(to_egui_key(b'0'), Some(Key::Num0));
        assert_eq!(to_egui_key(0x69), Some(Key::Num9));
        assert_eq!(to_egui_key(0x7B), Some(Key::F12));
    }

    #[test]
    fn modifiers_are_not_keys() {
        // VK_SHIFT, VK_CONTROL, VK_LSHIFT
        for vk in [0x10, 0x11, 0xA0] {
            assert_eq!(to_egui_key(vk), None);
        }
    }

    #[test]
    fn system_keys_are_reserved() {
        assert!(is_reserved(0x12));
        assert!(is_reserved(0x5B));
        assert!(is_reserved(0x2C));
        assert!(!is_reserved(b'A'));
        assert!(!is_reserved(0x1B));
    }

    #[test]
    fn system_shortcuts_pass_through() {
        // VK_F4 with alt held
        assert!(!can_swallow(0x73, true));
        assert!(can_swallow(0x73, false));
        assert!(!can_swallow(0x12, false));
        assert!(can_swallow(b'A', false));
    }
}
