//! Debounced hotkey polling for toggle style keys.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Default cooldown between two accepted presses of a key.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(200);

/// Accepts a held key at most once per cooldown.
///
/// A key held down reads as pressed on every poll. Only the first poll and the
/// ones after the cooldown elapsed are accepted.
#[derive(Debug)]
pub struct KeyCooldown {
    cooldown: Duration,
    deadlines: HashMap<u8, Instant>,
}

impl KeyCooldown {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            deadlines: HashMap::new(),
        }
    }

    pub fn poll(&mut self, vk: u8, pressed: bool) -> bool {
        self.poll_at(vk, pressed, Instant::now())
    }

    pub fn poll_at(&mut self, vk: u8, pressed: bool, now: Instant) -> bool {
        if !pressed {
            return false;
        }

        match self.deadlines.get(&vk) {
            Some(deadline) if now < *deadline => false,
            _ => {
                self.deadlines.insert(vk, now + self.cooldown);
                true
            }
        }
    }

    /// Poll the current key state of `vk` from the system.
    #[cfg(windows)]
    pub fn is_pressed(&mut self, vk: u8) -> bool {
        self.poll(vk, is_key_down(vk))
    }
}

impl Default for KeyCooldown {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

/// Whether if `vk` is held down right now.
///
/// Readable from any thread, unlike the key state of a window message queue.
#[cfg(windows)]
pub fn is_key_down(vk: u8) -> bool {
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

    unsafe { GetAsyncKeyState(vk as _) as u16 & 0x8000 != 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSERT: u8 = 0x2D;

    #[test]
    fn held_key_fires_once_per_cooldown() {
        let mut keys = KeyCooldown::default();
        let start = Instant::now();

        assert!(keys.poll_at(INSERT, true, start));
        assert!(!keys.poll_at(INSERT, true, start + Duration::from_millis(50)));
        assert!(!keys.poll_at(INSERT, true, start + Duration::from_millis(199)));
        assert!(keys.poll_at(INSERT, true, start + Duration::from_millis(200)));
    }

    #[test]
    fn released_key_never_fires() {
        let mut keys = KeyCooldown::default();
        assert!(!keys.poll(INSERT, false));
        assert!(keys.poll(INSERT, true));
    }

    #[test]
    fn keys_are_independent() {
        let mut keys = KeyCooldown::new(Duration::from_secs(1));
        let now = Instant::now();

        assert!(keys.poll_at(INSERT, true, now));
        assert!(keys.poll_at(b'A', true, now));
        assert!(!keys.poll_at(INSERT, true, now));
    }
}
