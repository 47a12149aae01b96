use core::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// Lifecycle of an overlay.
///
/// States only move forward. [`OverlayState::Closed`] is terminal, a new overlay is
/// required to run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum OverlayState {
    /// Overlay is constructed but [`Overlay::start`](crate::Overlay::start) was never called.
    NotStarted = 0,

    /// Render thread is creating the window, the GPU device and the UI context.
    Initializing = 1,

    /// Initialization finished, the first frame is not built yet.
    Ready = 2,

    /// Render loop is iterating.
    Running = 3,

    /// Close is requested, render loop exits after the current frame.
    CloseRequested = 4,

    /// Render loop is stopped and every resource is released.
    Closed = 5,
}

impl OverlayState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Running,
            4 => Self::CloseRequested,
            _ => Self::Closed,
        }
    }

    /// Whether if initialization has completed and the loop has not stopped yet.
    #[inline]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub const fn new() -> Self {
        Self(AtomicU8::new(OverlayState::NotStarted as u8))
    }

    #[inline]
    pub fn get(&self) -> OverlayState {
        OverlayState::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if it is ahead of the current state.
    ///
    /// Returns the previous state if the state changed.
    pub fn advance(&self, to: OverlayState) -> Option<OverlayState> {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw < to as u8).then_some(to as u8)
            })
            .ok()
            .map(OverlayState::from_raw)?;

        debug!("overlay state {:?} -> {:?}", prev, to);
        Some(prev)
    }

    /// Move from exactly `from` to `to`.
    pub fn transition(&self, from: OverlayState, to: OverlayState) -> bool {
        debug_assert!(from < to);
        let changed = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            debug!("overlay state {:?} -> {:?}", from, to);
        }

        changed
    }

    /// Request close.
    ///
    /// An overlay that never started goes straight to [`OverlayState::Closed`].
    pub fn request_close(&self) -> OverlayState {
        let res = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match OverlayState::from_raw(raw) {
                    OverlayState::NotStarted => Some(OverlayState::Closed as u8),
                    OverlayState::Initializing | OverlayState::Ready | OverlayState::Running => {
                        Some(OverlayState::CloseRequested as u8)
                    }
                    OverlayState::CloseRequested | OverlayState::Closed => None,
                }
            });

        match res {
            Ok(prev) => {
                let prev = OverlayState::from_raw(prev);
                debug!("overlay close requested in state {:?}", prev);
                prev
            }
            Err(current) => OverlayState::from_raw(current),
        }
    }

    #[inline]
    pub fn close_requested(&self) -> bool {
        self.get() >= OverlayState::CloseRequested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_moves_backwards() {
        let lifecycle = Lifecycle::new();
        assert_eq!(
            lifecycle.advance(OverlayState::Running),
            Some(OverlayState::NotStarted)
        );
        assert_eq!(lifecycle.advance(OverlayState::Ready), None);
        assert_eq!(lifecycle.get(), OverlayState::Running);

        assert!(!lifecycle.transition(OverlayState::Initializing, OverlayState::Ready));
        assert_eq!(lifecycle.get(), OverlayState::Running);
    }

    #[test]
    fn close_before_start_is_terminal() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.request_close(), OverlayState::NotStarted);
        assert_eq!(lifecycle.get(), OverlayState::Closed);

        assert_eq!(lifecycle.request_close(), OverlayState::Closed);
        assert!(!lifecycle.transition(OverlayState::NotStarted, OverlayState::Initializing));
        assert_eq!(lifecycle.get(), OverlayState::Closed);
    }

    #[test]
    fn repeated_close_keeps_state() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(OverlayState::Running);

        assert_eq!(lifecycle.request_close(), OverlayState::Running);
        assert_eq!(lifecycle.request_close(), OverlayState::CloseRequested);
        assert_eq!(lifecycle.get(), OverlayState::CloseRequested);
        assert!(lifecycle.close_requested());

        lifecycle.advance(OverlayState::Closed);
        assert_eq!(lifecycle.request_close(), OverlayState::Closed);
        assert_eq!(lifecycle.get(), OverlayState::Closed);
    }
}
