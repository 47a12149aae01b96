use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Frame rate settings shared with logic threads.
#[derive(Debug)]
pub struct FramePacing {
    fps: AtomicU32,
    vsync: AtomicBool,
}

impl FramePacing {
    pub const fn new(fps: u32, vsync: bool) -> Self {
        Self {
            fps: AtomicU32::new(fps),
            vsync: AtomicBool::new(vsync),
        }
    }

    #[inline]
    pub fn fps(&self) -> u32 {
        self.fps.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_fps(&self, fps: u32) {
        self.fps.store(fps, Ordering::Relaxed);
    }

    #[inline]
    pub fn vsync(&self) -> bool {
        self.vsync.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_vsync(&self, vsync: bool) {
        self.vsync.store(vsync, Ordering::Relaxed);
    }

    /// Time to sleep after a frame which took `elapsed`.
    pub fn sleep_after(&self, elapsed: Duration) -> Option<Duration> {
        if self.vsync() {
            return None;
        }

        sleep_duration(self.fps(), elapsed)
    }
}

/// Remaining time of a `1 / fps` frame budget. `0` fps is uncapped.
pub fn sleep_duration(fps: u32, elapsed: Duration) -> Option<Duration> {
    if fps == 0 {
        return None;
    }

    Duration::from_secs(1)
        .checked_div(fps)?
        .checked_sub(elapsed)
        .filter(|remaining| !remaining.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleeps_remaining_budget() {
        let sleep = sleep_duration(60, Duration::from_millis(5)).unwrap();
        let expected = Duration::from_secs_f64(1.0 / 60.0) - Duration::from_millis(5);

        assert!(sleep.abs_diff(expected) < Duration::from_micros(1));
        assert!((sleep.as_secs_f64() * 1000.0 - 11.667).abs() < 0.01);
    }

    #[test]
    fn over_budget_frame_does_not_sleep() {
        assert_eq!(sleep_duration(60, Duration::from_millis(20)), None);
        assert_eq!(sleep_duration(100, Duration::from_millis(10)), None);
    }

    #[test]
    fn zero_fps_is_uncapped() {
        assert_eq!(sleep_duration(0, Duration::ZERO), None);
    }

    #[test]
    fn vsync_takes_precedence() {
        let pacing = FramePacing::new(30, true);
        assert_eq!(pacing.sleep_after(Duration::ZERO), None);

        pacing.set_vsync(false);
        assert_eq!(
            pacing.sleep_after(Duration::ZERO),
            Some(Duration::from_secs(1) / 30)
        );
    }
}
