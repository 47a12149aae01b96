use anyhow::Context;
use tracing::{trace, warn};

/// `WS_EX_TRANSPARENT`
pub const EX_TRANSPARENT: u32 = 0x0000_0020;

/// `WS_EX_LAYERED`
pub const EX_LAYERED: u32 = 0x0008_0000;

/// Native window operations the click-through controller needs.
pub trait NativeStyle {
    /// Read the extended window style.
    fn ex_style(&self) -> anyhow::Result<u32>;

    /// Replace the extended window style.
    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()>;

    /// Extend the compositor frame over the whole client area so the cleared
    /// backbuffer shows the desktop through.
    fn extend_frame_into_client_area(&mut self) -> anyhow::Result<()>;

    /// Give keyboard focus to the window.
    fn focus(&mut self) -> anyhow::Result<()>;
}

/// Toggles a window between clickable and click-through.
#[derive(Debug)]
pub struct ClickThrough {
    clickable_style: u32,
    not_clickable_style: u32,
    clickable: bool,
}

impl ClickThrough {
    /// Capture the styles of a freshly created window and make it transparent.
    #[tracing::instrument(skip(native))]
    pub fn init_transparency(native: &mut impl NativeStyle) -> anyhow::Result<Self> {
        let clickable_style = native
            .ex_style()
            .context("failed to read window extended style")?;

        let mut this = Self {
            clickable_style,
            not_clickable_style: clickable_style | EX_LAYERED | EX_TRANSPARENT,
            clickable: true,
        };

        if let Err(err) = native.extend_frame_into_client_area() {
            warn!("failed to extend frame into client area. err: {:?}", err);
        }
        this.set_clickable(native, true);

        Ok(this)
    }

    #[inline]
    pub const fn clickable(&self) -> bool {
        self.clickable
    }

    #[inline]
    pub const fn styles(&self) -> (u32, u32) {
        (self.clickable_style, self.not_clickable_style)
    }

    /// Change clickable state.
    ///
    /// Returns `true` if the native style was changed.
    pub fn set_clickable(&mut self, native: &mut impl NativeStyle, clickable: bool) -> bool {
        if self.clickable == clickable {
            return false;
        }

        let style = if clickable {
            self.clickable_style
        } else {
            self.not_clickable_style
        };

        if let Err(err) = native.set_ex_style(style) {
            warn!(
                "failed to change window clickable state to {}. err: {:?}",
                clickable, err
            );
            return false;
        }
        self.clickable = clickable;
        trace!("window clickable: {}", clickable);

        // layered transparent window does not receive focus on its own
        if clickable {
            if let Err(err) = native.focus() {
                warn!("failed to focus clickable window. err: {:?}", err);
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    #[derive(Default)]
    struct RecordingStyle {
        style: u32,
        sets: Vec<u32>,
        focus_calls: usize,
        extend_calls: usize,
        fail_set: bool,
    }

    impl NativeStyle for RecordingStyle {
        fn ex_style(&self) -> anyhow::Result<u32> {
            Ok(self.style)
        }

        fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
            if self.fail_set {
                bail!("SetWindowLongPtrW failed");
            }

            self.sets.push(style);
            self.style = style;
            Ok(())
        }

        fn extend_frame_into_client_area(&mut self) -> anyhow::Result<()> {
            self.extend_calls += 1;
            Ok(())
        }

        fn focus(&mut self) -> anyhow::Result<()> {
            self.focus_calls += 1;
            Ok(())
        }
    }

    const TOOLWINDOW_TOPMOST: u32 = 0x0000_0080 | 0x0000_0008;

    fn setup() -> (RecordingStyle, ClickThrough) {
        let mut native = RecordingStyle {
            style: TOOLWINDOW_TOPMOST,
            ..Default::default()
        };
        let controller = ClickThrough::init_transparency(&mut native).unwrap();
        (native, controller)
    }

    #[test]
    fn init_caches_both_styles() {
        let (native, controller) = setup();

        assert_eq!(
            controller.styles(),
            (
                TOOLWINDOW_TOPMOST,
                TOOLWINDOW_TOPMOST | EX_LAYERED | EX_TRANSPARENT
            )
        );
        assert!(controller.clickable());
        assert_eq!(native.extend_calls, 1);
        assert!(native.sets.is_empty());
    }

    #[test]
    fn toggling_is_idempotent() {
        let (mut native, mut controller) = setup();

        assert!(controller.set_clickable(&mut native, false));
        assert!(!controller.set_clickable(&mut native, false));
        assert_eq!(native.sets.len(), 1);
        assert_eq!(native.style & EX_TRANSPARENT, EX_TRANSPARENT);

        assert!(controller.set_clickable(&mut native, true));
        assert!(!controller.set_clickable(&mut native, true));
        assert_eq!(native.sets.len(), 2);
        assert_eq!(native.style, TOOLWINDOW_TOPMOST);
    }

    #[test]
    fn focus_only_when_becoming_clickable() {
        let (mut native, mut controller) = setup();

        controller.set_clickable(&mut native, false);
        assert_eq!(native.focus_calls, 0);

        controller.set_clickable(&mut native, true);
        assert_eq!(native.focus_calls, 1);
    }

    #[test]
    fn failed_set_keeps_state() {
        let (mut native, mut controller) = setup();
        native.fail_set = true;

        assert!(!controller.set_clickable(&mut native, false));
        assert!(controller.clickable());

        native.fail_set = false;
        assert!(controller.set_clickable(&mut native, false));
        assert!(!controller.clickable());
    }
}
