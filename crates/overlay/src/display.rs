//! Connected displays.

/// Bounds of a display on the virtual screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Number of connected displays.
pub fn count() -> usize {
    imp::monitors().len()
}

/// Bounds of the display at `index`, primary display first.
pub fn bounds(index: usize) -> Option<DisplayBounds> {
    imp::monitors().get(index).copied()
}

#[cfg(windows)]
mod imp {
    use windows::{
        Win32::{
            Foundation::{LPARAM, RECT},
            Graphics::Gdi::{EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO},
        },
        core::BOOL,
    };

    use super::DisplayBounds;

    /// `MONITORINFOF_PRIMARY`
    const PRIMARY: u32 = 0x0000_0001;

    pub fn monitors() -> Vec<DisplayBounds> {
        unsafe extern "system" fn enum_proc(
            monitor: HMONITOR,
            _: HDC,
            _: *mut RECT,
            lparam: LPARAM,
        ) -> BOOL {
            let list = unsafe { &mut *(lparam.0 as *mut Vec<(bool, DisplayBounds)>) };

            let mut info = MONITORINFO {
                cbSize: size_of::<MONITORINFO>() as _,
                ..Default::default()
            };
            if unsafe { GetMonitorInfoW(monitor, &mut info) }.as_bool() {
                let rect = info.rcMonitor;
                list.push((
                    info.dwFlags & PRIMARY != 0,
                    DisplayBounds {
                        x: rect.left,
                        y: rect.top,
                        width: (rect.right - rect.left).max(0) as _,
                        height: (rect.bottom - rect.top).max(0) as _,
                    },
                ));
            }

            BOOL(1)
        }

        let mut list = Vec::<(bool, DisplayBounds)>::new();
        unsafe {
            _ = EnumDisplayMonitors(
                None,
                None,
                Some(enum_proc),
                LPARAM(&mut list as *mut _ as _),
            );
        }

        // stable sort keeps enumeration order of the others
        list.sort_by_key(|(primary, _)| !*primary);
        list.into_iter().map(|(_, bounds)| bounds).collect()
    }
}

#[cfg(not(windows))]
mod imp {
    use super::DisplayBounds;

    pub fn monitors() -> Vec<DisplayBounds> {
        Vec::new()
    }
}
