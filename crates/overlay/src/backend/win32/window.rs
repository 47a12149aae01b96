use core::{
    cell::RefCell,
    mem,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::{Context, bail};
use egui::Pos2;
use glasspane_event::{WindowEvent, input::Modifiers};
use scopeguard::ScopeGuard;
use tracing::{debug, warn};
use windows::{
    Win32::{
        Foundation::{GetLastError, HINSTANCE, HWND, POINT, RECT, SetLastError, WIN32_ERROR},
        Graphics::{
            Dwm::DwmExtendFrameIntoClientArea,
            Gdi::{ScreenToClient, UpdateWindow},
        },
        System::LibraryLoader::GetModuleHandleW,
        UI::{
            Controls::MARGINS,
            Input::KeyboardAndMouse::{
                SetFocus, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
            },
            WindowsAndMessaging::{
                CS_DBLCLKS, CreateWindowExW, DestroyWindow, DispatchMessageW, GWL_EXSTYLE,
                GWLP_USERDATA, GetClientRect, GetCursorPos, GetWindowLongPtrW, HCURSOR, IDC_ARROW,
                LoadCursorW, MSG, PM_REMOVE, PeekMessageW, RegisterClassExW, SW_HIDE,
                SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SetCursor,
                SetWindowLongPtrW, SetWindowPos, ShowWindow, TranslateMessage, UnregisterClassW,
                WNDCLASSEXW, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
            },
        },
    },
    core::{HSTRING, PCWSTR},
};

use super::proc::wnd_proc;
use crate::{hotkey::is_key_down, input::InputCapture, overlay::OverlayOptions};

static CLASS_ID: AtomicU32 = AtomicU32::new(0);

/// Window state shared with the window procedure.
pub(super) struct ProcState {
    /// Events raised since the last pump.
    pub events: Vec<WindowEvent>,
    pub capture: InputCapture,

    /// Cursor set while the cursor is over the client area. `None` hides it.
    pub cursor: Option<HCURSOR>,
    pub cursor_inside: bool,
    pub shown: bool,
    pub size: (u32, u32),
    pub high_surrogate: Option<u16>,
    pub destroyed: bool,
}

/// Borderless topmost popup window owned by the render thread.
pub struct Window {
    hwnd: HWND,
    class: HSTRING,
    instance: HINSTANCE,
    state: Box<RefCell<ProcState>>,
}

impl Window {
    #[tracing::instrument(skip(options))]
    pub fn create(options: &OverlayOptions) -> anyhow::Result<Self> {
        let instance = HINSTANCE(
            unsafe { GetModuleHandleW(None) }
                .context("failed to get module handle")?
                .0,
        );

        // unique per overlay so multiple overlays can live in a process
        let class = HSTRING::from(format!(
            "glasspane-{}-{}",
            std::process::id(),
            CLASS_ID.fetch_add(1, Ordering::Relaxed)
        ));
        let arrow = unsafe { LoadCursorW(None, IDC_ARROW) }.ok();

        let atom = unsafe {
            RegisterClassExW(&WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_DBLCLKS,
                lpfnWndProc: Some(wnd_proc),
                hInstance: instance,
                hCursor: arrow.unwrap_or_default(),
                lpszClassName: PCWSTR(class.as_ptr()),
                ..Default::default()
            })
        };
        if atom == 0 {
            bail!("failed to register window class. err: {:?}", unsafe {
                GetLastError()
            });
        }
        let class_guard = scopeguard::guard(&class, |class| {
            _ = unsafe { UnregisterClassW(class, Some(instance)) };
        });

        let (x, y) = options.position;
        let (width, height) = options.size;
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
                &class,
                &HSTRING::from(options.title.as_str()),
                WS_POPUP,
                x,
                y,
                width as i32,
                height as i32,
                None,
                None,
                Some(instance),
                None,
            )
        }
        .context("failed to create overlay window")?;
        ScopeGuard::into_inner(class_guard);
        debug!("overlay window created. hwnd: {:?}", hwnd);

        let state = Box::new(RefCell::new(ProcState {
            events: Vec::new(),
            capture: InputCapture::empty(),
            cursor: arrow,
            cursor_inside: false,
            shown: false,
            size: get_client_size(hwnd).unwrap_or((width, height)),
            high_surrogate: None,
            destroyed: false,
        }));
        unsafe {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, &*state as *const _ as isize);
        }

        let mut window = Self {
            hwnd,
            class,
            instance,
            state,
        };
        if options.visible {
            window.set_visible(true);
        }

        Ok(window)
    }

    #[inline]
    pub const fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// Dispatch at most one message of the thread queue and collect raised events.
    pub fn pump(&mut self, events: &mut Vec<WindowEvent>) {
        let mut msg = MSG::default();
        if unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            unsafe {
                _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        events.append(&mut self.state.borrow_mut().events);
    }

    pub fn destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    pub fn client_size(&self) -> (u32, u32) {
        get_client_size(self.hwnd).unwrap_or_else(|_| self.state.borrow().size)
    }

    pub fn cursor_position(&self) -> Option<Pos2> {
        let mut point = POINT::default();
        unsafe {
            GetCursorPos(&mut point).ok()?;
            if !ScreenToClient(self.hwnd, &mut point).as_bool() {
                return None;
            }
        }

        Some(Pos2::new(point.x as f32, point.y as f32))
    }

    pub fn modifiers(&self) -> Modifiers {
        #[inline]
        fn down(vk: VIRTUAL_KEY) -> bool {
            is_key_down(vk.0 as u8)
        }

        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::CTRL, down(VK_CONTROL));
        modifiers.set(Modifiers::SHIFT, down(VK_SHIFT));
        modifiers.set(Modifiers::ALT, down(VK_MENU));
        modifiers.set(Modifiers::SUPER, down(VK_LWIN) || down(VK_RWIN));
        modifiers
    }

    pub fn set_cursor(&mut self, cursor: Option<HCURSOR>) {
        let inside = {
            let mut state = self.state.borrow_mut();
            state.cursor = cursor;
            state.cursor_inside
        };

        // WM_SETCURSOR only arrives after the cursor moves
        if inside {
            unsafe { SetCursor(cursor) };
        }
    }

    pub fn set_capture(&mut self, capture: InputCapture) {
        self.state.borrow_mut().capture = capture;
    }

    pub fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()> {
        unsafe {
            SetWindowPos(
                self.hwnd,
                None,
                x,
                y,
                0,
                0,
                SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .context("SetWindowPos failed")
    }

    pub fn set_size(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        unsafe {
            SetWindowPos(
                self.hwnd,
                None,
                0,
                0,
                width as i32,
                height as i32,
                SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE,
            )
        }
        .context("SetWindowPos failed")
    }

    pub fn set_visible(&mut self, visible: bool) {
        unsafe {
            _ = ShowWindow(self.hwnd, if visible { SW_SHOWNOACTIVATE } else { SW_HIDE });
            if visible {
                _ = UpdateWindow(self.hwnd);
            }
        }
    }

    pub fn ex_style(&self) -> anyhow::Result<u32> {
        unsafe {
            SetLastError(WIN32_ERROR(0));
            let style = GetWindowLongPtrW(self.hwnd, GWL_EXSTYLE);
            if style == 0 {
                GetLastError().ok().context("GetWindowLongPtrW failed")?;
            }

            Ok(style as u32)
        }
    }

    pub fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
        unsafe {
            SetLastError(WIN32_ERROR(0));
            if SetWindowLongPtrW(self.hwnd, GWL_EXSTYLE, style as isize) == 0 {
                GetLastError().ok().context("SetWindowLongPtrW failed")?;
            }
        }

        Ok(())
    }

    pub fn extend_frame_into_client_area(&mut self) -> anyhow::Result<()> {
        unsafe {
            DwmExtendFrameIntoClientArea(
                self.hwnd,
                &MARGINS {
                    cxLeftWidth: -1,
                    cxRightWidth: -1,
                    cyTopHeight: -1,
                    cyBottomHeight: -1,
                },
            )
        }
        .context("DwmExtendFrameIntoClientArea failed")
    }

    pub fn focus(&mut self) -> anyhow::Result<()> {
        unsafe { SetFocus(Some(self.hwnd)) }.context("SetFocus failed")?;
        Ok(())
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if !self.destroyed() {
            if let Err(err) = unsafe { DestroyWindow(self.hwnd) } {
                warn!("failed to destroy overlay window. err: {:?}", err);
            }
        }

        if let Err(err) = unsafe { UnregisterClassW(&self.class, Some(self.instance)) } {
            warn!("failed to unregister window class. err: {:?}", err);
        }
        debug!("overlay window cleanup");
    }
}

pub fn get_client_size(hwnd: HWND) -> anyhow::Result<(u32, u32)> {
    let mut rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut rect) }.context("GetClientRect failed")?;

    Ok((
        (rect.right - rect.left).max(0) as u32,
        (rect.bottom - rect.top).max(0) as u32,
    ))
}
