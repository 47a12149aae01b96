use core::{cell::RefCell, mem};

use glasspane_event::{
    WindowEvent,
    input::{
        CursorAction, CursorEvent, CursorInput, CursorInputState, InputEvent, InputPosition, Key,
        KeyInputState, KeyboardInput, ScrollAxis,
    },
};
use tracing::trace;
use windows::Win32::{
    Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM},
    Graphics::Gdi::ScreenToClient,
    UI::{
        Controls::{self, HOVER_DEFAULT},
        Input::KeyboardAndMouse::{
            ReleaseCapture, SetCapture, TME_LEAVE, TRACKMOUSEEVENT, TrackMouseEvent,
        },
        WindowsAndMessaging::{
            self as msg, DefWindowProcW, GWLP_USERDATA, GetWindowLongPtrW, SetCursor, XBUTTON1,
        },
    },
};

use super::window::ProcState;
use crate::input::{InputCapture, keys};

pub(super) unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let state = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const RefCell<ProcState>;

    // null until the window is set up. Reentrant messages sent while the
    // state is borrowed go to the default procedure.
    if !state.is_null() {
        if let Ok(mut state) = unsafe { &*state }.try_borrow_mut() {
            if let Some(ret) = process(hwnd, &mut state, msg, wparam, lparam) {
                return ret;
            }
        }
    }

    unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
}

fn process(
    hwnd: HWND,
    state: &mut ProcState,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> Option<LRESULT> {
    match msg {
        msg::WM_SHOWWINDOW => {
            if wparam.0 != 0 {
                let first = !state.shown;
                state.shown = true;
                state.events.push(WindowEvent::Shown { first });
            } else {
                state.events.push(WindowEvent::Hidden);
            }
        }

        msg::WM_SIZE => {
            let [width, height] = bytemuck::cast::<_, [u16; 2]>(lparam.0 as u32);
            let size = (width as u32, height as u32);
            if state.size != size {
                state.size = size;
                state.events.push(WindowEvent::Resized {
                    width: size.0,
                    height: size.1,
                });
            }
        }

        msg::WM_MOVE => {
            let [x, y] = bytemuck::cast::<_, [i16; 2]>(lparam.0 as u32);
            state.events.push(WindowEvent::Moved {
                x: x as i32,
                y: y as i32,
            });
        }

        msg::WM_SETFOCUS => state.events.push(WindowEvent::FocusChanged(true)),
        msg::WM_KILLFOCUS => state.events.push(WindowEvent::FocusChanged(false)),

        // the swapchain covers the whole client area
        msg::WM_ERASEBKGND => return Some(LRESULT(1)),

        // set cursor in client area
        msg::WM_SETCURSOR
            if {
                let [area, _] = bytemuck::cast::<_, [u16; 2]>(lparam.0 as u32);
                area == 1
            } =>
        {
            unsafe { SetCursor(state.cursor) };
            return Some(LRESULT(1));
        }

        msg::WM_LBUTTONDOWN | msg::WM_LBUTTONDBLCLK => {
            let input = pressed(msg == msg::WM_LBUTTONDBLCLK);
            return cursor_action::<0>(hwnd, state, CursorAction::Left, input, lparam);
        }
        msg::WM_MBUTTONDOWN | msg::WM_MBUTTONDBLCLK => {
            let input = pressed(msg == msg::WM_MBUTTONDBLCLK);
            return cursor_action::<0>(hwnd, state, CursorAction::Middle, input, lparam);
        }
        msg::WM_RBUTTONDOWN | msg::WM_RBUTTONDBLCLK => {
            let input = pressed(msg == msg::WM_RBUTTONDBLCLK);
            return cursor_action::<0>(hwnd, state, CursorAction::Right, input, lparam);
        }
        msg::WM_XBUTTONDOWN | msg::WM_XBUTTONDBLCLK => {
            let input = pressed(msg == msg::WM_XBUTTONDBLCLK);
            return cursor_action::<1>(hwnd, state, x_button(wparam), input, lparam);
        }

        msg::WM_LBUTTONUP => {
            return cursor_action::<0>(
                hwnd,
                state,
                CursorAction::Left,
                CursorInputState::Released,
                lparam,
            );
        }
        msg::WM_MBUTTONUP => {
            return cursor_action::<0>(
                hwnd,
                state,
                CursorAction::Middle,
                CursorInputState::Released,
                lparam,
            );
        }
        msg::WM_RBUTTONUP => {
            return cursor_action::<0>(
                hwnd,
                state,
                CursorAction::Right,
                CursorInputState::Released,
                lparam,
            );
        }
        msg::WM_XBUTTONUP => {
            return cursor_action::<1>(
                hwnd,
                state,
                x_button(wparam),
                CursorInputState::Released,
                lparam,
            );
        }

        msg::WM_MOUSEMOVE => {
            let position = client_position(lparam);
            if !state.cursor_inside {
                state.cursor_inside = true;
                state.events.push(cursor_input(CursorEvent::Enter, position));

                // track for leave event
                _ = unsafe {
                    TrackMouseEvent(&mut TRACKMOUSEEVENT {
                        cbSize: mem::size_of::<TRACKMOUSEEVENT>() as u32,
                        dwFlags: TME_LEAVE,
                        hwndTrack: hwnd,
                        dwHoverTime: HOVER_DEFAULT,
                    })
                };
            }

            state.events.push(cursor_input(CursorEvent::Move, position));
        }

        Controls::WM_MOUSELEAVE => {
            state.cursor_inside = false;
            state
                .events
                .push(cursor_input(CursorEvent::Leave, InputPosition::default()));
        }

        msg::WM_MOUSEWHEEL | msg::WM_MOUSEHWHEEL => {
            let [_, delta] = bytemuck::cast::<_, [i16; 2]>(wparam.0 as u32);
            let axis = if msg == msg::WM_MOUSEWHEEL {
                ScrollAxis::Y
            } else {
                ScrollAxis::X
            };

            // wheel messages carry screen coordinates
            let [x, y] = bytemuck::cast::<_, [i16; 2]>(lparam.0 as u32);
            let mut point = POINT {
                x: x as i32,
                y: y as i32,
            };
            _ = unsafe { ScreenToClient(hwnd, &mut point) };

            state.events.push(cursor_input(
                CursorEvent::Scroll { axis, delta },
                InputPosition {
                    x: point.x,
                    y: point.y,
                },
            ));

            if state.capture.contains(InputCapture::CURSOR) {
                return Some(LRESULT(0));
            }
        }

        msg::WM_KEYDOWN | msg::WM_SYSKEYDOWN | msg::WM_KEYUP | msg::WM_SYSKEYUP => {
            let key = to_key(wparam, lparam)?;
            let key_state = if msg == msg::WM_KEYDOWN || msg == msg::WM_SYSKEYDOWN {
                KeyInputState::Pressed
            } else {
                KeyInputState::Released
            };
            state.events.push(keyboard_input(KeyboardInput::Key {
                key,
                state: key_state,
            }));

            let system = msg == msg::WM_SYSKEYDOWN || msg == msg::WM_SYSKEYUP;
            if state.capture.contains(InputCapture::KEYBOARD)
                && keys::can_swallow(key.code.get(), system)
            {
                return Some(LRESULT(0));
            }
        }

        msg::WM_CHAR | msg::WM_SYSCHAR => {
            if let Some(ch) = decode_char(state, wparam.0 as u16) {
                state.events.push(keyboard_input(KeyboardInput::Char(ch)));
            }

            // WM_SYSCHAR drives the system menu accelerators
            if msg == msg::WM_CHAR && state.capture.contains(InputCapture::KEYBOARD) {
                return Some(LRESULT(0));
            }
        }

        msg::WM_DESTROY => {
            trace!("overlay window destroyed");
            state.destroyed = true;
            state.events.push(WindowEvent::Destroyed);
            return Some(LRESULT(0));
        }

        _ => {}
    }

    None
}

#[inline]
const fn pressed(double_click: bool) -> CursorInputState {
    CursorInputState::Pressed { double_click }
}

#[inline]
fn x_button(wparam: WPARAM) -> CursorAction {
    let [_, button] = bytemuck::cast::<_, [u16; 2]>(wparam.0 as u32);
    if button == XBUTTON1 {
        CursorAction::Back
    } else {
        CursorAction::Forward
    }
}

#[inline]
fn client_position(lparam: LPARAM) -> InputPosition {
    let [x, y] = bytemuck::cast::<_, [i16; 2]>(lparam.0 as u32);
    InputPosition {
        x: x as i32,
        y: y as i32,
    }
}

#[inline]
fn cursor_input(event: CursorEvent, position: InputPosition) -> WindowEvent {
    WindowEvent::Input(InputEvent::Cursor(CursorInput { event, position }))
}

#[inline]
fn keyboard_input(input: KeyboardInput) -> WindowEvent {
    WindowEvent::Input(InputEvent::Keyboard(input))
}

/// `RESULT` is the value returned when the message is swallowed.
#[inline]
fn cursor_action<const RESULT: isize>(
    hwnd: HWND,
    state: &mut ProcState,
    action: CursorAction,
    input_state: CursorInputState,
    lparam: LPARAM,
) -> Option<LRESULT> {
    // keep receiving the release when dragged out of the window
    if input_state.pressed() {
        unsafe { SetCapture(hwnd) };
    } else {
        _ = unsafe { ReleaseCapture() };
    }

    state.events.push(cursor_input(
        CursorEvent::Action {
            state: input_state,
            action,
        },
        client_position(lparam),
    ));

    if state.capture.contains(InputCapture::CURSOR) {
        Some(LRESULT(RESULT))
    } else {
        None
    }
}

#[inline]
fn to_key(wparam: WPARAM, lparam: LPARAM) -> Option<Key> {
    let [_, _, _, flags] = bytemuck::cast::<_, [u8; 4]>(lparam.0 as u32);
    Key::new(wparam.0 as _, flags & 0x01 == 0x01)
}

/// Decode a UTF-16 unit of `WM_CHAR`, joining surrogate pairs.
fn decode_char(state: &mut ProcState, unit: u16) -> Option<char> {
    match unit {
        0xD800..=0xDBFF => {
            state.high_surrogate = Some(unit);
            None
        }

        0xDC00..=0xDFFF => {
            let high = state.high_surrogate.take()?;
            char::decode_utf16([high, unit]).next()?.ok()
        }

        _ => {
            state.high_surrogate = None;
            char::from_u32(unit as u32)
        }
    }
}
