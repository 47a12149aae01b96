//! Translation between native window input and egui.

pub mod keys;

use std::{collections::HashSet, time::Instant};

use egui::{
    CursorIcon, Event, MouseWheelUnit, PlatformOutput, PointerButton, Pos2, RawInput, Rect, Vec2,
    pos2, vec2,
};
use glasspane_event::input::{
    CURSOR_BUTTONS, CursorAction, CursorEvent, InputEvent, KeyInputState, KeyboardInput,
    Modifiers, ScrollAxis, WHEEL_DELTA,
};
use tracing::trace;

bitflags::bitflags! {
    /// Inputs egui consumed in the last frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputCapture: u8 {
        const CURSOR = 0b00000001;
        const KEYBOARD = 0b00000010;
    }
}

/// Result of a finished frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCapture {
    pub capture: InputCapture,

    /// New cursor icon, if it changed since the previous frame.
    pub cursor: Option<CursorIcon>,
}

/// Collects native input between frames and feeds it to egui.
pub struct InputBridge {
    events: Vec<Event>,
    modifiers: egui::Modifiers,
    pointer: Option<Pos2>,
    buttons: [bool; CURSOR_BUTTONS],
    keys_down: HashSet<egui::Key>,
    focused: bool,
    cursor: Option<CursorIcon>,
    screen_size: Vec2,
    start: Instant,
}

impl InputBridge {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            events: Vec::new(),
            modifiers: egui::Modifiers::NONE,
            pointer: None,
            buttons: [false; CURSOR_BUTTONS],
            keys_down: HashSet::new(),
            focused: true,
            cursor: None,
            screen_size: vec2(width as f32, height as f32),
            start: Instant::now(),
        }
    }

    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_size = vec2(width as f32, height as f32);
    }

    #[inline]
    pub fn screen_size(&self) -> Vec2 {
        self.screen_size
    }

    pub fn set_focused(&mut self, focused: bool) {
        if self.focused == focused {
            return;
        }

        self.focused = focused;
        self.events.push(Event::WindowFocused(focused));
    }

    /// Whether if a button press was delivered without a matching release.
    pub fn any_button_down(&self) -> bool {
        self.buttons.iter().any(|down| *down)
    }

    pub fn handle_input(&mut self, input: &InputEvent) {
        match input {
            InputEvent::Cursor(input) => {
                let pos = pos2(input.position.x as f32, input.position.y as f32);

                match input.event {
                    CursorEvent::Enter | CursorEvent::Move => {
                        self.pointer = Some(pos);
                        self.events.push(Event::PointerMoved(pos));
                    }

                    CursorEvent::Leave => {
                        self.pointer = None;
                        self.events.push(Event::PointerGone);
                    }

                    CursorEvent::Action { state, action } => {
                        let pressed = state.pressed();
                        self.buttons[action.index()] = pressed;
                        self.events.push(Event::PointerButton {
                            pos: self.pointer.unwrap_or(pos),
                            button: to_pointer_button(action),
                            pressed,
                            modifiers: self.modifiers,
                        });
                    }

                    CursorEvent::Scroll { axis, delta } => {
                        let notches = delta as f32 / WHEEL_DELTA as f32;
                        let delta = match axis {
                            ScrollAxis::X => vec2(-notches, 0.0),
                            ScrollAxis::Y => vec2(0.0, notches),
                        };

                        self.events.push(Event::MouseWheel {
                            unit: MouseWheelUnit::Line,
                            delta,
                            modifiers: self.modifiers,
                        });
                    }
                }
            }

            InputEvent::Keyboard(KeyboardInput::Key { key, state }) => {
                let vk = key.code.get();
                if keys::is_reserved(vk) {
                    return;
                }
                let Some(key) = keys::to_egui_key(vk) else {
                    return;
                };

                let pressed = *state == KeyInputState::Pressed;
                let repeat = if pressed {
                    !self.keys_down.insert(key)
                } else {
                    self.keys_down.remove(&key);
                    false
                };

                self.events.push(Event::Key {
                    key,
                    physical_key: None,
                    pressed,
                    repeat,
                    modifiers: self.modifiers,
                });
            }

            InputEvent::Keyboard(KeyboardInput::Char(ch)) => {
                if !ch.is_control() {
                    self.events.push(Event::Text(ch.to_string()));
                }
            }
        }
    }

    /// Build the input of the next frame.
    ///
    /// `pointer` is the cursor position polled from the system. A click-through
    /// window receives no cursor messages so hover is tracked from it.
    pub fn begin_frame(&mut self, modifiers: Modifiers, pointer: Option<Pos2>) -> RawInput {
        self.modifiers = to_egui_modifiers(modifiers);

        if let Some(pos) = pointer {
            if self.pointer != Some(pos) {
                self.pointer = Some(pos);
                self.events.push(Event::PointerMoved(pos));
            }
        }

        RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, self.screen_size)),
            time: Some(self.start.elapsed().as_secs_f64()),
            modifiers: self.modifiers,
            events: std::mem::take(&mut self.events),
            focused: self.focused,
            ..Default::default()
        }
    }

    /// Read what egui consumed in the finished frame.
    pub fn end_frame(&mut self, ctx: &egui::Context, output: &PlatformOutput) -> FrameCapture {
        let mut capture = InputCapture::empty();
        capture.set(InputCapture::CURSOR, ctx.wants_pointer_input());
        capture.set(InputCapture::KEYBOARD, ctx.wants_keyboard_input());

        // button released outside of the window while click-through
        if !capture.contains(InputCapture::CURSOR)
            && (self.any_button_down() || ctx.input(|input| input.pointer.any_down()))
        {
            trace!("releasing stuck cursor buttons");
            self.release_buttons();
        }

        let cursor = if self.cursor != Some(output.cursor_icon) {
            self.cursor = Some(output.cursor_icon);
            Some(output.cursor_icon)
        } else {
            None
        };

        FrameCapture { capture, cursor }
    }

    fn release_buttons(&mut self) {
        let pos = self.pointer.unwrap_or(Pos2::ZERO);
        for action in CursorAction::ALL {
            self.buttons[action.index()] = false;
            self.events.push(Event::PointerButton {
                pos,
                button: to_pointer_button(action),
                pressed: false,
                modifiers: self.modifiers,
            });
        }
    }
}

fn to_pointer_button(action: CursorAction) -> PointerButton {
    match action {
        CursorAction::Left => PointerButton::Primary,
        CursorAction::Right => PointerButton::Secondary,
        CursorAction::Middle => PointerButton::Middle,
        CursorAction::Back => PointerButton::Extra1,
        CursorAction::Forward => PointerButton::Extra2,
    }
}

fn to_egui_modifiers(modifiers: Modifiers) -> egui::Modifiers {
    let ctrl = modifiers.contains(Modifiers::CTRL);
    egui::Modifiers {
        alt: modifiers.contains(Modifiers::ALT),
        ctrl,
        shift: modifiers.contains(Modifiers::SHIFT),
        mac_cmd: false,
        command: ctrl,
    }
}

#[cfg(test)]
mod tests {
    use glasspane_event::input::{
        CursorInput, CursorInputState, InputPosition, Key as NativeKey,
    };

    use super::*;

    fn cursor(event: CursorEvent, x: i32, y: i32) -> InputEvent {
        InputEvent::Cursor(CursorInput {
            event,
            position: InputPosition { x, y },
        })
    }

    fn key(vk: u8, state: KeyInputState) -> InputEvent {
        InputEvent::Keyboard(KeyboardInput::Key {
            key: NativeKey::new(vk, false).unwrap(),
            state,
        })
    }

    fn run_empty(ctx: &egui::Context, raw: RawInput) -> PlatformOutput {
        ctx.run(raw, |_| {}).platform_output
    }

    #[test]
    fn stuck_click_is_released() {
        let ctx = egui::Context::default();
        let mut bridge = InputBridge::new(800, 600);

        bridge.handle_input(&cursor(CursorEvent::Move, 10, 10));
        bridge.handle_input(&cursor(
            CursorEvent::Action {
                state: CursorInputState::Pressed {
                    double_click: false,
                },
                action: CursorAction::Left,
            },
            10,
            10,
        ));
        assert!(bridge.any_button_down());

        let raw = bridge.begin_frame(Modifiers::empty(), None);
        let output = run_empty(&ctx, raw);
        let frame = bridge.end_frame(&ctx, &output);

        assert!(!frame.capture.contains(InputCapture::CURSOR));
        assert!(!bridge.any_button_down());

        let raw = bridge.begin_frame(Modifiers::empty(), None);
        let releases = raw
            .events
            .iter()
            .filter(|event| matches!(event, Event::PointerButton { pressed: false, .. }))
            .count();
        assert_eq!(releases, CURSOR_BUTTONS);
    }

    #[test]
    fn cursor_forwarded_only_on_change() {
        let ctx = egui::Context::default();
        let mut bridge = InputBridge::new(800, 600);

        let raw = bridge.begin_frame(Modifiers::empty(), None);
        let output = run_empty(&ctx, raw);
        assert_eq!(
            bridge.end_frame(&ctx, &output).cursor,
            Some(output.cursor_icon)
        );

        let raw = bridge.begin_frame(Modifiers::empty(), None);
        let output = run_empty(&ctx, raw);
        assert_eq!(bridge.end_frame(&ctx, &output).cursor, None);
    }

    #[test]
    fn reserved_keys_are_dropped() {
        let mut bridge = InputBridge::new(800, 600);

        // VK_MENU, VK_LWIN
        bridge.handle_input(&key(0x12, KeyInputState::Pressed));
        bridge.handle_input(&key(0x5B, KeyInputState::Pressed));
        assert!(bridge.begin_frame(Modifiers::empty(), None).events.is_empty());

        bridge.handle_input(&key(b'A', KeyInputState::Pressed));
        bridge.handle_input(&key(b'A', KeyInputState::Pressed));
        bridge.handle_input(&key(b'A', KeyInputState::Released));
        let events = bridge.begin_frame(Modifiers::empty(), None).events;
        let repeats: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::Key {
                    key: egui::Key::A,
                    pressed,
                    repeat,
                    ..
                } => Some((*pressed, *repeat)),
                _ => None,
            })
            .collect();
        assert_eq!(repeats, [(true, false), (true, true), (false, false)]);
    }

    #[test]
    fn polled_pointer_moves_once() {
        let mut bridge = InputBridge::new(800, 600);

        let raw = bridge.begin_frame(Modifiers::CTRL, Some(pos2(5.0, 6.0)));
        assert_eq!(raw.events, [Event::PointerMoved(pos2(5.0, 6.0))]);
        assert!(raw.modifiers.ctrl);

        let raw = bridge.begin_frame(Modifiers::empty(), Some(pos2(5.0, 6.0)));
        assert!(raw.events.is_empty());
    }

    #[test]
    fn wheel_notches() {
        let mut bridge = InputBridge::new(800, 600);
        bridge.handle_input(&cursor(
            CursorEvent::Scroll {
                axis: ScrollAxis::Y,
                delta: -WHEEL_DELTA * 2,
            },
            0,
            0,
        ));

        let raw = bridge.begin_frame(Modifiers::empty(), None);
        assert!(matches!(
            raw.events.as_slice(),
            [Event::MouseWheel { delta, .. }] if *delta == vec2(0.0, -2.0)
        ));
    }
}
