//! Backend without a window or a GPU.
//!
//! Records every operation so the render loop can be observed on any platform.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use anyhow::bail;
use egui::{CursorIcon, Pos2, TextureId, epaint::Primitive};
use glasspane_event::{WindowEvent, input::Modifiers};
use parking_lot::Mutex;
use tracing::trace;

use super::{Backend, BackendFactory, PAINT_CALLBACK_UNSUPPORTED, RenderFrame};
use crate::{clickthrough::NativeStyle, input::InputCapture, overlay::OverlayOptions};

/// `WS_EX_TOOLWINDOW | WS_EX_TOPMOST`
const INITIAL_EX_STYLE: u32 = 0x0000_0080 | 0x0000_0008;

/// Operation performed on a headless backend.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessOp {
    Created { width: u32, height: u32 },
    SetStyle(u32),
    ExtendFrame,
    Focus,
    SetCursor(CursorIcon),
    SetCapture(InputCapture),
    SetPosition(i32, i32),
    SetSize(u32, u32),
    SetVisible(bool),
    RecreateSurface(u32, u32),
    ResizeSurface(u32, u32),
    Render { primitives: usize },
    Present { vsync: bool },
    Dropped,
}

#[derive(Default)]
struct Probe {
    ops: Mutex<Vec<HeadlessOp>>,
    events: Mutex<VecDeque<WindowEvent>>,
    textures: Mutex<HashSet<TextureId>>,
    cursor: Mutex<Option<Pos2>>,
    modifiers: Mutex<Modifiers>,
    fail_create: Mutex<Option<String>>,
}

/// Creates a [`HeadlessBackend`]. Clones observe the same backend.
#[derive(Clone, Default)]
pub struct HeadlessFactory {
    probe: Arc<Probe>,
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make backend creation fail with `message`.
    pub fn fail_create(&self, message: impl Into<String>) {
        *self.probe.fail_create.lock() = Some(message.into());
    }

    /// Queue a native event for the window.
    pub fn push_event(&self, event: WindowEvent) {
        self.probe.events.lock().push_back(event);
    }

    pub fn set_cursor_position(&self, position: Option<Pos2>) {
        *self.probe.cursor.lock() = position;
    }

    pub fn set_modifiers(&self, modifiers: Modifiers) {
        *self.probe.modifiers.lock() = modifiers;
    }

    /// Operations performed so far.
    pub fn ops(&self) -> Vec<HeadlessOp> {
        self.probe.ops.lock().clone()
    }

    pub fn count(&self, f: impl Fn(&HeadlessOp) -> bool) -> usize {
        self.probe.ops.lock().iter().filter(|op| f(op)).count()
    }

    /// Textures uploaded and not freed.
    pub fn live_textures(&self) -> usize {
        self.probe.textures.lock().len()
    }
}

impl BackendFactory for HeadlessFactory {
    type Backend = HeadlessBackend;

    fn create(self, options: &OverlayOptions) -> anyhow::Result<HeadlessBackend> {
        if let Some(message) = self.probe.fail_create.lock().take() {
            bail!("{}", message);
        }

        let (width, height) = options.size;
        let backend = HeadlessBackend {
            probe: self.probe,
            style: INITIAL_EX_STYLE,
            size: (width, height),
            visible: false,
            shown: options.visible,
        };
        backend.record(HeadlessOp::Created { width, height });
        if options.visible {
            backend.probe.events.lock().push_front(WindowEvent::Shown { first: true });
        }

        Ok(backend)
    }
}

pub struct HeadlessBackend {
    probe: Arc<Probe>,
    style: u32,
    size: (u32, u32),
    visible: bool,
    shown: bool,
}

impl HeadlessBackend {
    fn record(&self, op: HeadlessOp) {
        trace!("headless {:?}", op);
        self.probe.ops.lock().push(op);
    }

    fn push_event(&self, event: WindowEvent) {
        self.probe.events.lock().push_back(event);
    }
}

impl NativeStyle for HeadlessBackend {
    fn ex_style(&self) -> anyhow::Result<u32> {
        Ok(self.style)
    }

    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
        self.style = style;
        self.record(HeadlessOp::SetStyle(style));
        Ok(())
    }

    fn extend_frame_into_client_area(&mut self) -> anyhow::Result<()> {
        self.record(HeadlessOp::ExtendFrame);
        Ok(())
    }

    fn focus(&mut self) -> anyhow::Result<()> {
        self.record(HeadlessOp::Focus);
        Ok(())
    }
}

impl Backend for HeadlessBackend {
    fn pump_message(&mut self, events: &mut Vec<WindowEvent>) -> anyhow::Result<()> {
        let Some(event) = self.probe.events.lock().pop_front() else {
            return Ok(());
        };

        match event {
            WindowEvent::Shown { .. } => self.visible = true,
            WindowEvent::Hidden => self.visible = false,
            WindowEvent::Resized { width, height } => self.size = (width, height),
            _ => {}
        }
        events.push(event);

        Ok(())
    }

    fn client_size(&self) -> (u32, u32) {
        self.size
    }

    fn cursor_position(&self) -> Option<Pos2> {
        *self.probe.cursor.lock()
    }

    fn modifiers(&self) -> Modifiers {
        *self.probe.modifiers.lock()
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        self.record(HeadlessOp::SetCursor(cursor));
    }

    fn set_capture(&mut self, capture: InputCapture) {
        self.record(HeadlessOp::SetCapture(capture));
    }

    fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()> {
        self.record(HeadlessOp::SetPosition(x, y));
        self.push_event(WindowEvent::Moved { x, y });
        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.record(HeadlessOp::SetSize(width, height));
        self.push_event(WindowEvent::Resized { width, height });
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> anyhow::Result<()> {
        self.record(HeadlessOp::SetVisible(visible));
        if visible != self.visible {
            let event = if visible {
                let first = !self.shown;
                self.shown = true;
                WindowEvent::Shown { first }
            } else {
                WindowEvent::Hidden
            };
            self.push_event(event);
        }

        Ok(())
    }

    fn recreate_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.record(HeadlessOp::RecreateSurface(width, height));
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.record(HeadlessOp::ResizeSurface(width, height));
        Ok(())
    }

    fn render(&mut self, frame: RenderFrame) -> anyhow::Result<()> {
        {
            let mut textures = self.probe.textures.lock();
            for (id, _) in &frame.textures_delta.set {
                textures.insert(*id);
            }

            for primitive in frame.primitives {
                if let Primitive::Callback(_) = primitive.primitive {
                    bail!(PAINT_CALLBACK_UNSUPPORTED);
                }
            }

            for id in &frame.textures_delta.free {
                textures.remove(id);
            }
        }

        self.record(HeadlessOp::Render {
            primitives: frame.primitives.len(),
        });
        Ok(())
    }

    fn present(&mut self, vsync: bool) -> anyhow::Result<()> {
        self.record(HeadlessOp::Present { vsync });
        Ok(())
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        self.probe.textures.lock().clear();
        self.record(HeadlessOp::Dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(backend: &mut HeadlessBackend) -> Vec<WindowEvent> {
        let mut events = vec![];
        while backend.probe.events.lock().len() > 0 {
            backend.pump_message(&mut events).unwrap();
        }
        events
    }

    #[test]
    fn visibility_changes_raise_events() {
        let factory = HeadlessFactory::new();
        let mut backend = factory
            .clone()
            .create(&OverlayOptions {
                visible: false,
                ..Default::default()
            })
            .unwrap();
        assert!(pump(&mut backend).is_empty());

        backend.set_visible(true).unwrap();
        assert_eq!(pump(&mut backend), [WindowEvent::Shown { first: true }]);

        // already visible
        backend.set_visible(true).unwrap();
        assert!(pump(&mut backend).is_empty());

        backend.set_visible(false).unwrap();
        assert_eq!(pump(&mut backend), [WindowEvent::Hidden]);

        backend.set_visible(true).unwrap();
        assert_eq!(pump(&mut backend), [WindowEvent::Shown { first: false }]);

        assert_eq!(factory.count(|op| matches!(op, HeadlessOp::SetVisible(_))), 4);
    }
}
