//! Win32 window rendered with Direct3D 11.

mod cursor;
mod proc;
mod renderer;
mod surface;
mod window;

use core::ptr;

use anyhow::Context;
use egui::{CursorIcon, Pos2};
use glasspane_event::{WindowEvent, input::Modifiers};
use tracing::debug;
use windows::Win32::{
    Foundation::HMODULE,
    Graphics::{
        Direct3D::D3D_DRIVER_TYPE_HARDWARE,
        Direct3D11::{
            D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_SDK_VERSION, D3D11CreateDevice, ID3D11Device,
            ID3D11DeviceContext,
        },
        Dxgi::IDXGIAdapter,
    },
    UI::WindowsAndMessaging::{WS_EX_LAYERED, WS_EX_TRANSPARENT},
};

use self::{renderer::Renderer, surface::Surface, window::Window};
use super::{Backend, BackendFactory, RenderFrame};
use crate::{
    clickthrough::{EX_LAYERED, EX_TRANSPARENT, NativeStyle},
    input::InputCapture,
    overlay::OverlayOptions,
};

const _: () = assert!(WS_EX_LAYERED.0 == EX_LAYERED && WS_EX_TRANSPARENT.0 == EX_TRANSPARENT);

/// Creates a [`Win32Backend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Factory;

impl BackendFactory for Win32Factory {
    type Backend = Win32Backend;

    fn create(self, options: &OverlayOptions) -> anyhow::Result<Win32Backend> {
        Win32Backend::new(options)
    }
}

pub struct Win32Backend {
    renderer: Renderer,
    surface: Option<Surface>,
    cx: ID3D11DeviceContext,
    device: ID3D11Device,

    // dropped after every GPU resource
    window: Window,
}

impl Win32Backend {
    #[tracing::instrument(skip(options))]
    fn new(options: &OverlayOptions) -> anyhow::Result<Self> {
        crate::declare_dpi_awareness();

        let window = Window::create(options)?;
        let (device, cx) = create_device()?;
        let renderer = Renderer::new(&device).context("failed to create renderer")?;

        Ok(Self {
            renderer,
            surface: None,
            cx,
            device,
            window,
        })
    }
}

impl NativeStyle for Win32Backend {
    fn ex_style(&self) -> anyhow::Result<u32> {
        self.window.ex_style()
    }

    fn set_ex_style(&mut self, style: u32) -> anyhow::Result<()> {
        self.window.set_ex_style(style)
    }

    fn extend_frame_into_client_area(&mut self) -> anyhow::Result<()> {
        self.window.extend_frame_into_client_area()
    }

    fn focus(&mut self) -> anyhow::Result<()> {
        self.window.focus()
    }
}

impl Backend for Win32Backend {
    fn pump_message(&mut self, events: &mut Vec<WindowEvent>) -> anyhow::Result<()> {
        self.window.pump(events);
        Ok(())
    }

    fn client_size(&self) -> (u32, u32) {
        self.window.client_size()
    }

    fn cursor_position(&self) -> Option<Pos2> {
        self.window.cursor_position()
    }

    fn modifiers(&self) -> Modifiers {
        self.window.modifiers()
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        self.window.set_cursor(cursor::load_cursor(cursor));
    }

    fn set_capture(&mut self, capture: InputCapture) {
        self.window.set_capture(capture);
    }

    fn set_position(&mut self, x: i32, y: i32) -> anyhow::Result<()> {
        self.window.set_position(x, y)
    }

    fn set_size(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.window.set_size(width, height)
    }

    fn set_visible(&mut self, visible: bool) -> anyhow::Result<()> {
        self.window.set_visible(visible);
        Ok(())
    }

    fn recreate_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        self.surface = None;
        unsafe {
            self.cx.ClearState();
            self.cx.Flush();
        }

        self.surface = Some(Surface::create(
            &self.device,
            self.window.hwnd(),
            width.max(1),
            height.max(1),
        )?);
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        match self.surface {
            Some(ref mut surface) => {
                unsafe {
                    self.cx.OMSetRenderTargets(None, None);
                }
                surface.resize(&self.device, width, height)
            }

            None => self.recreate_surface(width, height),
        }
    }

    fn render(&mut self, frame: RenderFrame) -> anyhow::Result<()> {
        let surface = self.surface.as_ref().context("render surface is not created")?;
        let target = surface
            .target()
            .context("render surface has no render target")?
            .clone();

        self.renderer
            .render(&self.device, &self.cx, &target, surface.size(), frame)
    }

    fn present(&mut self, vsync: bool) -> anyhow::Result<()> {
        self.surface
            .as_ref()
            .context("render surface is not created")?
            .present(vsync)
    }
}

impl Drop for Win32Backend {
    fn drop(&mut self) {
        unsafe {
            self.cx.ClearState();
            self.cx.Flush();
        }
        debug!("win32 backend cleanup");
    }
}

fn create_device() -> anyhow::Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device = None;
    let mut cx = None;
    unsafe {
        D3D11CreateDevice(
            None::<&IDXGIAdapter>,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE(ptr::null_mut()),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut cx),
        )
        .context("D3D11CreateDevice failed")?;
    }

    Ok((
        device.context("D3D11 device missing")?,
        cx.context("D3D11 device context missing")?,
    ))
}
