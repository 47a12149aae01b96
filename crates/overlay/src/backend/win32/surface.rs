use anyhow::Context;
use tracing::debug;
use windows::{
    Win32::{
        Foundation::HWND,
        Graphics::{
            Direct3D11::{ID3D11Device, ID3D11RenderTargetView, ID3D11Texture2D},
            Dxgi::{
                Common::{
                    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC,
                    DXGI_SAMPLE_DESC,
                },
                DXGI_PRESENT, DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_EFFECT_DISCARD,
                DXGI_USAGE_RENDER_TARGET_OUTPUT, IDXGIDevice, IDXGIFactory, IDXGISwapChain,
            },
        },
    },
    core::{BOOL, Interface},
};

/// Swapchain of the overlay window and the view of its backbuffer.
pub struct Surface {
    swapchain: IDXGISwapChain,
    target: Option<ID3D11RenderTargetView>,
    size: (u32, u32),
}

impl Surface {
    #[tracing::instrument(skip(device))]
    pub fn create(
        device: &ID3D11Device,
        hwnd: HWND,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let swapchain = unsafe {
            let factory = device
                .cast::<IDXGIDevice>()?
                .GetAdapter()?
                .GetParent::<IDXGIFactory>()?;

            let mut swapchain = None;
            factory
                .CreateSwapChain(
                    device,
                    &DXGI_SWAP_CHAIN_DESC {
                        BufferDesc: DXGI_MODE_DESC {
                            Width: width,
                            Height: height,
                            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                            ..Default::default()
                        },
                        SampleDesc: DXGI_SAMPLE_DESC {
                            Count: 1,
                            Quality: 0,
                        },
                        BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                        BufferCount: 1,
                        OutputWindow: hwnd,
                        Windowed: BOOL(1),
                        SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
                        Flags: 0,
                    },
                    &mut swapchain,
                )
                .ok()
                .context("CreateSwapChain failed")?;
            swapchain.context("swapchain missing")?
        };

        let target = create_target(device, &swapchain)?;
        debug!("surface created. size: {}x{}", width, height);

        Ok(Self {
            swapchain,
            target: Some(target),
            size: (width, height),
        })
    }

    #[inline]
    pub const fn size(&self) -> (u32, u32) {
        self.size
    }

    #[inline]
    pub fn target(&self) -> Option<&ID3D11RenderTargetView> {
        self.target.as_ref()
    }

    pub fn resize(&mut self, device: &ID3D11Device, width: u32, height: u32) -> anyhow::Result<()> {
        if self.size == (width, height) {
            return Ok(());
        }

        // backbuffer references must be released before resizing
        self.target = None;
        unsafe {
            self.swapchain.ResizeBuffers(
                0,
                width,
                height,
                DXGI_FORMAT_UNKNOWN,
                DXGI_SWAP_CHAIN_FLAG(0),
            )
        }
        .context("ResizeBuffers failed")?;

        self.target = Some(create_target(device, &self.swapchain)?);
        self.size = (width, height);
        debug!("surface resized. size: {}x{}", width, height);
        Ok(())
    }

    pub fn present(&self, vsync: bool) -> anyhow::Result<()> {
        unsafe {
            self.swapchain
                .Present(if vsync { 1 } else { 0 }, DXGI_PRESENT(0))
                .ok()
                .context("Present failed")
        }
    }
}

fn create_target(
    device: &ID3D11Device,
    swapchain: &IDXGISwapChain,
) -> anyhow::Result<ID3D11RenderTargetView> {
    unsafe {
        let back_buffer = swapchain.GetBuffer::<ID3D11Texture2D>(0)?;

        let mut target = None;
        device.CreateRenderTargetView(&back_buffer, None, Some(&mut target))?;
        target.context("cannot create render target")
    }
}
