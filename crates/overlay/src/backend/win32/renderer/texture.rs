use core::ffi::c_void;
use std::{borrow::Cow, collections::HashMap};

use anyhow::{Context, bail};
use egui::{Color32, ImageData, TextureFilter, TextureId, epaint::ImageDelta};
use tracing::trace;
use windows::Win32::Graphics::{
    Direct3D11::{
        D3D11_BIND_SHADER_RESOURCE, D3D11_BOX, D3D11_SUBRESOURCE_DATA, D3D11_TEXTURE2D_DESC,
        D3D11_USAGE_DEFAULT, ID3D11Device, ID3D11DeviceContext, ID3D11ShaderResourceView,
        ID3D11Texture2D,
    },
    Dxgi::Common::{DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC},
};

pub struct GpuTexture {
    texture: ID3D11Texture2D,
    pub view: ID3D11ShaderResourceView,
    size: [usize; 2],
    pub nearest: bool,
}

/// Textures uploaded from egui texture deltas.
#[derive(Default)]
pub struct TextureMap {
    textures: HashMap<TextureId, GpuTexture>,
}

impl TextureMap {
    #[inline]
    pub fn get(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(&id)
    }

    pub fn update(
        &mut self,
        device: &ID3D11Device,
        cx: &ID3D11DeviceContext,
        id: TextureId,
        delta: &ImageDelta,
    ) -> anyhow::Result<()> {
        let (size, pixels) = image_pixels(&delta.image);
        if size[0] == 0 || size[1] == 0 {
            return Ok(());
        }

        let Some([x, y]) = delta.pos else {
            trace!("creating texture {:?} size: {:?}", id, size);
            let texture = create_texture(device, size, &pixels)?;
            let mut view = None;
            unsafe { device.CreateShaderResourceView(&texture, None, Some(&mut view)) }?;

            self.textures.insert(
                id,
                GpuTexture {
                    texture,
                    view: view.context("cannot create texture view")?,
                    size,
                    nearest: delta.options.magnification == TextureFilter::Nearest,
                },
            );
            return Ok(());
        };

        let Some(texture) = self.textures.get(&id) else {
            bail!("partial update of unknown texture {:?}", id);
        };
        if x + size[0] > texture.size[0] || y + size[1] > texture.size[1] {
            bail!(
                "partial update of texture {:?} out of bounds. pos: {:?} size: {:?}",
                id,
                (x, y),
                size
            );
        }

        unsafe {
            cx.UpdateSubresource(
                &texture.texture,
                0,
                Some(&D3D11_BOX {
                    left: x as u32,
                    top: y as u32,
                    front: 0,
                    right: (x + size[0]) as u32,
                    bottom: (y + size[1]) as u32,
                    back: 1,
                }),
                pixels.as_ptr() as *const c_void,
                (size[0] * 4) as u32,
                0,
            );
        }

        Ok(())
    }

    pub fn free(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            trace!("texture {:?} freed", id);
        }
    }
}

fn image_pixels(image: &ImageData) -> ([usize; 2], Cow<'_, [Color32]>) {
    match image {
        ImageData::Color(image) => (image.size, Cow::Borrowed(&image.pixels)),
        ImageData::Font(image) => (image.size, Cow::Owned(image.srgba_pixels(None).collect())),
    }
}

fn create_texture(
    device: &ID3D11Device,
    size: [usize; 2],
    pixels: &[Color32],
) -> anyhow::Result<ID3D11Texture2D> {
    let mut texture = None;
    unsafe {
        device.CreateTexture2D(
            &D3D11_TEXTURE2D_DESC {
                Width: size[0] as u32,
                Height: size[1] as u32,
                MipLevels: 1,
                ArraySize: 1,
                Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    Quality: 0,
                },
                Usage: D3D11_USAGE_DEFAULT,
                BindFlags: D3D11_BIND_SHADER_RESOURCE.0 as _,
                CPUAccessFlags: 0,
                MiscFlags: 0,
            },
            Some(&D3D11_SUBRESOURCE_DATA {
                pSysMem: pixels.as_ptr() as *const c_void,
                SysMemPitch: (size[0] * 4) as u32,
                SysMemSlicePitch: 0,
            }),
            Some(&mut texture),
        )?;
    }

    texture.context("cannot create texture")
}
