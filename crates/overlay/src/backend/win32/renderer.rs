mod texture;

use core::{ffi::c_void, mem, ptr, slice};

use anyhow::{Context, bail};
use egui::{ClippedPrimitive, Rect, epaint::Primitive};
use tracing::trace;
use windows::{
    Win32::{
        Foundation::RECT,
        Graphics::{
            Direct3D::{
                D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST, ID3DBlob,
                Fxc::{D3DCOMPILE_OPTIMIZATION_LEVEL3, D3DCOMPILE_WARNINGS_ARE_ERRORS, D3DCompile},
            },
            Direct3D11::*,
            Dxgi::Common::{
                DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_FORMAT_R32_UINT, DXGI_FORMAT_R32G32_FLOAT,
            },
        },
    },
    core::{BOOL, PCSTR, s},
};

use self::texture::TextureMap;
use crate::backend::{PAINT_CALLBACK_UNSUPPORTED, RenderFrame};

const EGUI_SHADER: &str = include_str!("renderer/egui.hlsl");

const INPUT_DESC: [D3D11_INPUT_ELEMENT_DESC; 3] = [
    D3D11_INPUT_ELEMENT_DESC {
        SemanticName: s!("POSITION"),
        SemanticIndex: 0,
        Format: DXGI_FORMAT_R32G32_FLOAT,
        InputSlot: 0,
        AlignedByteOffset: 0,
        InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
        InstanceDataStepRate: 0,
    },
    D3D11_INPUT_ELEMENT_DESC {
        SemanticName: s!("TEXCOORD"),
        SemanticIndex: 0,
        Format: DXGI_FORMAT_R32G32_FLOAT,
        InputSlot: 0,
        AlignedByteOffset: 8,
        InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
        InstanceDataStepRate: 0,
    },
    D3D11_INPUT_ELEMENT_DESC {
        SemanticName: s!("COLOR"),
        SemanticIndex: 0,
        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
        InputSlot: 0,
        AlignedByteOffset: 16,
        InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
        InstanceDataStepRate: 0,
    },
];

/// Dynamic buffer growing to the largest frame seen.
struct DynamicBuffer {
    buffer: Option<ID3D11Buffer>,
    capacity: usize,
    bind: D3D11_BIND_FLAG,
}

impl DynamicBuffer {
    const fn new(bind: D3D11_BIND_FLAG) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            bind,
        }
    }

    /// Reserve at least `size` bytes and write `chunks` back to back.
    fn write<'a>(
        &mut self,
        device: &ID3D11Device,
        cx: &ID3D11DeviceContext,
        size: usize,
        chunks: impl Iterator<Item = &'a [u8]>,
    ) -> anyhow::Result<&ID3D11Buffer> {
        if self.buffer.is_none() || self.capacity < size {
            let capacity = size.next_power_of_two().max(4096);
            trace!("growing buffer to {} bytes", capacity);

            let mut buffer = None;
            unsafe {
                device.CreateBuffer(
                    &D3D11_BUFFER_DESC {
                        ByteWidth: capacity as _,
                        Usage: D3D11_USAGE_DYNAMIC,
                        BindFlags: self.bind.0 as _,
                        CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as _,
                        MiscFlags: 0,
                        StructureByteStride: 0,
                    },
                    None,
                    Some(&mut buffer),
                )?;
            }
            self.buffer = Some(buffer.context("cannot create buffer")?);
            self.capacity = capacity;
        }
        let buffer = self.buffer.as_ref().context("buffer missing")?;

        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            cx.Map(buffer, 0, D3D11_MAP_WRITE_DISCARD, 0, Some(&mut mapped))?;

            let mut offset = 0;
            for chunk in chunks {
                ptr::copy_nonoverlapping(
                    chunk.as_ptr(),
                    mapped.pData.cast::<u8>().add(offset),
                    chunk.len(),
                );
                offset += chunk.len();
            }
            cx.Unmap(buffer, 0);
        }

        Ok(buffer)
    }
}

/// Draws egui primitives to a render target.
pub struct Renderer {
    input_layout: ID3D11InputLayout,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    constant_buffer: ID3D11Buffer,
    blend_state: ID3D11BlendState,
    rasterizer: ID3D11RasterizerState,
    linear_sampler: ID3D11SamplerState,
    nearest_sampler: ID3D11SamplerState,

    vertices: DynamicBuffer,
    indices: DynamicBuffer,
    textures: TextureMap,
}

impl Renderer {
    #[tracing::instrument(skip(device))]
    pub fn new(device: &ID3D11Device) -> anyhow::Result<Self> {
        unsafe {
            let vs_blob = compile(s!("vs_main"), s!("vs_5_0"))?;
            let vs_bytes = blob_bytes(&vs_blob);

            let mut input_layout = None;
            device.CreateInputLayout(&INPUT_DESC, vs_bytes, Some(&mut input_layout))?;
            let input_layout = input_layout.context("failed to create input layout")?;

            let mut vertex_shader = None;
            device.CreateVertexShader(vs_bytes, None, Some(&mut vertex_shader))?;
            let vertex_shader = vertex_shader.context("vertex shader failed to link")?;

            let ps_blob = compile(s!("ps_main"), s!("ps_5_0"))?;
            let mut pixel_shader = None;
            device.CreatePixelShader(blob_bytes(&ps_blob), None, Some(&mut pixel_shader))?;
            let pixel_shader = pixel_shader.context("pixel shader failed to link")?;

            let mut constant_buffer = None;
            device.CreateBuffer(
                &D3D11_BUFFER_DESC {
                    ByteWidth: mem::size_of::<[f32; 4]>() as _,
                    Usage: D3D11_USAGE_DYNAMIC,
                    BindFlags: D3D11_BIND_CONSTANT_BUFFER.0 as _,
                    CPUAccessFlags: D3D11_CPU_ACCESS_WRITE.0 as _,
                    MiscFlags: 0,
                    StructureByteStride: 0,
                },
                None,
                Some(&mut constant_buffer),
            )?;
            let constant_buffer = constant_buffer.context("cannot create constant buffer")?;

            // premultiplied alpha, keeping coverage in the backbuffer alpha for composition
            let mut blend_state = None;
            device.CreateBlendState(
                &D3D11_BLEND_DESC {
                    AlphaToCoverageEnable: BOOL(0),
                    IndependentBlendEnable: BOOL(0),
                    RenderTarget: [D3D11_RENDER_TARGET_BLEND_DESC {
                        BlendEnable: BOOL(1),
                        SrcBlend: D3D11_BLEND_ONE,
                        DestBlend: D3D11_BLEND_INV_SRC_ALPHA,
                        BlendOp: D3D11_BLEND_OP_ADD,
                        SrcBlendAlpha: D3D11_BLEND_ONE,
                        DestBlendAlpha: D3D11_BLEND_INV_SRC_ALPHA,
                        BlendOpAlpha: D3D11_BLEND_OP_ADD,
                        RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as _,
                    }; 8],
                },
                Some(&mut blend_state),
            )?;
            let blend_state = blend_state.context("cannot create blend state")?;

            let mut rasterizer = None;
            device.CreateRasterizerState(
                &D3D11_RASTERIZER_DESC {
                    FillMode: D3D11_FILL_SOLID,
                    CullMode: D3D11_CULL_NONE,
                    DepthClipEnable: BOOL(1),
                    ScissorEnable: BOOL(1),
                    ..Default::default()
                },
                Some(&mut rasterizer),
            )?;
            let rasterizer = rasterizer.context("cannot create rasterizer state")?;

            Ok(Self {
                input_layout,
                vertex_shader,
                pixel_shader,
                constant_buffer,
                blend_state,
                rasterizer,
                linear_sampler: create_sampler(device, D3D11_FILTER_MIN_MAG_MIP_LINEAR)?,
                nearest_sampler: create_sampler(device, D3D11_FILTER_MIN_MAG_MIP_POINT)?,

                vertices: DynamicBuffer::new(D3D11_BIND_VERTEX_BUFFER),
                indices: DynamicBuffer::new(D3D11_BIND_INDEX_BUFFER),
                textures: TextureMap::default(),
            })
        }
    }

    /// Upload texture changes, clear `target` and draw the frame.
    #[tracing::instrument(skip_all)]
    pub fn render(
        &mut self,
        device: &ID3D11Device,
        cx: &ID3D11DeviceContext,
        target: &ID3D11RenderTargetView,
        size: (u32, u32),
        frame: RenderFrame,
    ) -> anyhow::Result<()> {
        for (id, delta) in &frame.textures_delta.set {
            self.textures.update(device, cx, *id, delta)?;
        }

        unsafe {
            cx.OMSetRenderTargets(Some(&[Some(target.clone())]), None);
            cx.ClearRenderTargetView(target, &frame.clear_color);
        }

        if size.0 > 0 && size.1 > 0 {
            self.draw(device, cx, size, &frame)?;
        }

        for id in &frame.textures_delta.free {
            self.textures.free(*id);
        }

        Ok(())
    }

    fn draw(
        &mut self,
        device: &ID3D11Device,
        cx: &ID3D11DeviceContext,
        size: (u32, u32),
        frame: &RenderFrame,
    ) -> anyhow::Result<()> {
        let mut vertex_count = 0;
        let mut index_count = 0;
        for primitive in frame.primitives {
            match primitive.primitive {
                Primitive::Mesh(ref mesh) => {
                    vertex_count += mesh.vertices.len();
                    index_count += mesh.indices.len();
                }
                Primitive::Callback(_) => bail!(PAINT_CALLBACK_UNSUPPORTED),
            }
        }
        if index_count == 0 {
            return Ok(());
        }

        let meshes = || {
            frame.primitives.iter().filter_map(|primitive| match primitive.primitive {
                Primitive::Mesh(ref mesh) => Some(mesh),
                Primitive::Callback(_) => None,
            })
        };

        let vertex_size = mem::size_of::<egui::epaint::Vertex>();
        let vertex_buffer = self
            .vertices
            .write(
                device,
                cx,
                vertex_count * vertex_size,
                meshes().map(|mesh| unsafe {
                    slice::from_raw_parts(
                        mesh.vertices.as_ptr().cast::<u8>(),
                        mesh.vertices.len() * vertex_size,
                    )
                }),
            )?
            .clone();
        let index_buffer = self
            .indices
            .write(
                device,
                cx,
                index_count * mem::size_of::<u32>(),
                meshes().map(|mesh| unsafe {
                    slice::from_raw_parts(
                        mesh.indices.as_ptr().cast::<u8>(),
                        mesh.indices.len() * mem::size_of::<u32>(),
                    )
                }),
            )?
            .clone();

        let ppp = frame.pixels_per_point;
        unsafe {
            let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
            cx.Map(
                &self.constant_buffer,
                0,
                D3D11_MAP_WRITE_DISCARD,
                0,
                Some(&mut mapped),
            )?;
            mapped
                .pData
                .cast::<[f32; 4]>()
                .write([size.0 as f32 / ppp, size.1 as f32 / ppp, 0.0, 0.0]);
            cx.Unmap(&self.constant_buffer, 0);

            cx.OMSetBlendState(&self.blend_state, None, 0xffffffff);
            cx.RSSetState(&self.rasterizer);
            cx.RSSetViewports(Some(&[D3D11_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: size.0 as _,
                Height: size.1 as _,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            }]));

            cx.IASetInputLayout(&self.input_layout);
            cx.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            cx.IASetVertexBuffers(
                0,
                1,
                Some(&Some(vertex_buffer)),
                Some(&(vertex_size as u32)),
                Some(&0),
            );
            cx.IASetIndexBuffer(&index_buffer, DXGI_FORMAT_R32_UINT, 0);

            cx.VSSetShader(&self.vertex_shader, None);
            cx.VSSetConstantBuffers(0, Some(&[Some(self.constant_buffer.clone())]));
            cx.PSSetShader(&self.pixel_shader, None);
        }

        let mut vertex_offset = 0;
        let mut index_offset = 0;
        for ClippedPrimitive {
            clip_rect,
            primitive,
        } in frame.primitives
        {
            let Primitive::Mesh(mesh) = primitive else {
                continue;
            };
            let base_vertex = vertex_offset;
            let first_index = index_offset;
            vertex_offset += mesh.vertices.len();
            index_offset += mesh.indices.len();

            let Some(scissor) = scissor_rect(*clip_rect, ppp, size) else {
                continue;
            };
            let Some(texture) = self.textures.get(mesh.texture_id) else {
                trace!("skipping mesh of missing texture {:?}", mesh.texture_id);
                continue;
            };
            let sampler = if texture.nearest {
                &self.nearest_sampler
            } else {
                &self.linear_sampler
            };

            unsafe {
                cx.RSSetScissorRects(Some(&[scissor]));
                cx.PSSetShaderResources(0, Some(&[Some(texture.view.clone())]));
                cx.PSSetSamplers(0, Some(&[Some(sampler.clone())]));
                cx.DrawIndexed(
                    mesh.indices.len() as u32,
                    first_index as u32,
                    base_vertex as i32,
                );
            }
        }

        Ok(())
    }
}

/// Clip rectangle in points to a scissor rectangle in pixels.
fn scissor_rect(clip: Rect, pixels_per_point: f32, size: (u32, u32)) -> Option<RECT> {
    let left = (clip.min.x * pixels_per_point).round().clamp(0.0, size.0 as f32) as i32;
    let top = (clip.min.y * pixels_per_point).round().clamp(0.0, size.1 as f32) as i32;
    let right = (clip.max.x * pixels_per_point).round().clamp(0.0, size.0 as f32) as i32;
    let bottom = (clip.max.y * pixels_per_point).round().clamp(0.0, size.1 as f32) as i32;

    if left >= right || top >= bottom {
        return None;
    }

    Some(RECT {
        left,
        top,
        right,
        bottom,
    })
}

fn compile(entry: PCSTR, target: PCSTR) -> anyhow::Result<ID3DBlob> {
    let mut blob = None;
    let mut errors = None;
    let res = unsafe {
        D3DCompile(
            EGUI_SHADER.as_ptr() as *const c_void,
            EGUI_SHADER.len(),
            None,
            None,
            None,
            entry,
            target,
            D3DCOMPILE_OPTIMIZATION_LEVEL3 | D3DCOMPILE_WARNINGS_ARE_ERRORS,
            0,
            &mut blob,
            Some(&mut errors),
        )
    };

    if let Err(err) = res {
        let message = errors
            .map(|errors| String::from_utf8_lossy(unsafe { blob_bytes(&errors) }).into_owned())
            .unwrap_or_default();
        bail!("shader compilation failed. err: {:?} {}", err, message);
    }

    blob.context("shader failed to build")
}

unsafe fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

fn create_sampler(
    device: &ID3D11Device,
    filter: D3D11_FILTER,
) -> anyhow::Result<ID3D11SamplerState> {
    let mut sampler = None;
    unsafe {
        device.CreateSamplerState(
            &D3D11_SAMPLER_DESC {
                Filter: filter,
                AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
                ComparisonFunc: D3D11_COMPARISON_ALWAYS,
                MaxLOD: f32::MAX,
                ..Default::default()
            },
            Some(&mut sampler),
        )?;
    }

    sampler.context("cannot create sampler")
}

#[cfg(test)]
mod tests {
    use egui::pos2;

    use super::*;

    #[test]
    fn scissor_scales_and_clamps() {
        let rect = scissor_rect(
            Rect::from_min_max(pos2(-10.0, 5.0), pos2(100.0, 400.0)),
            2.0,
            (150, 300),
        )
        .unwrap();

        assert_eq!(
            (rect.left, rect.top, rect.right, rect.bottom),
            (0, 10, 150, 300)
        );
    }

    #[test]
    fn empty_scissor_is_skipped() {
        assert!(
            scissor_rect(
                Rect::from_min_max(pos2(200.0, 0.0), pos2(300.0, 10.0)),
                1.0,
                (100, 100)
            )
            .is_none()
        );
    }
}
