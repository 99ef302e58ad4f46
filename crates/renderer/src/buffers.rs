//! GPU resources owned by one fur renderable: geometry buffers, the mask
//! array texture, the base colour texture and their bind group.

use asset::mask::{FurLayerStack, MASK_TEXEL_BYTES};
use asset::mesh::{MeshData, MeshVertex};
use asset::texture::TextureData;
use wgpu::{
    util::DeviceExt, BindGroup, BindGroupLayout, Buffer, BufferUsages, Device, Extent3d, Queue,
    RenderPass, Sampler, Texture, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension,
};

use crate::shader::{ShellVertex, BASE_TEXTURE_UNIT, MASK_TEXTURE_UNIT, SAMPLER_BINDING};

/// Colour used when a renderable has no base texture.
pub const FALLBACK_FUR_COLOR: [u8; 4] = [150, 110, 75, 255];

const MASK_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const BASE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

impl From<&MeshVertex> for ShellVertex {
    fn from(v: &MeshVertex) -> Self {
        Self {
            position: v.position,
            normal: v.normal,
            tex_coord: v.uv,
        }
    }
}

struct IndexBuffer {
    buffer: Buffer,
    count: u32,
}

struct MaskTexture {
    texture: Texture,
    view: TextureView,
    size: u32,
    layers: u32,
}

pub struct GpuBufferSet {
    vertex_buf: Option<Buffer>,
    index_buf: Option<IndexBuffer>,
    mask: MaskTexture,
    base: Texture,
    base_view: TextureView,
    sampler: Sampler,
    texture_bg: BindGroup,
}

impl GpuBufferSet {
    /// Upload geometry, the initial mask stack and the base texture.
    pub fn new(
        device: &Device,
        queue: &Queue,
        mesh: &MeshData,
        base: Option<&TextureData>,
        stack: &FurLayerStack,
        texture_bgl: &BindGroupLayout,
    ) -> Self {
        let vertex_buf = if mesh.has_vertices() {
            let vertices: Vec<ShellVertex> = mesh.vertices.iter().map(ShellVertex::from).collect();
            Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Fur VB"),
                contents: bytemuck::cast_slice(&vertices),
                usage: BufferUsages::VERTEX,
            }))
        } else {
            log::warn!("Mesh has no vertex array; nothing will be drawn");
            None
        };

        let index_buf = mesh
            .triangle_indices()
            .filter(|indices| !indices.is_empty())
            .map(|indices| IndexBuffer {
                buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Fur IB"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: BufferUsages::INDEX,
                }),
                count: indices.len() as u32,
            });

        let mask = create_mask_texture(device, stack.size(), stack.layer_count());
        write_masks(queue, &mask, stack);

        let fallback = TextureData::solid(FALLBACK_FUR_COLOR);
        let base = base_or_fallback(base, &fallback);
        let base_tex = create_base_texture(device, queue, base);
        let base_view = base_tex.create_view(&TextureViewDescriptor::default());

        // Nearest + repeat keeps single mask texels crisp when tiled.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fur sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_bg =
            create_texture_binding(device, texture_bgl, &mask.view, &base_view, &sampler);

        log::debug!(
            "Uploaded {} vertices, {} indices, {} mask layers",
            mesh.vertices.len(),
            index_buf.as_ref().map_or(0, |ib| ib.count),
            stack.layer_count()
        );

        Self {
            vertex_buf,
            index_buf,
            mask,
            base: base_tex,
            base_view,
            sampler,
            texture_bg,
        }
    }

    /// Replace the mask texels. The texture is recreated only when its
    /// dimensions or depth changed.
    pub fn upload_masks(
        &mut self,
        device: &Device,
        queue: &Queue,
        stack: &FurLayerStack,
        texture_bgl: &BindGroupLayout,
    ) {
        if stack.size() != self.mask.size || stack.layer_count() != self.mask.layers {
            let mask = create_mask_texture(device, stack.size(), stack.layer_count());
            self.texture_bg = create_texture_binding(
                device,
                texture_bgl,
                &mask.view,
                &self.base_view,
                &self.sampler,
            );
            let old = std::mem::replace(&mut self.mask, mask);
            old.texture.destroy();
        }
        write_masks(queue, &self.mask, stack);
    }

    /// Bind vertex/index buffers and the texture group for shell passes.
    pub fn bind(&self, pass: &mut RenderPass<'_>) {
        if let Some(vb) = &self.vertex_buf {
            pass.set_vertex_buffer(0, vb.slice(..));
        }
        if let Some(ib) = &self.index_buf {
            pass.set_index_buffer(ib.buffer.slice(..), wgpu::IndexFormat::Uint32);
        }
        pass.set_bind_group(1, &self.texture_bg, &[]);
    }
}

impl Drop for GpuBufferSet {
    fn drop(&mut self) {
        if let Some(vb) = &self.vertex_buf {
            vb.destroy();
        }
        if let Some(ib) = &self.index_buf {
            ib.buffer.destroy();
        }
        self.mask.texture.destroy();
        self.base.destroy();
        log::debug!("Released fur GPU buffers");
    }
}

fn create_mask_texture(device: &Device, size: u32, layers: u32) -> MaskTexture {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("Fur mask array"),
        size: Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: layers,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: MASK_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&TextureViewDescriptor {
        label: Some("Fur mask array view"),
        dimension: Some(TextureViewDimension::D2Array),
        array_layer_count: Some(layers),
        ..Default::default()
    });
    MaskTexture {
        texture,
        view,
        size,
        layers,
    }
}

fn write_masks(queue: &Queue, mask: &MaskTexture, stack: &FurLayerStack) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &mask.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        stack.as_bytes(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(stack.size() * MASK_TEXEL_BYTES as u32),
            rows_per_image: Some(stack.size()),
        },
        Extent3d {
            width: stack.size(),
            height: stack.size(),
            depth_or_array_layers: stack.layer_count(),
        },
    );
}

/// The base texture if it is usable, otherwise `fallback`.
fn base_or_fallback<'a>(base: Option<&'a TextureData>, fallback: &'a TextureData) -> &'a TextureData {
    match base {
        Some(tex) if tex.is_valid() => tex,
        Some(tex) => {
            log::warn!(
                "Base texture {}x{} with {} bytes is malformed; using fallback colour",
                tex.width,
                tex.height,
                tex.data.len()
            );
            fallback
        }
        None => fallback,
    }
}

fn create_base_texture(device: &Device, queue: &Queue, data: &TextureData) -> Texture {
    device.create_texture_with_data(
        queue,
        &TextureDescriptor {
            label: Some("Fur base colour"),
            size: Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: BASE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &data.data,
    )
}

fn create_texture_binding(
    device: &Device,
    layout: &BindGroupLayout,
    mask: &TextureView,
    base: &TextureView,
    sampler: &Sampler,
) -> BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Fur textures BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: MASK_TEXTURE_UNIT,
                resource: wgpu::BindingResource::TextureView(mask),
            },
            wgpu::BindGroupEntry {
                binding: BASE_TEXTURE_UNIT,
                resource: wgpu::BindingResource::TextureView(base),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
