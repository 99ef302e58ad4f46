//! The fur shell program: WGSL module, pipeline, and per-layer uniform slots.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use corelib::{CoreResult, FurError, Mat4};
use wgpu::{
    util::DeviceExt, BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingType, BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState,
    ColorWrites, DepthBiasState, DepthStencilState, Device, FragmentState, PipelineLayoutDescriptor,
    Queue, RenderPass, RenderPipeline, RenderPipelineDescriptor, SamplerBindingType,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, TextureFormat, TextureSampleType,
    TextureViewDimension, VertexBufferLayout, VertexFormat, VertexState, VertexStepMode,
};

use crate::shell::ShellDrawParameters;
use crate::uniform::{LayeredUniforms, UniformLayout, UniformValue};
use crate::DEPTH_FORMAT;

const SHELL_SHADER_SRC: &str = include_str!("shaders/fur_shell.wgsl");

/// Texture unit (group 1 binding) of the fur mask array.
pub const MASK_TEXTURE_UNIT: u32 = 0;
/// Texture unit (group 1 binding) of the base colour texture.
pub const BASE_TEXTURE_UNIT: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;

/// Vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShellVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// A named vertex input and the shader slot it is bound to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Attribute slots of [`ShellVertex`]; the WGSL `@location`s must agree.
pub const SHELL_ATTRIBUTES: [VertexAttribute; 3] = [
    VertexAttribute {
        name: "position",
        location: 0,
        format: VertexFormat::Float32x3,
        offset: 0,
    },
    VertexAttribute {
        name: "normal",
        location: 1,
        format: VertexFormat::Float32x3,
        offset: 12,
    },
    VertexAttribute {
        name: "texCoord",
        location: 2,
        format: VertexFormat::Float32x2,
        offset: 24,
    },
];

/// Every attribute the shader reads must be present at its fixed slot.
pub fn check_attributes(layout: &[VertexAttribute]) -> CoreResult<()> {
    for required in &SHELL_ATTRIBUTES {
        match layout.iter().find(|a| a.name == required.name) {
            Some(a) if a.location == required.location && a.format == required.format => {}
            Some(a) => {
                return Err(FurError::ShaderCompileFailure(format!(
                    "attribute '{}' bound to location {} as {:?}, shader expects {} as {:?}",
                    a.name, a.location, a.format, required.location, required.format
                )));
            }
            None => {
                return Err(FurError::ShaderCompileFailure(format!(
                    "vertex layout has no '{}' attribute",
                    required.name
                )));
            }
        }
    }
    Ok(())
}

pub struct ShellShaderProgram {
    pipeline: RenderPipeline,
    uniform_bgl: BindGroupLayout,
    texture_bgl: BindGroupLayout,
    uniform_buf: Buffer,
    uniform_bg: BindGroup,
    uniforms: LayeredUniforms,
    attributes: Vec<wgpu::VertexAttribute>,
    target_format: TextureFormat,
    needs_rebuild: bool,
}

impl ShellShaderProgram {
    /// Build the program once for `target_format`.
    ///
    /// Shader or pipeline validation errors are returned as
    /// [`FurError::ShaderCompileFailure`]; callers treat them as fatal.
    pub fn compile(
        device: &Device,
        attributes: &[VertexAttribute],
        target_format: TextureFormat,
        layers: u32,
    ) -> CoreResult<Self> {
        check_attributes(attributes)?;
        for a in attributes {
            log::debug!("Binding attribute {} to location {}", a.name, a.location);
        }
        let attributes: Vec<wgpu::VertexAttribute> = attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format,
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let uniforms = LayeredUniforms::new(
            UniformLayout::shell(),
            device.limits().min_uniform_buffer_offset_alignment,
            layers,
        );

        let uniform_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Shell uniforms BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(uniforms.block_size()),
                },
                count: None,
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Shell textures BGL"),
            entries: &[
                texture_entry(MASK_TEXTURE_UNIT, TextureViewDimension::D2Array),
                texture_entry(BASE_TEXTURE_UNIT, TextureViewDimension::D2),
                BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        log::info!("Compiling fur shell program for {:?}", target_format);
        let pipeline = build_pipeline(
            device,
            &uniform_bgl,
            &texture_bgl,
            &attributes,
            target_format,
        )?;

        let (uniform_buf, uniform_bg) = create_uniform_binding(device, &uniform_bgl, &uniforms);

        Ok(Self {
            pipeline,
            uniform_bgl,
            texture_bgl,
            uniform_buf,
            uniform_bg,
            uniforms,
            attributes,
            target_format,
            needs_rebuild: false,
        })
    }

    /// Layout the texture bind group (group 1) must follow.
    pub fn texture_layout(&self) -> &BindGroupLayout {
        &self.texture_bgl
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Request a pipeline rebuild before the next draw.
    pub fn invalidate(&mut self) {
        self.needs_rebuild = true;
    }

    /// Switch colour target; rebuilds on the next draw if it changed.
    pub fn retarget(&mut self, format: TextureFormat) {
        if format != self.target_format {
            self.target_format = format;
            self.invalidate();
        }
    }

    /// Rebuild the pipeline if flagged. On failure the previous pipeline stays
    /// in use and the flag is cleared so the error is reported once.
    pub fn rebuild(&mut self, device: &Device) -> CoreResult<()> {
        if !self.needs_rebuild {
            return Ok(());
        }
        self.needs_rebuild = false;
        log::info!("Rebuilding fur shell program for {:?}", self.target_format);
        self.pipeline = build_pipeline(
            device,
            &self.uniform_bgl,
            &self.texture_bgl,
            &self.attributes,
            self.target_format,
        )?;
        Ok(())
    }

    /// Make room for `layers` uniform slots, recreating the buffer if needed.
    pub fn reserve_layers(&mut self, device: &Device, layers: u32) {
        if self.uniforms.reserve(layers) {
            log::debug!("Growing shell uniform buffer to {layers} layers");
            let (buf, bg) = create_uniform_binding(device, &self.uniform_bgl, &self.uniforms);
            self.uniform_buf.destroy();
            self.uniform_buf = buf;
            self.uniform_bg = bg;
        }
    }

    /// Stage every uniform for one shell pass. Returns the dynamic offset of its slot.
    pub fn bind(
        &mut self,
        model: Mat4,
        projection: Mat4,
        view: Mat4,
        layer: &ShellDrawParameters,
    ) -> u32 {
        let block = self.uniforms.block_mut();
        block.bind("projection", UniformValue::Mat4(projection));
        block.bind("view", UniformValue::Mat4(view));
        block.bind("model", UniformValue::Mat4(model));
        block.bind("current_layer", UniformValue::Float(layer.layer_index as f32));
        block.bind("num_of_layers", UniformValue::Float(layer.total_layers as f32));
        block.bind("uv_scale", UniformValue::Float(layer.uv_scale));
        block.bind("fur_length", UniformValue::Float(layer.fur_length));
        block.bind("flow_offset", UniformValue::Float(layer.flow_offset));
        self.uniforms.stage(layer.layer_index)
    }

    /// Upload the staged slots for `layers` passes.
    pub fn flush(&self, queue: &Queue, layers: u32) {
        queue.write_buffer(&self.uniform_buf, 0, self.uniforms.staged(layers));
    }

    pub fn set_pipeline(&self, pass: &mut RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
    }

    /// Select the uniform slot for the next draw.
    pub fn use_slot(&self, pass: &mut RenderPass<'_>, offset: u32) {
        pass.set_bind_group(0, &self.uniform_bg, &[offset]);
    }
}

impl Drop for ShellShaderProgram {
    fn drop(&mut self) {
        self.uniform_buf.destroy();
    }
}

fn texture_entry(binding: u32, view_dimension: TextureViewDimension) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn create_uniform_binding(
    device: &Device,
    layout: &BindGroupLayout,
    uniforms: &LayeredUniforms,
) -> (Buffer, BindGroup) {
    let buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Shell uniforms UBO"),
        contents: uniforms.staged(uniforms.capacity()),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Shell uniforms BG"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buf,
                offset: 0,
                size: NonZeroU64::new(uniforms.block_size()),
            }),
        }],
    });
    (buf, bg)
}

/// Create module and pipeline inside a validation error scope.
fn build_pipeline(
    device: &Device,
    uniform_bgl: &BindGroupLayout,
    texture_bgl: &BindGroupLayout,
    attributes: &[wgpu::VertexAttribute],
    target_format: TextureFormat,
) -> CoreResult<RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Fur shell WGSL"),
        source: ShaderSource::Wgsl(SHELL_SHADER_SRC.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Fur shell PipelineLayout"),
        bind_group_layouts: &[uniform_bgl, texture_bgl],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Fur shell Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[VertexBufferLayout {
                array_stride: std::mem::size_of::<ShellVertex>() as u64,
                step_mode: VertexStepMode::Vertex,
                attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format: target_format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            log::error!("Fur shell program failed to build: {err}");
            Err(FurError::ShaderCompileFailure(err.to_string()))
        }
        None => Ok(pipeline),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_attributes_pass_the_check() {
        assert!(check_attributes(&SHELL_ATTRIBUTES).is_ok());
    }

    #[test]
    fn attribute_offsets_match_vertex_struct() {
        assert_eq!(std::mem::size_of::<ShellVertex>(), 32);
        assert_eq!(SHELL_ATTRIBUTES[1].offset, 12);
        assert_eq!(SHELL_ATTRIBUTES[2].offset, 24);
    }

    #[test]
    fn swapped_slot_is_rejected() {
        let mut layout = SHELL_ATTRIBUTES;
        layout.swap(0, 1);
        layout[0].location = 0;
        layout[1].location = 0;
        let err = check_attributes(&layout).unwrap_err();
        assert!(matches!(err, FurError::ShaderCompileFailure(msg) if msg.contains("normal")));
    }

    #[test]
    fn missing_tex_coord_is_rejected() {
        let err = check_attributes(&SHELL_ATTRIBUTES[..2]).unwrap_err();
        assert!(matches!(err, FurError::ShaderCompileFailure(msg) if msg.contains("texCoord")));
    }
}
