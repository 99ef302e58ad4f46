//! A mesh drawn as fur shells.

use asset::mask::{check_mask_size, FurMaskGenerator};
use asset::mesh::MeshData;
use asset::texture::TextureData;
use corelib::transform::Transform;
use corelib::{CoreResult, FurParams, Mat4};
use wgpu::{Device, Queue, RenderPass, TextureFormat};

use crate::buffers::GpuBufferSet;
use crate::shader::{ShellShaderProgram, SHELL_ATTRIBUTES};
use crate::shell::{plan_frame, render_state, DrawCall, FramePlan, MaskCache, RenderState, RenderableState};

/// What a renderable needs from the frame it is drawn into.
pub struct FrameContext<'a, 'p> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub pass: &'a mut RenderPass<'p>,
    pub projection: Mat4,
    pub view: Mat4,
}

pub struct FurRenderable {
    name: String,
    mesh: MeshData,
    state: RenderableState,
    masks: MaskCache,
    draw_call: CoreResult<DrawCall>,
    buffers: GpuBufferSet,
    program: ShellShaderProgram,
}

impl FurRenderable {
    /// Build program, masks and GPU buffers. Any error here is fatal for the
    /// renderable: an invalid mesh or a program that fails to compile.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &Device,
        queue: &Queue,
        target_format: TextureFormat,
        name: impl Into<String>,
        mesh: MeshData,
        base: Option<&TextureData>,
        params: &FurParams,
        transform: Transform,
        mask_size: u32,
    ) -> CoreResult<Self> {
        let name = name.into();
        log::info!("Initializing fur renderable '{name}'");
        mesh.validate()?;
        check_mask_size(mask_size, device.limits().max_texture_dimension_2d)?;

        let program =
            ShellShaderProgram::compile(device, &SHELL_ATTRIBUTES, target_format, params.num_of_layers)?;
        let masks = MaskCache::new(FurMaskGenerator::new(mask_size)?, params)?;
        let buffers = GpuBufferSet::new(
            device,
            queue,
            &mesh,
            base,
            masks.stack(),
            program.texture_layout(),
        );
        let draw_call = DrawCall::for_mesh(&mesh);

        Ok(Self {
            name,
            mesh,
            state: RenderableState {
                transform,
                visible: true,
            },
            masks,
            draw_call,
            buffers,
            program,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn is_visible(&self) -> bool {
        self.state.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.state.visible = visible;
    }

    /// Where the next `draw` with `params` starts from.
    pub fn render_state(&self, params: &FurParams) -> RenderState {
        render_state(&self.state, &self.masks, params)
    }

    /// Follow a new surface format; the program rebuilds on the next draw.
    pub fn retarget(&mut self, format: TextureFormat) {
        self.program.retarget(format);
    }

    /// Draw all shells for this frame. Returns `true` if anything was drawn.
    pub fn draw(&mut self, frame: &mut FrameContext<'_, '_>, params: &FurParams, parent: Mat4) -> bool {
        if self.program.needs_rebuild() {
            if let Err(err) = self.program.rebuild(frame.device) {
                log::error!("'{}': {err}; keeping previous pipeline", self.name);
            }
        }

        let shells = match plan_frame(&self.state, &mut self.masks, &self.draw_call, params, parent) {
            FramePlan::Hidden => return false,
            FramePlan::Skipped(err) => {
                log::warn!("Skipping draw of '{}': {err}", self.name);
                return false;
            }
            FramePlan::Draw(shells) => shells,
        };

        if shells.regenerated {
            self.buffers.upload_masks(
                frame.device,
                frame.queue,
                self.masks.stack(),
                self.program.texture_layout(),
            );
        }

        let layers = shells.passes.len() as u32;
        self.program.reserve_layers(frame.device, layers);
        let offsets: Vec<u32> = shells
            .passes
            .iter()
            .map(|p| self.program.bind(shells.model, frame.projection, frame.view, p))
            .collect();
        self.program.flush(frame.queue, layers);

        let pass = &mut *frame.pass;
        self.program.set_pipeline(pass);
        self.buffers.bind(pass);
        for offset in offsets {
            self.program.use_slot(pass, offset);
            match shells.draw {
                DrawCall::Indexed { index_count } => pass.draw_indexed(0..index_count, 0, 0..1),
                DrawCall::Arrays { vertex_count } => pass.draw(0..vertex_count, 0..1),
            }
        }
        true
    }
}
