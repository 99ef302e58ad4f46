//! What the frame loop draws: one fur renderable, the camera and the live
//! fur parameters.

use corelib::camera::Camera;
use corelib::{FurCommand, FurParams, Mat4};

use crate::fur::FurRenderable;

pub struct FurScene {
    pub camera: Camera,
    pub params: FurParams,
    pub renderable: FurRenderable,
    /// Root transform applied above the renderable's own placement.
    pub parent: Mat4,
}

impl FurScene {
    pub fn new(camera: Camera, params: FurParams, renderable: FurRenderable) -> Self {
        Self {
            camera,
            params,
            renderable,
            parent: Mat4::IDENTITY,
        }
    }

    /// Apply a parameter or visibility command. Mesh switching needs a GPU
    /// rebuild and is handled by the caller.
    pub fn apply(&mut self, cmd: FurCommand) {
        match cmd {
            FurCommand::ToggleVisible => {
                let visible = !self.renderable.is_visible();
                self.renderable.set_visible(visible);
                log::info!(
                    "Fur renderable {} ({:?})",
                    if visible { "shown" } else { "hidden" },
                    self.renderable.render_state(&self.params)
                );
            }
            FurCommand::SwitchMesh(_) => {}
            other => {
                if self.params.apply(other) {
                    log::info!(
                        "{:?}: length={:.2} density={} layers={} flow={:.2}",
                        other,
                        self.params.fur_length,
                        self.params.fur_density,
                        self.params.num_of_layers,
                        self.params.flow_offset
                    );
                }
            }
        }
    }

    /// Swap in a new renderable; the old one releases its GPU resources.
    pub fn replace_renderable(&mut self, renderable: FurRenderable) {
        log::info!(
            "Switching mesh '{}' -> '{}' ({} vertices)",
            self.renderable.name(),
            renderable.name(),
            renderable.mesh().vertices.len()
        );
        self.renderable = renderable;
    }
}
