//! Draw-loop decisions for one fur renderable, independent of the GPU.
//!
//! Each frame the renderable is either hidden, skipped for missing geometry,
//! or drawn as `num_of_layers` shell passes. Before drawing, the mask cache
//! is brought in line with the live parameters (Dirty → Clean).

use asset::mask::{FurLayerStack, FurMaskGenerator};
use asset::mesh::MeshData;
use corelib::transform::Transform;
use corelib::{CoreResult, FurError, FurParams, Mat4};

/// Per-pass scalars handed to the shell program.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShellDrawParameters {
    pub layer_index: u32,
    pub total_layers: u32,
    pub uv_scale: f32,
    pub fur_length: f32,
    pub flow_offset: f32,
}

/// Mask tiling factor for `layer`: 1 at the skin, falling linearly toward 0.
///
/// Non-increasing in `layer` and always within [0, 1].
pub fn uv_scale(layer: u32, total_layers: u32) -> f32 {
    if total_layers == 0 {
        return 0.0;
    }
    (1.0 - layer as f32 / total_layers as f32).clamp(0.0, 1.0)
}

/// Parameters for every pass of one frame, innermost layer first.
pub fn shell_passes(params: &FurParams) -> impl Iterator<Item = ShellDrawParameters> + '_ {
    let total = params.num_of_layers;
    (0..total).map(move |layer_index| ShellDrawParameters {
        layer_index,
        total_layers: total,
        uv_scale: uv_scale(layer_index, total),
        fur_length: params.fur_length,
        flow_offset: params.flow_offset,
    })
}

/// How each shell pass submits geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCall {
    /// Triangle list over the uploaded index buffer.
    Indexed { index_count: u32 },
    /// Vertex buffer in order, for meshes without faces.
    Arrays { vertex_count: u32 },
}

impl DrawCall {
    pub fn for_mesh(mesh: &MeshData) -> CoreResult<Self> {
        if !mesh.has_vertices() {
            return Err(FurError::MissingGeometryData);
        }
        match mesh.triangle_indices() {
            Some(indices) if indices.is_empty() => Err(FurError::MissingGeometryData),
            Some(indices) => Ok(DrawCall::Indexed {
                index_count: indices.len() as u32,
            }),
            None => Ok(DrawCall::Arrays {
                vertex_count: mesh.vertices.len() as u32,
            }),
        }
    }
}

/// Whether the cached masks match the live parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskState {
    Clean,
    Dirty,
}

/// Draw-loop state of a renderable for a given set of live parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    Hidden,
    VisibleClean,
    /// Masks must be regenerated before the next draw.
    VisibleDirty,
}

pub fn render_state(state: &RenderableState, masks: &MaskCache, params: &FurParams) -> RenderState {
    match (state.visible, masks.state(params)) {
        (false, _) => RenderState::Hidden,
        (true, MaskState::Clean) => RenderState::VisibleClean,
        (true, MaskState::Dirty) => RenderState::VisibleDirty,
    }
}

/// Mask stack plus the parameters it was generated with.
pub struct MaskCache {
    generator: FurMaskGenerator,
    stack: FurLayerStack,
    fur_density: u32,
    num_of_layers: u32,
    generations: u64,
}

impl MaskCache {
    /// Generate the initial stack for `params`.
    pub fn new(mut generator: FurMaskGenerator, params: &FurParams) -> CoreResult<Self> {
        let stack = generator.generate(params.num_of_layers, params.fur_density)?;
        Ok(Self {
            generator,
            stack,
            fur_density: params.fur_density,
            num_of_layers: params.num_of_layers,
            generations: 1,
        })
    }

    pub fn state(&self, params: &FurParams) -> MaskState {
        if params.fur_density == self.fur_density && params.num_of_layers == self.num_of_layers {
            MaskState::Clean
        } else {
            MaskState::Dirty
        }
    }

    /// Regenerate if dirty. Returns `true` when a new stack was produced.
    ///
    /// Runs synchronously; on error the previous stack stays current.
    pub fn sync(&mut self, params: &FurParams) -> CoreResult<bool> {
        if self.state(params) == MaskState::Clean {
            return Ok(false);
        }
        log::info!(
            "Regenerating fur masks: density {} -> {}, layers {} -> {}",
            self.fur_density,
            params.fur_density,
            self.num_of_layers,
            params.num_of_layers
        );
        self.stack = self
            .generator
            .generate(params.num_of_layers, params.fur_density)?;
        self.fur_density = params.fur_density;
        self.num_of_layers = params.num_of_layers;
        self.generations += 1;
        Ok(true)
    }

    pub fn stack(&self) -> &FurLayerStack {
        &self.stack
    }

    pub fn fur_density(&self) -> u32 {
        self.fur_density
    }

    pub fn num_of_layers(&self) -> u32 {
        self.num_of_layers
    }

    /// Number of stacks generated so far, including the initial one.
    pub fn generations(&self) -> u64 {
        self.generations
    }
}

/// Scene-owned state of a renderable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderableState {
    pub transform: Transform,
    pub visible: bool,
}

impl Default for RenderableState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            visible: true,
        }
    }
}

/// Everything the GPU side needs to issue one frame of shells.
#[derive(Clone, Debug, PartialEq)]
pub struct ShellFrame {
    pub model: Mat4,
    pub draw: DrawCall,
    /// The mask stack changed and must be uploaded before drawing.
    pub regenerated: bool,
    pub passes: Vec<ShellDrawParameters>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FramePlan {
    Hidden,
    /// Nothing drawn this frame; the next frame tries again.
    Skipped(FurError),
    Draw(ShellFrame),
}

/// Decide what one `draw` call does.
pub fn plan_frame(
    state: &RenderableState,
    masks: &mut MaskCache,
    draw: &CoreResult<DrawCall>,
    params: &FurParams,
    parent: Mat4,
) -> FramePlan {
    let current = render_state(state, masks, params);
    if current == RenderState::Hidden {
        return FramePlan::Hidden;
    }
    let draw = match draw {
        Ok(draw) => *draw,
        Err(err) => return FramePlan::Skipped(err.clone()),
    };
    let regenerated = match current {
        RenderState::VisibleDirty => match masks.sync(params) {
            Ok(regenerated) => regenerated,
            Err(err) => return FramePlan::Skipped(err),
        },
        _ => false,
    };
    FramePlan::Draw(ShellFrame {
        model: state.transform.world(parent),
        draw,
        regenerated,
        passes: shell_passes(params).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset::mesh::{Faces, MeshVertex};
    use asset::primitives;

    fn cache(params: &FurParams) -> MaskCache {
        let generator = FurMaskGenerator::seeded(16, 42).expect("generator");
        MaskCache::new(generator, params).expect("cache")
    }

    fn plan(masks: &mut MaskCache, params: &FurParams) -> FramePlan {
        let draw = DrawCall::for_mesh(&primitives::uv_sphere(4, 6));
        plan_frame(&RenderableState::default(), masks, &draw, params, Mat4::IDENTITY)
    }

    #[test]
    fn uv_scale_is_monotone_and_bounded() {
        for total in [1, 2, 7, 30, 256] {
            let scales: Vec<f32> = (0..total).map(|l| uv_scale(l, total)).collect();
            assert_eq!(scales[0], 1.0);
            assert!(scales.iter().all(|s| (0.0..=1.0).contains(s)));
            assert!(scales.windows(2).all(|w| w[0] >= w[1]));
        }
        assert_eq!(uv_scale(3, 0), 0.0);
    }

    #[test]
    fn unchanged_density_never_regenerates() {
        let params = FurParams::new(0.1, 500, 8);
        let mut masks = cache(&params);
        for _ in 0..5 {
            let FramePlan::Draw(frame) = plan(&mut masks, &params) else {
                panic!("expected a draw");
            };
            assert!(!frame.regenerated);
        }
        assert_eq!(masks.generations(), 1);
    }

    #[test]
    fn density_change_regenerates_exactly_once() {
        let mut params = FurParams::new(0.1, 500, 8);
        let mut masks = cache(&params);
        plan(&mut masks, &params);

        params.fur_density = 900;
        assert_eq!(masks.state(&params), MaskState::Dirty);
        let FramePlan::Draw(first) = plan(&mut masks, &params) else {
            panic!("expected a draw");
        };
        let FramePlan::Draw(second) = plan(&mut masks, &params) else {
            panic!("expected a draw");
        };
        assert!(first.regenerated);
        assert!(!second.regenerated);
        assert_eq!(masks.generations(), 2);
        assert_eq!(masks.fur_density(), 900);
        assert_eq!(masks.state(&params), MaskState::Clean);
    }

    #[test]
    fn layer_change_regenerates_a_deeper_stack() {
        let mut params = FurParams::new(0.1, 500, 8);
        let mut masks = cache(&params);
        params.num_of_layers = 12;
        let FramePlan::Draw(frame) = plan(&mut masks, &params) else {
            panic!("expected a draw");
        };
        assert!(frame.regenerated);
        assert_eq!(frame.passes.len(), 12);
        assert_eq!(masks.stack().layer_count(), 12);
    }

    #[test]
    fn passes_cover_every_layer_in_order() {
        let params = FurParams::new(0.3, 100, 5);
        let passes: Vec<_> = shell_passes(&params).collect();
        assert_eq!(passes.len(), 5);
        for (i, p) in passes.iter().enumerate() {
            assert_eq!(p.layer_index, i as u32);
            assert_eq!(p.total_layers, 5);
            assert_eq!(p.fur_length, 0.3);
        }
    }

    #[test]
    fn hidden_renderable_does_nothing() {
        let mut params = FurParams::new(0.1, 500, 8);
        let mut masks = cache(&params);
        params.fur_density = 0;
        let state = RenderableState {
            visible: false,
            ..RenderableState::default()
        };
        let draw = DrawCall::for_mesh(&primitives::quad_cube());
        let plan = plan_frame(&state, &mut masks, &draw, &params, Mat4::IDENTITY);
        assert_eq!(plan, FramePlan::Hidden);
        assert_eq!(masks.generations(), 1);
    }

    #[test]
    fn state_moves_from_hidden_through_dirty_to_clean() {
        let mut params = FurParams::new(0.1, 500, 8);
        let mut masks = cache(&params);
        let mut state = RenderableState {
            visible: false,
            ..RenderableState::default()
        };
        let draw = DrawCall::for_mesh(&primitives::quad_cube());

        params.fur_density = 700;
        assert_eq!(render_state(&state, &masks, &params), RenderState::Hidden);
        plan_frame(&state, &mut masks, &draw, &params, Mat4::IDENTITY);
        assert_eq!(masks.generations(), 1);

        state.visible = true;
        assert_eq!(render_state(&state, &masks, &params), RenderState::VisibleDirty);
        let FramePlan::Draw(frame) = plan_frame(&state, &mut masks, &draw, &params, Mat4::IDENTITY)
        else {
            panic!("expected a draw");
        };
        assert!(frame.regenerated);
        assert_eq!(render_state(&state, &masks, &params), RenderState::VisibleClean);
        assert_eq!(masks.generations(), 2);
    }

    #[test]
    fn missing_vertices_skip_the_frame() {
        let params = FurParams::default();
        let mut masks = cache(&params);
        let draw = DrawCall::for_mesh(&MeshData::default());
        let plan = plan_frame(&RenderableState::default(), &mut masks, &draw, &params, Mat4::IDENTITY);
        assert_eq!(plan, FramePlan::Skipped(FurError::MissingGeometryData));
    }

    #[test]
    fn faceless_mesh_draws_vertex_arrays() {
        let mesh = MeshData::new(vec![MeshVertex::default(); 9], None);
        assert_eq!(DrawCall::for_mesh(&mesh), Ok(DrawCall::Arrays { vertex_count: 9 }));

        let params = FurParams::new(0.1, 10, 3);
        let mut masks = cache(&params);
        let draw = DrawCall::for_mesh(&mesh);
        let FramePlan::Draw(frame) =
            plan_frame(&RenderableState::default(), &mut masks, &draw, &params, Mat4::IDENTITY)
        else {
            panic!("expected a draw");
        };
        assert_eq!(frame.draw, DrawCall::Arrays { vertex_count: 9 });
        assert_eq!(frame.passes.len(), 3);
    }

    #[test]
    fn quads_draw_as_two_triangles_each() {
        let cube = primitives::quad_cube();
        assert_eq!(DrawCall::for_mesh(&cube), Ok(DrawCall::Indexed { index_count: 36 }));
        let empty = MeshData::new(vec![MeshVertex::default(); 3], Some(Faces::triangles(vec![])));
        assert_eq!(DrawCall::for_mesh(&empty), Err(FurError::MissingGeometryData));
    }

    #[test]
    fn model_matrix_includes_parent() {
        let params = FurParams::new(0.1, 10, 2);
        let mut masks = cache(&params);
        let state = RenderableState {
            transform: Transform::placed(corelib::vec3(0.0, 1.0, 0.0), 2.0),
            visible: true,
        };
        let parent = Mat4::from_translation(corelib::vec3(3.0, 0.0, 0.0));
        let draw = DrawCall::for_mesh(&primitives::quad_cube());
        let FramePlan::Draw(frame) = plan_frame(&state, &mut masks, &draw, &params, parent) else {
            panic!("expected a draw");
        };
        let origin = frame.model.transform_point3(corelib::Vec3::ZERO);
        assert!((origin - corelib::vec3(3.0, 1.0, 0.0)).length() < 1e-6);
    }
}
