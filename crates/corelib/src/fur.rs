//! Live fur parameters and the keyboard commands that mutate them.

/// Upper bound on shells; matches the array-layer limit of downlevel GPUs.
pub const MAX_LAYERS: u32 = 256;

pub const DEFAULT_FUR_LENGTH: f32 = 0.1;
pub const DEFAULT_FUR_DENSITY: u32 = 30_000;
pub const DEFAULT_NUM_OF_LAYERS: u32 = 30;

pub const FUR_LENGTH_STEP: f32 = 0.05;
pub const FUR_DENSITY_STEP: u32 = 5_000;
pub const FLOW_OFFSET_STEP: f32 = 0.05;

/// Global fur controls read by every shell pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FurParams {
    /// Distance between the skin and the outermost shell, in object units.
    pub fur_length: f32,
    /// Scatter count for the innermost mask layer.
    pub fur_density: u32,
    pub num_of_layers: u32,
    /// Downward droop applied to outer shells.
    pub flow_offset: f32,
}

impl Default for FurParams {
    fn default() -> Self {
        Self {
            fur_length: DEFAULT_FUR_LENGTH,
            fur_density: DEFAULT_FUR_DENSITY,
            num_of_layers: DEFAULT_NUM_OF_LAYERS,
            flow_offset: 0.0,
        }
    }
}

/// Which of the two configured meshes is on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshSlot {
    Primary,
    Secondary,
}

/// Parameter mutations requested by the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FurCommand {
    LengthUp,
    LengthDown,
    DensityUp,
    DensityDown,
    LayersUp,
    LayersDown,
    FlowUp,
    FlowDown,
    ToggleVisible,
    SwitchMesh(MeshSlot),
}

impl FurParams {
    /// Build parameters, clamping every field into its valid range.
    pub fn new(fur_length: f32, fur_density: u32, num_of_layers: u32) -> Self {
        Self {
            fur_length: fur_length.max(0.0),
            fur_density,
            num_of_layers: num_of_layers.clamp(1, MAX_LAYERS),
            flow_offset: 0.0,
        }
    }

    /// Apply a parameter command. Returns `true` if any value changed.
    ///
    /// Visibility and mesh switches are not fur parameters and are left to
    /// the scene; they always return `false` here.
    pub fn apply(&mut self, cmd: FurCommand) -> bool {
        let before = *self;
        match cmd {
            FurCommand::LengthUp => self.fur_length += FUR_LENGTH_STEP,
            FurCommand::LengthDown => self.fur_length = (self.fur_length - FUR_LENGTH_STEP).max(0.0),
            FurCommand::DensityUp => {
                self.fur_density = self.fur_density.saturating_add(FUR_DENSITY_STEP)
            }
            FurCommand::DensityDown => {
                self.fur_density = self.fur_density.saturating_sub(FUR_DENSITY_STEP)
            }
            FurCommand::LayersUp => self.num_of_layers = (self.num_of_layers + 1).min(MAX_LAYERS),
            FurCommand::LayersDown => self.num_of_layers = self.num_of_layers.saturating_sub(1).max(1),
            FurCommand::FlowUp => self.flow_offset += FLOW_OFFSET_STEP,
            FurCommand::FlowDown => {
                self.flow_offset = (self.flow_offset - FLOW_OFFSET_STEP).max(0.0)
            }
            FurCommand::ToggleVisible | FurCommand::SwitchMesh(_) => {}
        }
        *self != before
    }
}
