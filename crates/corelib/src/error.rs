//! Domain errors shared by the asset, renderer and platform layers.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FurError {
    /// The mesh has no vertex array; the draw is skipped for the frame.
    #[error("Mesh has no vertex data")]
    MissingGeometryData,

    /// Shader module or pipeline failed validation. Fatal at construction.
    #[error("Shader compilation failed: {0}")]
    ShaderCompileFailure(String),

    /// A uniform was given a value of the wrong shape. The stale value stays bound.
    #[error("Uniform '{name}' expects {expected}, got {found}")]
    UnsupportedUniformShape {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("No uniform named '{0}' in the shell program")]
    UnknownUniform(String),

    /// Mask size must be positive and within the texture limit; layers within 1..=256.
    #[error("Invalid fur mask parameters: size={size}, layers={layers}")]
    InvalidMaskParameters { size: u32, layers: u32 },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

pub type CoreResult<T> = Result<T, FurError>;
