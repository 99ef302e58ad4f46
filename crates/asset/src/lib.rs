//! Asset loading and synthesis (meshes, textures, fur masks).
//! Meshes come from OBJ files or built-in primitives; textures are decoded
//! to RGBA8; fur masks are generated procedurally per shell layer.

pub mod mask;
pub mod mesh;
pub mod obj;
pub mod primitives;
pub mod texture;
