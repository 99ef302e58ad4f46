//! Named uniforms for the shell program.
//!
//! Values are a tagged enum and every kind has its own writer in a fixed
//! dispatch table, so binding never inspects types at runtime beyond the tag.
//! The block is laid out with WGSL uniform alignment rules and staged into
//! one slot per shell layer of a dynamic-offset buffer.

use corelib::{CoreResult, FurError, Mat3, Mat4, Vec2, Vec3, Vec4};

/// A value bound to a named uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

/// Declared shape of a uniform slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }
}

/// Writes a value into its slot; `false` if the value has another shape.
type WriteFn = fn(&UniformValue, &mut [u8]) -> bool;

impl UniformKind {
    /// Byte size inside a uniform block. `mat3x3` columns are padded to 16 bytes.
    pub const fn size(self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }

    pub const fn align(self) -> usize {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat3 | UniformKind::Mat4 => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            UniformKind::Int => "i32",
            UniformKind::Float => "f32",
            UniformKind::Vec2 => "vec2<f32>",
            UniformKind::Vec3 => "vec3<f32>",
            UniformKind::Vec4 => "vec4<f32>",
            UniformKind::Mat3 => "mat3x3<f32>",
            UniformKind::Mat4 => "mat4x4<f32>",
        }
    }

    fn writer(self) -> WriteFn {
        match self {
            UniformKind::Int => write_int,
            UniformKind::Float => write_float,
            UniformKind::Vec2 => write_vec2,
            UniformKind::Vec3 => write_vec3,
            UniformKind::Vec4 => write_vec4,
            UniformKind::Mat3 => write_mat3,
            UniformKind::Mat4 => write_mat4,
        }
    }
}

fn write_int(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Int(v) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::bytes_of(v));
    true
}

fn write_float(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Float(v) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::bytes_of(v));
    true
}

fn write_vec2(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Vec2(v) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::cast_slice(&v.to_array()));
    true
}

fn write_vec3(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Vec3(v) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::cast_slice(&v.to_array()));
    true
}

fn write_vec4(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Vec4(v) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::cast_slice(&v.to_array()));
    true
}

fn write_mat3(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Mat3(m) = value else {
        return false;
    };
    let padded: [[f32; 4]; 3] = [m.x_axis, m.y_axis, m.z_axis].map(|c| c.extend(0.0).to_array());
    dst.copy_from_slice(bytemuck::cast_slice(&padded));
    true
}

fn write_mat4(value: &UniformValue, dst: &mut [u8]) -> bool {
    let UniformValue::Mat4(m) = value else {
        return false;
    };
    dst.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
    true
}

/// Name and shape of one uniform, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub const fn new(name: &'static str, kind: UniformKind) -> Self {
        Self { name, kind }
    }
}

/// Uniforms of the fur shell program; must match `ShellUniforms` in the WGSL.
pub const SHELL_UNIFORMS: [UniformDecl; 8] = [
    UniformDecl::new("projection", UniformKind::Mat4),
    UniformDecl::new("view", UniformKind::Mat4),
    UniformDecl::new("model", UniformKind::Mat4),
    UniformDecl::new("current_layer", UniformKind::Float),
    UniformDecl::new("num_of_layers", UniformKind::Float),
    UniformDecl::new("uv_scale", UniformKind::Float),
    UniformDecl::new("fur_length", UniformKind::Float),
    UniformDecl::new("flow_offset", UniformKind::Float),
];

#[inline]
pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Byte offsets of every declared uniform.
#[derive(Clone, Debug)]
pub struct UniformLayout {
    entries: Vec<(UniformDecl, usize)>,
    size: usize,
}

impl UniformLayout {
    pub fn new(decls: &[UniformDecl]) -> Self {
        let mut entries = Vec::with_capacity(decls.len());
        let mut cursor = 0usize;
        let mut max_align = 16usize;
        for decl in decls {
            let align = decl.kind.align();
            max_align = max_align.max(align);
            cursor = align_up(cursor as u64, align as u64) as usize;
            entries.push((*decl, cursor));
            cursor += decl.kind.size();
        }
        let size = align_up(cursor as u64, max_align as u64) as usize;
        Self { entries, size }
    }

    pub fn shell() -> Self {
        Self::new(&SHELL_UNIFORMS)
    }

    /// Size of the whole block, rounded to the struct alignment.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.find(name).map(|(_, offset)| offset)
    }

    fn find(&self, name: &str) -> Option<(UniformDecl, usize)> {
        self.entries.iter().copied().find(|(d, _)| d.name == name)
    }
}

/// CPU copy of one uniform block.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    layout: UniformLayout,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(layout: UniformLayout) -> Self {
        let bytes = vec![0u8; layout.size()];
        Self { layout, bytes }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Write `value` into the uniform called `name`.
    ///
    /// A shape mismatch leaves the previous bytes in place.
    pub fn set(&mut self, name: &str, value: UniformValue) -> CoreResult<()> {
        let (decl, offset) = self
            .layout
            .find(name)
            .ok_or_else(|| FurError::UnknownUniform(name.to_string()))?;
        let dst = &mut self.bytes[offset..offset + decl.kind.size()];
        if (decl.kind.writer())(&value, dst) {
            Ok(())
        } else {
            Err(FurError::UnsupportedUniformShape {
                name: name.to_string(),
                expected: decl.kind.name(),
                found: value.kind().name(),
            })
        }
    }

    /// Like [`set`](Self::set) but reports failures to the log and carries on.
    pub fn bind(&mut self, name: &str, value: UniformValue) {
        if let Err(err) = self.set(name, value) {
            log::warn!("{err}; keeping previous value");
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One uniform block per shell layer, `stride` bytes apart, for dynamic offsets.
#[derive(Clone, Debug)]
pub struct LayeredUniforms {
    block: UniformBlock,
    stride: u64,
    staging: Vec<u8>,
}

impl LayeredUniforms {
    /// `offset_alignment` is the device's `min_uniform_buffer_offset_alignment`.
    pub fn new(layout: UniformLayout, offset_alignment: u32, slots: u32) -> Self {
        let stride = align_up(layout.size() as u64, u64::from(offset_alignment.max(4)));
        let mut this = Self {
            block: UniformBlock::new(layout),
            stride,
            staging: Vec::new(),
        };
        this.reserve(slots.max(1));
        this
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn block_size(&self) -> u64 {
        self.block.layout().size() as u64
    }

    pub fn capacity(&self) -> u32 {
        (self.staging.len() as u64 / self.stride) as u32
    }

    /// Grow to hold `slots` blocks. Returns `true` if the GPU buffer must be recreated.
    pub fn reserve(&mut self, slots: u32) -> bool {
        if slots <= self.capacity() {
            return false;
        }
        self.staging.resize((u64::from(slots) * self.stride) as usize, 0);
        true
    }

    pub fn block_mut(&mut self) -> &mut UniformBlock {
        &mut self.block
    }

    /// Copy the current block into `slot` and return its dynamic offset.
    pub fn stage(&mut self, slot: u32) -> u32 {
        self.reserve(slot + 1);
        let start = (u64::from(slot) * self.stride) as usize;
        let bytes = self.block.bytes();
        self.staging[start..start + bytes.len()].copy_from_slice(bytes);
        start as u32
    }

    /// Staged bytes covering the first `slots` blocks.
    pub fn staged(&self, slots: u32) -> &[u8] {
        let end = (u64::from(slots) * self.stride).min(self.staging.len() as u64) as usize;
        &self.staging[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_layout_matches_wgsl_struct() {
        let layout = UniformLayout::shell();
        assert_eq!(layout.offset_of("projection"), Some(0));
        assert_eq!(layout.offset_of("view"), Some(64));
        assert_eq!(layout.offset_of("model"), Some(128));
        assert_eq!(layout.offset_of("current_layer"), Some(192));
        assert_eq!(layout.offset_of("flow_offset"), Some(208));
        assert_eq!(layout.size(), 224);
    }

    #[test]
    fn vec3_and_mat3_follow_uniform_alignment() {
        let layout = UniformLayout::new(&[
            UniformDecl::new("a", UniformKind::Float),
            UniformDecl::new("b", UniformKind::Vec3),
            UniformDecl::new("c", UniformKind::Mat3),
            UniformDecl::new("d", UniformKind::Vec2),
        ]);
        assert_eq!(layout.offset_of("b"), Some(16));
        assert_eq!(layout.offset_of("c"), Some(32));
        assert_eq!(layout.offset_of("d"), Some(80));
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn mismatched_shape_keeps_stale_value() {
        let mut block = UniformBlock::new(UniformLayout::shell());
        block.set("fur_length", UniformValue::Float(0.25)).expect("float binds");
        let err = block
            .set("fur_length", UniformValue::Vec3(Vec3::ONE))
            .unwrap_err();
        assert!(matches!(err, FurError::UnsupportedUniformShape { expected: "f32", .. }));
        block.bind("fur_length", UniformValue::Int(3));

        let offset = block.layout().offset_of("fur_length").expect("declared");
        let bytes = &block.bytes()[offset..offset + 4];
        assert_eq!(f32::from_ne_bytes(bytes.try_into().expect("4 bytes")), 0.25);
    }

    #[test]
    fn unknown_uniform_is_reported() {
        let mut block = UniformBlock::new(UniformLayout::shell());
        assert_eq!(
            block.set("UVScale", UniformValue::Float(1.0)),
            Err(FurError::UnknownUniform("UVScale".into()))
        );
    }

    #[test]
    fn mat3_columns_are_padded() {
        let mut block = UniformBlock::new(UniformLayout::new(&[UniformDecl::new(
            "m",
            UniformKind::Mat3,
        )]));
        block.set("m", UniformValue::Mat3(Mat3::IDENTITY)).expect("mat3 binds");
        let floats: Vec<f32> = block
            .bytes()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes(b.try_into().expect("4 bytes")))
            .collect();
        assert_eq!(&floats[..12], &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn layers_are_staged_at_aligned_offsets() {
        let mut layered = LayeredUniforms::new(UniformLayout::shell(), 256, 2);
        assert_eq!(layered.stride(), 256);
        assert_eq!(layered.capacity(), 2);

        layered.block_mut().bind("current_layer", UniformValue::Float(0.0));
        assert_eq!(layered.stage(0), 0);
        layered.block_mut().bind("current_layer", UniformValue::Float(2.0));
        assert_eq!(layered.stage(2), 512);
        assert_eq!(layered.capacity(), 3);
        assert!(!layered.reserve(3));
        assert!(layered.reserve(8));

        let staged = layered.staged(3);
        assert_eq!(staged.len(), 768);
        let at = 512 + 192;
        assert_eq!(f32::from_ne_bytes(staged[at..at + 4].try_into().expect("4 bytes")), 2.0);
    }
}
