//! Texture loading and data structures.
//! Base colour textures are decoded to RGBA8 before GPU upload.

use std::path::Path;

use anyhow::{Context, Result, ensure};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

const RGBA8_BYTES: u64 = 4;

/// Byte length of a `width x height` RGBA8 image, `None` on overflow.
fn rgba8_len(width: u32, height: u32) -> Option<u64> {
    u64::from(width)
        .checked_mul(u64::from(height))?
        .checked_mul(RGBA8_BYTES)
}

impl TextureData {
    /// Wrap raw RGBA8 texels; the buffer length must match the dimensions.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        ensure!(
            rgba8_len(width, height) == Some(data.len() as u64),
            "Data size {} doesn't match RGBA8 {}x{}",
            data.len(),
            width,
            height
        );
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Load a texture from any format the `image` crate was built with (PNG, BMP).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path).with_context(|| format!("Failed to open image {path:?}"))?;

        // Flip so that v=0 is the bottom row, matching OBJ texture coordinates.
        let rgba = image::imageops::flip_vertical(&img.to_rgba8());
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Self::new_rgba8(width, height, data)
    }

    /// A single texel of `rgba`, used when a renderable has no base texture.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            data: rgba.to_vec(),
            width: 1,
            height: 1,
        }
    }

    /// Non-empty, with exactly `width * height` RGBA8 texels.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && rgba8_len(self.width, self.height) == Some(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_texture_is_one_texel() {
        let t = TextureData::solid([10, 20, 30, 255]);
        assert!(t.is_valid());
        assert_eq!(t.data, vec![10, 20, 30, 255]);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        assert!(TextureData::new_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::new_rgba8(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn hand_built_textures_are_checked() {
        let mut t = TextureData::solid([0, 0, 0, 255]);
        t.width = 2;
        assert!(!t.is_valid());
        let empty = TextureData {
            data: Vec::new(),
            width: 0,
            height: 0,
        };
        assert!(!empty.is_valid());
        let wide = TextureData {
            data: Vec::new(),
            width: u32::MAX,
            height: u32::MAX,
        };
        assert!(!wide.is_valid());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = TextureData::load("does/not/exist.bmp").unwrap_err();
        assert!(format!("{err:#}").contains("exist.bmp"));
    }
}
