//! Texture Configuration
//!
//! Parameters for creating textures from scratch, loading them from a
//! stream, and writing them back out.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::addressing::Geometry;
use crate::error::{KtxError, KtxResult};
use crate::format::FormatSize;

/// Parameters for creating a texture from scratch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureCreateInfo {
    /// OpenGL sized internal format (KTX 1)
    pub gl_internal_format: u32,
    /// Vulkan format (KTX 2)
    pub vk_format: u32,
    /// Width of the base level in texels
    pub base_width: u32,
    /// Height of the base level in texels
    pub base_height: u32,
    /// Depth of the base level in texels
    pub base_depth: u32,
    /// Number of dimensions: 1, 2 or 3
    pub num_dimensions: u32,
    /// Number of mip levels
    pub num_levels: u32,
    /// Number of array layers
    pub num_layers: u32,
    /// Number of faces: 6 for cubemaps, 1 otherwise
    pub num_faces: u32,
    /// Whether this is an array texture
    pub is_array: bool,
    /// Whether mipmaps should be generated at upload time
    pub generate_mipmaps: bool,
}

impl Default for TextureCreateInfo {
    fn default() -> Self {
        Self {
            gl_internal_format: 0,
            vk_format: 0,
            base_width: 1,
            base_height: 1,
            base_depth: 1,
            num_dimensions: 2,
            num_levels: 1,
            num_layers: 1,
            num_faces: 1,
            is_array: false,
            generate_mipmaps: false,
        }
    }
}

impl TextureCreateInfo {
    /// Geometry described by this create info
    pub fn geometry(&self) -> Geometry {
        Geometry {
            base_width: self.base_width,
            base_height: self.base_height,
            base_depth: self.base_depth,
            num_levels: self.num_levels,
            num_layers: self.num_layers,
            num_faces: self.num_faces,
        }
    }

    /// Validate the create info against the block geometry of its format
    pub fn validate(&self, format: &FormatSize) -> KtxResult<()> {
        if !(1..=3).contains(&self.num_dimensions) {
            return Err(KtxError::invalid_value(format!(
                "{} dimensions; must be 1, 2 or 3",
                self.num_dimensions
            )));
        }
        if self.base_width == 0 || self.base_height == 0 || self.base_depth == 0 {
            return Err(KtxError::invalid_value("texture dimensions must be non-zero"));
        }
        if self.num_dimensions < 2 && self.base_height != 1 {
            return Err(KtxError::invalid_value("1D texture with height > 1"));
        }
        if self.num_dimensions < 3 && self.base_depth != 1 {
            return Err(KtxError::invalid_value("depth > 1 needs a 3D texture"));
        }
        if self.num_dimensions == 3 {
            if format.is_compressed() && format.block_depth == 1 {
                return Err(KtxError::UnsupportedFeature(
                    "3D textures with 2D compressed formats".into(),
                ));
            }
            if self.is_array {
                return Err(KtxError::UnsupportedFeature("3D array textures".into()));
            }
        }
        match self.num_faces {
            1 => {}
            6 => {
                if self.num_dimensions != 2 {
                    return Err(KtxError::invalid_value("cubemaps must be 2D"));
                }
                if self.base_width != self.base_height {
                    return Err(KtxError::invalid_value("cubemap faces must be square"));
                }
            }
            n => {
                return Err(KtxError::invalid_value(format!("{n} faces; must be 1 or 6")));
            }
        }
        if self.num_layers == 0 {
            return Err(KtxError::invalid_value("layer count must be non-zero"));
        }
        if !self.is_array && self.num_layers > 1 {
            return Err(KtxError::invalid_value("multiple layers need an array texture"));
        }
        if self.num_levels == 0 {
            return Err(KtxError::invalid_value("level count must be non-zero"));
        }
        if self.generate_mipmaps && self.num_levels > 1 {
            return Err(KtxError::invalid_value(
                "generate_mipmaps requires exactly one level",
            ));
        }
        let max = max_levels(self.base_width, self.base_height, self.base_depth);
        if self.num_levels > max {
            return Err(KtxError::invalid_value(format!(
                "{} levels exceeds the {} a {}x{}x{} texture can have",
                self.num_levels, max, self.base_width, self.base_height, self.base_depth
            )));
        }
        Ok(())
    }
}

/// Largest mip chain for the given base dimensions
pub fn max_levels(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    32 - largest.leading_zeros()
}

/// Whether to allocate image storage when creating a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TextureCreateStorage {
    /// Metadata only; images are streamed or set later
    #[default]
    NoStorage,
    /// Allocate a zeroed buffer for all images
    AllocStorage,
}

bitflags! {
    /// Flags controlling how a texture is created from a stream
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureCreateFlags: u32 {
        /// Load all image data into memory during construction
        const LOAD_IMAGE_DATA = 0x1;
        /// Keep the metadata block as raw bytes instead of parsing it
        const RAW_KVDATA = 0x2;
        /// Skip the metadata block entirely
        const SKIP_KVDATA = 0x4;
        /// Accepted for compatibility; no effect
        const CHECK_GLTF_BASISU = 0x8;
    }
}

/// Options applied when writing a texture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Value stored under `KTXwriter` when the texture has none
    pub writer_id: Option<String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            writer_id: Some(concat!("ktx-engine v", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{gl, FormatInfo};

    fn rgba8() -> FormatSize {
        FormatInfo::from_gl_internal_format(gl::RGBA8).unwrap().size
    }

    fn info_2d(w: u32, h: u32, levels: u32) -> TextureCreateInfo {
        TextureCreateInfo {
            gl_internal_format: gl::RGBA8,
            base_width: w,
            base_height: h,
            num_levels: levels,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_2d() {
        assert!(info_2d(4, 4, 3).validate(&rgba8()).is_ok());
    }

    #[test]
    fn test_too_many_levels() {
        assert!(info_2d(4, 4, 4).validate(&rgba8()).is_err());
    }

    #[test]
    fn test_zero_dimension() {
        assert!(matches!(
            info_2d(0, 4, 1).validate(&rgba8()),
            Err(KtxError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_generate_mipmaps_single_level() {
        let mut info = info_2d(8, 8, 2);
        info.generate_mipmaps = true;
        assert!(info.validate(&rgba8()).is_err());
        info.num_levels = 1;
        assert!(info.validate(&rgba8()).is_ok());
    }

    #[test]
    fn test_cubemap_rules() {
        let mut info = info_2d(8, 8, 1);
        info.num_faces = 6;
        assert!(info.validate(&rgba8()).is_ok());

        info.base_height = 4;
        assert!(info.validate(&rgba8()).is_err());

        info.base_height = 8;
        info.num_faces = 3;
        assert!(info.validate(&rgba8()).is_err());
    }

    #[test]
    fn test_compressed_3d_unsupported() {
        let bc1 = FormatInfo::from_gl_internal_format(gl::COMPRESSED_RGB_S3TC_DXT1).unwrap().size;
        let info = TextureCreateInfo {
            base_width: 8,
            base_height: 8,
            base_depth: 8,
            num_dimensions: 3,
            ..Default::default()
        };
        assert!(matches!(info.validate(&bc1), Err(KtxError::UnsupportedFeature(_))));
        assert!(info.validate(&rgba8()).is_ok());
    }

    #[test]
    fn test_layers_need_array() {
        let mut info = info_2d(4, 4, 1);
        info.num_layers = 2;
        assert!(info.validate(&rgba8()).is_err());
        info.is_array = true;
        assert!(info.validate(&rgba8()).is_ok());
    }

    #[test]
    fn test_max_levels() {
        assert_eq!(max_levels(1, 1, 1), 1);
        assert_eq!(max_levels(4, 4, 1), 3);
        assert_eq!(max_levels(256, 16, 1), 9);
        assert_eq!(max_levels(5, 3, 1), 3);
    }

    #[test]
    fn test_create_info_serde() {
        let info = info_2d(16, 8, 2);
        let json = serde_json::to_string(&info).unwrap();
        let back: TextureCreateInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);

        let partial: TextureCreateInfo =
            serde_json::from_str(r#"{"base_width": 32, "base_height": 32}"#).unwrap();
        assert_eq!(partial.num_levels, 1);
        assert_eq!(partial.base_width, 32);
    }

    #[test]
    fn test_flags() {
        let flags = TextureCreateFlags::LOAD_IMAGE_DATA | TextureCreateFlags::SKIP_KVDATA;
        assert!(flags.contains(TextureCreateFlags::LOAD_IMAGE_DATA));
        assert!(!flags.contains(TextureCreateFlags::RAW_KVDATA));
    }
}
