//! Format Descriptors
//!
//! Block geometry for the pixel formats a KTX container can carry:
//! - OpenGL sized internal formats (KTX 1)
//! - Vulkan formats (KTX 2)
//!
//! Only the information the addressing math needs lives here; GPU-side
//! format negotiation belongs to the upload collaborators.

use bitflags::bitflags;

bitflags! {
    /// Format size flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FormatSizeFlags: u32 {
        const PACKED = 0x1;
        const COMPRESSED = 0x2;
        const PALETTIZED = 0x4;
        const DEPTH = 0x8;
        const STENCIL = 0x10;
    }
}

/// Size and block geometry of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSize {
    /// Format flags
    pub flags: FormatSizeFlags,
    /// Texel block width in texels
    pub block_width: u32,
    /// Texel block height in texels
    pub block_height: u32,
    /// Texel block depth in texels
    pub block_depth: u32,
    /// Size of one block in bits
    pub block_size_in_bits: u32,
    /// Minimum number of blocks in X an image occupies
    pub min_blocks_x: u32,
    /// Minimum number of blocks in Y an image occupies
    pub min_blocks_y: u32,
}

impl FormatSize {
    /// Size for an uncompressed format with `bytes` bytes per texel
    pub const fn uncompressed(bytes: u32) -> Self {
        Self {
            flags: FormatSizeFlags::empty(),
            block_width: 1,
            block_height: 1,
            block_depth: 1,
            block_size_in_bits: bytes * 8,
            min_blocks_x: 1,
            min_blocks_y: 1,
        }
    }

    /// Size for a block-compressed format
    pub const fn compressed(block_width: u32, block_height: u32, bytes: u32) -> Self {
        Self {
            flags: FormatSizeFlags::COMPRESSED,
            block_width,
            block_height,
            block_depth: 1,
            block_size_in_bits: bytes * 8,
            min_blocks_x: 1,
            min_blocks_y: 1,
        }
    }

    const fn with_flags(mut self, flags: FormatSizeFlags) -> Self {
        self.flags = flags;
        self
    }

    const fn with_min_blocks(mut self, x: u32, y: u32) -> Self {
        self.min_blocks_x = x;
        self.min_blocks_y = y;
        self
    }

    /// Bytes in one texel block
    pub fn block_size_bytes(&self) -> u32 {
        self.block_size_in_bits / 8
    }

    /// Whether the format is block compressed
    pub fn is_compressed(&self) -> bool {
        self.flags.contains(FormatSizeFlags::COMPRESSED)
    }
}

/// Broad family of a format, used when describing it in a data format descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    /// Plain channel data
    Uncompressed { channels: u8, float: bool },
    /// Depth and/or stencil
    DepthStencil,
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6h,
    Bc7,
    Etc1,
    Etc2,
    Eac,
    Astc,
    Pvrtc,
    /// Basis Universal payload that must be transcoded before use
    Basis,
}

/// Everything the core knows about a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub size: FormatSize,
    pub family: FormatFamily,
    pub srgb: bool,
}

impl FormatInfo {
    const fn plain(bytes: u32, channels: u8, float: bool) -> Self {
        Self {
            size: FormatSize::uncompressed(bytes),
            family: FormatFamily::Uncompressed { channels, float },
            srgb: false,
        }
    }

    const fn packed(bytes: u32, channels: u8) -> Self {
        Self {
            size: FormatSize::uncompressed(bytes).with_flags(FormatSizeFlags::PACKED),
            family: FormatFamily::Uncompressed { channels, float: false },
            srgb: false,
        }
    }

    const fn depth(bytes: u32, stencil: bool) -> Self {
        let flags = if stencil {
            FormatSizeFlags::DEPTH.union(FormatSizeFlags::STENCIL)
        } else {
            FormatSizeFlags::DEPTH
        };
        Self {
            size: FormatSize::uncompressed(bytes).with_flags(flags),
            family: FormatFamily::DepthStencil,
            srgb: false,
        }
    }

    const fn block(family: FormatFamily, w: u32, h: u32, bytes: u32) -> Self {
        Self {
            size: FormatSize::compressed(w, h, bytes),
            family,
            srgb: false,
        }
    }

    const fn srgb(mut self) -> Self {
        self.srgb = true;
        self
    }

    /// Geometry of the opaque Basis Universal payload (4x4 blocks)
    pub const fn basis(block_bytes: u32) -> Self {
        Self::block(FormatFamily::Basis, 4, 4, block_bytes)
    }

    /// Size of the data type a texel component is stored in; 1 for compressed formats
    pub fn type_size(&self) -> u32 {
        let bytes = self.size.block_size_bytes();
        match self.family {
            FormatFamily::Uncompressed { channels, .. }
                if !self.size.flags.contains(FormatSizeFlags::PACKED) =>
            {
                bytes / channels.max(1) as u32
            }
            FormatFamily::Uncompressed { .. } | FormatFamily::DepthStencil => bytes,
            _ => 1,
        }
    }

    /// Pixel transfer parameters a KTX 1 header records for `internal_format`
    pub fn gl_transfer(&self, internal_format: u32) -> GlTransfer {
        use FormatFamily::*;

        let compressed = |base_internal_format| GlTransfer {
            format: 0,
            type_: 0,
            type_size: 1,
            base_internal_format,
        };
        let rgb_or_rgba = if self.size.block_size_bytes() == 8 { gl::RGB } else { gl::RGBA };
        match self.family {
            Bc1 if internal_format == gl::COMPRESSED_RGB_S3TC_DXT1 => compressed(gl::RGB),
            Bc4 => compressed(gl::RED),
            Bc5 => compressed(gl::RG),
            Eac if self.size.block_size_bytes() == 8 => compressed(gl::RED),
            Eac => compressed(gl::RG),
            Etc1 | Etc2 | Pvrtc => compressed(rgb_or_rgba),
            Bc1 | Bc2 | Bc3 | Bc6h | Bc7 | Astc | Basis => compressed(gl::RGBA),
            DepthStencil => {
                let (format, type_) = match internal_format {
                    gl::DEPTH24_STENCIL8 => (gl::DEPTH_STENCIL, gl::UNSIGNED_INT_24_8),
                    gl::DEPTH_COMPONENT32F => (gl::DEPTH_COMPONENT, gl::FLOAT),
                    gl::DEPTH_COMPONENT16 => (gl::DEPTH_COMPONENT, gl::UNSIGNED_SHORT),
                    _ => (gl::DEPTH_COMPONENT, gl::UNSIGNED_INT),
                };
                GlTransfer::uncompressed(format, type_, self.type_size())
            }
            Uncompressed { .. } if self.size.flags.contains(FormatSizeFlags::PACKED) => {
                let (format, type_) = match internal_format {
                    gl::RGB565 => (gl::RGB, gl::UNSIGNED_SHORT_5_6_5),
                    gl::RGBA4 => (gl::RGBA, gl::UNSIGNED_SHORT_4_4_4_4),
                    _ => (gl::RGBA, gl::UNSIGNED_SHORT_5_5_5_1),
                };
                GlTransfer::uncompressed(format, type_, self.type_size())
            }
            Uncompressed { channels, float } => {
                let format = match channels {
                    1 => gl::RED,
                    2 => gl::RG,
                    3 => gl::RGB,
                    _ => gl::RGBA,
                };
                let type_size = self.type_size();
                let type_ = match (float, type_size) {
                    (true, 2) => gl::HALF_FLOAT,
                    (true, _) => gl::FLOAT,
                    (false, 1) => gl::UNSIGNED_BYTE,
                    (false, 2) => gl::UNSIGNED_SHORT,
                    (false, _) => gl::UNSIGNED_INT,
                };
                GlTransfer::uncompressed(format, type_, type_size)
            }
        }
    }

    /// Look up an OpenGL sized internal format
    pub fn from_gl_internal_format(format: u32) -> Option<Self> {
        use FormatFamily::*;

        let info = match format {
            gl::R8 => Self::plain(1, 1, false),
            gl::RG8 => Self::plain(2, 2, false),
            gl::RGB8 => Self::plain(3, 3, false),
            gl::SRGB8 => Self::plain(3, 3, false).srgb(),
            gl::RGBA8 => Self::plain(4, 4, false),
            gl::SRGB8_ALPHA8 => Self::plain(4, 4, false).srgb(),
            gl::R16F => Self::plain(2, 1, true),
            gl::RG16F => Self::plain(4, 2, true),
            gl::RGBA16F => Self::plain(8, 4, true),
            gl::R32F => Self::plain(4, 1, true),
            gl::RG32F => Self::plain(8, 2, true),
            gl::RGBA32F => Self::plain(16, 4, true),
            gl::RGB565 => Self::packed(2, 3),
            gl::RGBA4 => Self::packed(2, 4),
            gl::RGB5_A1 => Self::packed(2, 4),
            gl::DEPTH_COMPONENT16 => Self::depth(2, false),
            gl::DEPTH_COMPONENT24 => Self::depth(4, false),
            gl::DEPTH_COMPONENT32F => Self::depth(4, false),
            gl::DEPTH24_STENCIL8 => Self::depth(4, true),
            gl::COMPRESSED_RGB_S3TC_DXT1 | gl::COMPRESSED_RGBA_S3TC_DXT1 => {
                Self::block(Bc1, 4, 4, 8)
            }
            gl::COMPRESSED_RGBA_S3TC_DXT3 => Self::block(Bc2, 4, 4, 16),
            gl::COMPRESSED_RGBA_S3TC_DXT5 => Self::block(Bc3, 4, 4, 16),
            gl::COMPRESSED_RED_RGTC1 => Self::block(Bc4, 4, 4, 8),
            gl::COMPRESSED_RG_RGTC2 => Self::block(Bc5, 4, 4, 16),
            gl::COMPRESSED_RGBA_BPTC_UNORM => Self::block(Bc7, 4, 4, 16),
            gl::COMPRESSED_SRGB_ALPHA_BPTC_UNORM => Self::block(Bc7, 4, 4, 16).srgb(),
            gl::ETC1_RGB8_OES => Self::block(Etc1, 4, 4, 8),
            gl::COMPRESSED_RGB8_ETC2 => Self::block(Etc2, 4, 4, 8),
            gl::COMPRESSED_SRGB8_ETC2 => Self::block(Etc2, 4, 4, 8).srgb(),
            gl::COMPRESSED_RGBA8_ETC2_EAC => Self::block(Etc2, 4, 4, 16),
            gl::COMPRESSED_SRGB8_ALPHA8_ETC2_EAC => Self::block(Etc2, 4, 4, 16).srgb(),
            gl::COMPRESSED_R11_EAC => Self::block(Eac, 4, 4, 8),
            gl::COMPRESSED_RG11_EAC => Self::block(Eac, 4, 4, 16),
            gl::COMPRESSED_RGB_PVRTC_4BPPV1 => Self {
                size: FormatSize::compressed(4, 4, 8).with_min_blocks(2, 2),
                family: Pvrtc,
                srgb: false,
            },
            f if (gl::COMPRESSED_RGBA_ASTC_4X4..=gl::COMPRESSED_RGBA_ASTC_12X12).contains(&f) => {
                let (w, h) = ASTC_BLOCKS[(f - gl::COMPRESSED_RGBA_ASTC_4X4) as usize];
                Self::block(Astc, w, h, 16)
            }
            f if (gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4..=gl::COMPRESSED_SRGB8_ALPHA8_ASTC_12X12)
                .contains(&f) =>
            {
                let (w, h) = ASTC_BLOCKS[(f - gl::COMPRESSED_SRGB8_ALPHA8_ASTC_4X4) as usize];
                Self::block(Astc, w, h, 16).srgb()
            }
            _ => return None,
        };
        Some(info)
    }

    /// Look up a Vulkan format
    pub fn from_vk_format(format: u32) -> Option<Self> {
        use FormatFamily::*;

        let info = match format {
            vk::R5G6B5_UNORM_PACK16 => Self::packed(2, 3),
            vk::R8_UNORM => Self::plain(1, 1, false),
            vk::R8_SRGB => Self::plain(1, 1, false).srgb(),
            vk::R8G8_UNORM => Self::plain(2, 2, false),
            vk::R8G8B8_UNORM => Self::plain(3, 3, false),
            vk::R8G8B8_SRGB => Self::plain(3, 3, false).srgb(),
            vk::R8G8B8A8_UNORM | vk::B8G8R8A8_UNORM => Self::plain(4, 4, false),
            vk::R8G8B8A8_SRGB | vk::B8G8R8A8_SRGB => Self::plain(4, 4, false).srgb(),
            vk::R16_SFLOAT => Self::plain(2, 1, true),
            vk::R16G16_SFLOAT => Self::plain(4, 2, true),
            vk::R16G16B16A16_SFLOAT => Self::plain(8, 4, true),
            vk::R32_SFLOAT => Self::plain(4, 1, true),
            vk::R32G32_SFLOAT => Self::plain(8, 2, true),
            vk::R32G32B32A32_SFLOAT => Self::plain(16, 4, true),
            vk::D16_UNORM => Self::depth(2, false),
            vk::D32_SFLOAT => Self::depth(4, false),
            vk::BC1_RGB_UNORM | vk::BC1_RGBA_UNORM => Self::block(Bc1, 4, 4, 8),
            vk::BC1_RGB_SRGB | vk::BC1_RGBA_SRGB => Self::block(Bc1, 4, 4, 8).srgb(),
            vk::BC2_UNORM => Self::block(Bc2, 4, 4, 16),
            vk::BC2_SRGB => Self::block(Bc2, 4, 4, 16).srgb(),
            vk::BC3_UNORM => Self::block(Bc3, 4, 4, 16),
            vk::BC3_SRGB => Self::block(Bc3, 4, 4, 16).srgb(),
            vk::BC4_UNORM | vk::BC4_SNORM => Self::block(Bc4, 4, 4, 8),
            vk::BC5_UNORM | vk::BC5_SNORM => Self::block(Bc5, 4, 4, 16),
            vk::BC6H_UFLOAT | vk::BC6H_SFLOAT => Self::block(Bc6h, 4, 4, 16),
            vk::BC7_UNORM => Self::block(Bc7, 4, 4, 16),
            vk::BC7_SRGB => Self::block(Bc7, 4, 4, 16).srgb(),
            vk::ETC2_R8G8B8_UNORM | vk::ETC2_R8G8B8A1_UNORM => Self::block(Etc2, 4, 4, 8),
            vk::ETC2_R8G8B8_SRGB | vk::ETC2_R8G8B8A1_SRGB => Self::block(Etc2, 4, 4, 8).srgb(),
            vk::ETC2_R8G8B8A8_UNORM => Self::block(Etc2, 4, 4, 16),
            vk::ETC2_R8G8B8A8_SRGB => Self::block(Etc2, 4, 4, 16).srgb(),
            vk::EAC_R11_UNORM | vk::EAC_R11_SNORM => Self::block(Eac, 4, 4, 8),
            vk::EAC_R11G11_UNORM | vk::EAC_R11G11_SNORM => Self::block(Eac, 4, 4, 16),
            f if (vk::ASTC_4X4_UNORM..=vk::ASTC_12X12_SRGB).contains(&f) => {
                let index = (f - vk::ASTC_4X4_UNORM) as usize;
                let (w, h) = ASTC_BLOCKS[index / 2];
                let info = Self::block(Astc, w, h, 16);
                if index % 2 == 1 { info.srgb() } else { info }
            }
            _ => return None,
        };
        Some(info)
    }
}

/// `glFormat`, `glType` and related fields of a KTX 1 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlTransfer {
    pub format: u32,
    pub type_: u32,
    pub type_size: u32,
    pub base_internal_format: u32,
}

impl GlTransfer {
    const fn uncompressed(format: u32, type_: u32, type_size: u32) -> Self {
        Self {
            format,
            type_,
            type_size,
            base_internal_format: format,
        }
    }
}

/// ASTC block footprints in enumeration order
const ASTC_BLOCKS: [(u32, u32); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];

/// OpenGL format enumerants
pub mod gl {
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const UNSIGNED_SHORT_5_6_5: u32 = 0x8363;
    pub const UNSIGNED_SHORT_4_4_4_4: u32 = 0x8033;
    pub const UNSIGNED_SHORT_5_5_5_1: u32 = 0x8034;
    pub const UNSIGNED_INT_24_8: u32 = 0x84FA;
    pub const HALF_FLOAT: u32 = 0x140B;
    pub const FLOAT: u32 = 0x1406;
    pub const RED: u32 = 0x1903;
    pub const RGB: u32 = 0x1907;
    pub const RGBA: u32 = 0x1908;
    pub const RG: u32 = 0x8227;
    pub const DEPTH_COMPONENT: u32 = 0x1902;
    pub const DEPTH_STENCIL: u32 = 0x84F9;

    pub const R8: u32 = 0x8229;
    pub const RG8: u32 = 0x822B;
    pub const RGB8: u32 = 0x8051;
    pub const RGBA8: u32 = 0x8058;
    pub const SRGB8: u32 = 0x8C41;
    pub const SRGB8_ALPHA8: u32 = 0x8C43;
    pub const R16F: u32 = 0x822D;
    pub const RG16F: u32 = 0x822F;
    pub const RGBA16F: u32 = 0x881A;
    pub const R32F: u32 = 0x822E;
    pub const RG32F: u32 = 0x8230;
    pub const RGBA32F: u32 = 0x8814;
    pub const RGB565: u32 = 0x8D62;
    pub const RGBA4: u32 = 0x8056;
    pub const RGB5_A1: u32 = 0x8057;
    pub const DEPTH_COMPONENT16: u32 = 0x81A5;
    pub const DEPTH_COMPONENT24: u32 = 0x81A6;
    pub const DEPTH_COMPONENT32F: u32 = 0x8CAC;
    pub const DEPTH24_STENCIL8: u32 = 0x88F0;

    pub const COMPRESSED_RGB_S3TC_DXT1: u32 = 0x83F0;
    pub const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
    pub const COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
    pub const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
    pub const COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
    pub const COMPRESSED_RG_RGTC2: u32 = 0x8DBD;
    pub const COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;
    pub const COMPRESSED_SRGB_ALPHA_BPTC_UNORM: u32 = 0x8E8D;
    pub const ETC1_RGB8_OES: u32 = 0x8D64;
    pub const COMPRESSED_R11_EAC: u32 = 0x9270;
    pub const COMPRESSED_RG11_EAC: u32 = 0x9272;
    pub const COMPRESSED_RGB8_ETC2: u32 = 0x9274;
    pub const COMPRESSED_SRGB8_ETC2: u32 = 0x9275;
    pub const COMPRESSED_RGBA8_ETC2_EAC: u32 = 0x9278;
    pub const COMPRESSED_SRGB8_ALPHA8_ETC2_EAC: u32 = 0x9279;
    pub const COMPRESSED_RGB_PVRTC_4BPPV1: u32 = 0x8C00;
    pub const COMPRESSED_RGBA_ASTC_4X4: u32 = 0x93B0;
    pub const COMPRESSED_RGBA_ASTC_12X12: u32 = 0x93BD;
    pub const COMPRESSED_SRGB8_ALPHA8_ASTC_4X4: u32 = 0x93D0;
    pub const COMPRESSED_SRGB8_ALPHA8_ASTC_12X12: u32 = 0x93DD;
}

/// Vulkan format enumerants
pub mod vk {
    pub const UNDEFINED: u32 = 0;
    pub const R5G6B5_UNORM_PACK16: u32 = 4;
    pub const R8_UNORM: u32 = 9;
    pub const R8_SRGB: u32 = 15;
    pub const R8G8_UNORM: u32 = 16;
    pub const R8G8B8_UNORM: u32 = 23;
    pub const R8G8B8_SRGB: u32 = 29;
    pub const R8G8B8A8_UNORM: u32 = 37;
    pub const R8G8B8A8_SRGB: u32 = 43;
    pub const B8G8R8A8_UNORM: u32 = 44;
    pub const B8G8R8A8_SRGB: u32 = 50;
    pub const R16_SFLOAT: u32 = 76;
    pub const R16G16_SFLOAT: u32 = 83;
    pub const R16G16B16A16_SFLOAT: u32 = 97;
    pub const R32_SFLOAT: u32 = 100;
    pub const R32G32_SFLOAT: u32 = 103;
    pub const R32G32B32A32_SFLOAT: u32 = 109;
    pub const D16_UNORM: u32 = 124;
    pub const D32_SFLOAT: u32 = 126;
    pub const BC1_RGB_UNORM: u32 = 131;
    pub const BC1_RGB_SRGB: u32 = 132;
    pub const BC1_RGBA_UNORM: u32 = 133;
    pub const BC1_RGBA_SRGB: u32 = 134;
    pub const BC2_UNORM: u32 = 135;
    pub const BC2_SRGB: u32 = 136;
    pub const BC3_UNORM: u32 = 137;
    pub const BC3_SRGB: u32 = 138;
    pub const BC4_UNORM: u32 = 139;
    pub const BC4_SNORM: u32 = 140;
    pub const BC5_UNORM: u32 = 141;
    pub const BC5_SNORM: u32 = 142;
    pub const BC6H_UFLOAT: u32 = 143;
    pub const BC6H_SFLOAT: u32 = 144;
    pub const BC7_UNORM: u32 = 145;
    pub const BC7_SRGB: u32 = 146;
    pub const ETC2_R8G8B8_UNORM: u32 = 147;
    pub const ETC2_R8G8B8_SRGB: u32 = 148;
    pub const ETC2_R8G8B8A1_UNORM: u32 = 149;
    pub const ETC2_R8G8B8A1_SRGB: u32 = 150;
    pub const ETC2_R8G8B8A8_UNORM: u32 = 151;
    pub const ETC2_R8G8B8A8_SRGB: u32 = 152;
    pub const EAC_R11_UNORM: u32 = 153;
    pub const EAC_R11_SNORM: u32 = 154;
    pub const EAC_R11G11_UNORM: u32 = 155;
    pub const EAC_R11G11_SNORM: u32 = 156;
    pub const ASTC_4X4_UNORM: u32 = 157;
    pub const ASTC_12X12_SRGB: u32 = 184;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncompressed_lookup() {
        let info = FormatInfo::from_gl_internal_format(gl::RGBA8).unwrap();
        assert_eq!(info.size.block_size_bytes(), 4);
        assert!(!info.size.is_compressed());
        assert_eq!(info.family, FormatFamily::Uncompressed { channels: 4, float: false });

        let info = FormatInfo::from_vk_format(vk::R16G16B16A16_SFLOAT).unwrap();
        assert_eq!(info.size.block_size_bytes(), 8);
    }

    #[test]
    fn test_compressed_lookup() {
        let bc1 = FormatInfo::from_gl_internal_format(gl::COMPRESSED_RGB_S3TC_DXT1).unwrap();
        assert!(bc1.size.is_compressed());
        assert_eq!((bc1.size.block_width, bc1.size.block_height), (4, 4));
        assert_eq!(bc1.size.block_size_bytes(), 8);

        let bc7 = FormatInfo::from_vk_format(vk::BC7_SRGB).unwrap();
        assert!(bc7.srgb);
        assert_eq!(bc7.size.block_size_bytes(), 16);
    }

    #[test]
    fn test_astc_footprints() {
        let astc = FormatInfo::from_gl_internal_format(0x93B7).unwrap();
        assert_eq!((astc.size.block_width, astc.size.block_height), (8, 8));

        let unorm = FormatInfo::from_vk_format(165).unwrap();
        let srgb = FormatInfo::from_vk_format(166).unwrap();
        assert_eq!((unorm.size.block_width, unorm.size.block_height), (6, 6));
        assert!(!unorm.srgb);
        assert!(srgb.srgb);

        let last = FormatInfo::from_vk_format(vk::ASTC_12X12_SRGB).unwrap();
        assert_eq!((last.size.block_width, last.size.block_height), (12, 12));
    }

    #[test]
    fn test_pvrtc_min_blocks() {
        let pvrtc = FormatInfo::from_gl_internal_format(gl::COMPRESSED_RGB_PVRTC_4BPPV1).unwrap();
        assert_eq!(pvrtc.size.min_blocks_x, 2);
        assert_eq!(pvrtc.size.min_blocks_y, 2);
    }

    #[test]
    fn test_unknown_format() {
        assert!(FormatInfo::from_gl_internal_format(0xDEAD).is_none());
        assert!(FormatInfo::from_vk_format(vk::UNDEFINED).is_none());
    }

    #[test]
    fn test_gl_transfer() {
        let rgba8 = FormatInfo::from_gl_internal_format(gl::RGBA8).unwrap();
        let t = rgba8.gl_transfer(gl::RGBA8);
        assert_eq!((t.format, t.type_, t.type_size), (gl::RGBA, gl::UNSIGNED_BYTE, 1));

        let half = FormatInfo::from_gl_internal_format(gl::RGBA16F).unwrap();
        let t = half.gl_transfer(gl::RGBA16F);
        assert_eq!((t.type_, t.type_size), (gl::HALF_FLOAT, 2));

        let rgb565 = FormatInfo::from_gl_internal_format(gl::RGB565).unwrap();
        let t = rgb565.gl_transfer(gl::RGB565);
        assert_eq!((t.format, t.type_, t.type_size), (gl::RGB, gl::UNSIGNED_SHORT_5_6_5, 2));

        let dxt1 = FormatInfo::from_gl_internal_format(gl::COMPRESSED_RGB_S3TC_DXT1).unwrap();
        let t = dxt1.gl_transfer(gl::COMPRESSED_RGB_S3TC_DXT1);
        assert_eq!((t.format, t.type_, t.type_size), (0, 0, 1));
        assert_eq!(t.base_internal_format, gl::RGB);
    }

    #[test]
    fn test_depth_flags() {
        let ds = FormatInfo::from_gl_internal_format(gl::DEPTH24_STENCIL8).unwrap();
        assert!(ds.size.flags.contains(FormatSizeFlags::DEPTH | FormatSizeFlags::STENCIL));
    }
}
