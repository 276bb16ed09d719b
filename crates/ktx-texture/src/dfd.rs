//! Data Format Descriptor
//!
//! The Khronos basic descriptor block a KTX 2 file uses to describe its
//! texel encoding. Only the fields the container needs are interpreted;
//! samples are carried through untouched.

use smallvec::SmallVec;

use ktx_core::{FormatFamily, FormatInfo, FormatSizeFlags, KtxError, KtxResult};

const BASIC_BLOCK_HEADER_BYTES: usize = 24;
const SAMPLE_BYTES: usize = 16;
const VERSION_1_3: u32 = 2;

const CHANNEL_RED: u8 = 0;
const CHANNEL_GREEN: u8 = 1;
const CHANNEL_BLUE: u8 = 2;
const CHANNEL_STENCIL: u8 = 13;
const CHANNEL_DEPTH: u8 = 14;
const CHANNEL_ALPHA: u8 = 15;
const QUALIFIER_SIGNED: u8 = 0x40;
const QUALIFIER_FLOAT: u8 = 0x80;

const TRANSFER_LINEAR: u8 = 1;
const TRANSFER_SRGB: u8 = 2;
const PRIMARIES_BT709: u8 = 1;

/// Colour model of a descriptor block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorModel {
    Unspecified,
    Rgbsda,
    Bc1a,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6h,
    Bc7,
    Etc1,
    Etc2,
    Astc,
    Etc1s,
    Pvrtc,
    Uastc,
    Other(u8),
}

impl From<u8> for ColorModel {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unspecified,
            1 => Self::Rgbsda,
            128 => Self::Bc1a,
            129 => Self::Bc2,
            130 => Self::Bc3,
            131 => Self::Bc4,
            132 => Self::Bc5,
            133 => Self::Bc6h,
            134 => Self::Bc7,
            160 => Self::Etc1,
            161 => Self::Etc2,
            162 => Self::Astc,
            163 => Self::Etc1s,
            164 => Self::Pvrtc,
            166 => Self::Uastc,
            other => Self::Other(other),
        }
    }
}

impl From<ColorModel> for u8 {
    fn from(model: ColorModel) -> Self {
        match model {
            ColorModel::Unspecified => 0,
            ColorModel::Rgbsda => 1,
            ColorModel::Bc1a => 128,
            ColorModel::Bc2 => 129,
            ColorModel::Bc3 => 130,
            ColorModel::Bc4 => 131,
            ColorModel::Bc5 => 132,
            ColorModel::Bc6h => 133,
            ColorModel::Bc7 => 134,
            ColorModel::Etc1 => 160,
            ColorModel::Etc2 => 161,
            ColorModel::Astc => 162,
            ColorModel::Etc1s => 163,
            ColorModel::Pvrtc => 164,
            ColorModel::Uastc => 166,
            ColorModel::Other(other) => other,
        }
    }
}

impl ColorModel {
    /// Whether data in this model is a Basis Universal payload
    pub fn is_basis(self) -> bool {
        matches!(self, Self::Etc1s | Self::Uastc)
    }
}

/// One sample of a basic descriptor block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub bit_offset: u16,
    /// Bit length minus one
    pub bit_length: u8,
    /// Channel id in the low nibble, qualifiers in the high bits
    pub channel_type: u8,
    pub positions: [u8; 4],
    pub lower: u32,
    pub upper: u32,
}

/// Parsed basic data format descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFormatDescriptor {
    pub color_model: ColorModel,
    pub color_primaries: u8,
    pub transfer_function: u8,
    pub flags: u8,
    /// Texel block dimensions, each stored minus one
    pub texel_block_dimensions: [u8; 4],
    pub bytes_planes: [u8; 8],
    pub samples: SmallVec<[Sample; 4]>,
}

fn word(bytes: &[u8], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl DataFormatDescriptor {
    /// Parse a descriptor, starting at its total-size word
    pub fn parse(bytes: &[u8]) -> KtxResult<Self> {
        if bytes.len() < 4 + BASIC_BLOCK_HEADER_BYTES {
            return Err(KtxError::data(format!(
                "data format descriptor of {} bytes is too short",
                bytes.len()
            )));
        }
        let total = word(bytes, 0) as usize;
        if total < 4 + BASIC_BLOCK_HEADER_BYTES || total > bytes.len() {
            return Err(KtxError::data(format!(
                "data format descriptor claims {} bytes, {} available",
                total,
                bytes.len()
            )));
        }
        let block = &bytes[4..total];
        let header = word(block, 0);
        let (vendor, descriptor_type) = (header & 0x1FFFF, header >> 17);
        if vendor != 0 || descriptor_type != 0 {
            return Err(KtxError::UnsupportedFeature(format!(
                "descriptor block vendor {vendor} type {descriptor_type}"
            )));
        }
        let block_size = (word(block, 1) >> 16) as usize;
        if block_size < BASIC_BLOCK_HEADER_BYTES || block_size > block.len() {
            return Err(KtxError::data(format!(
                "descriptor block size {block_size} is invalid"
            )));
        }

        let model = word(block, 2).to_le_bytes();
        let mut texel_block_dimensions = [0u8; 4];
        texel_block_dimensions.copy_from_slice(&block[12..16]);
        let mut bytes_planes = [0u8; 8];
        bytes_planes.copy_from_slice(&block[16..24]);

        let samples = block[BASIC_BLOCK_HEADER_BYTES..block_size]
            .chunks_exact(SAMPLE_BYTES)
            .map(|s| {
                let w0 = word(s, 0);
                Sample {
                    bit_offset: (w0 & 0xFFFF) as u16,
                    bit_length: (w0 >> 16) as u8,
                    channel_type: (w0 >> 24) as u8,
                    positions: word(s, 1).to_le_bytes(),
                    lower: word(s, 2),
                    upper: word(s, 3),
                }
            })
            .collect();

        Ok(Self {
            color_model: ColorModel::from(model[0]),
            color_primaries: model[1],
            transfer_function: model[2],
            flags: model[3],
            texel_block_dimensions,
            bytes_planes,
            samples,
        })
    }

    /// Serialize, including the leading total-size word
    pub fn to_bytes(&self) -> Vec<u8> {
        let block_size = BASIC_BLOCK_HEADER_BYTES + self.samples.len() * SAMPLE_BYTES;
        let mut out = Vec::with_capacity(4 + block_size);
        out.extend_from_slice(&((4 + block_size) as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(VERSION_1_3 | ((block_size as u32) << 16)).to_le_bytes());
        out.extend_from_slice(&[
            self.color_model.into(),
            self.color_primaries,
            self.transfer_function,
            self.flags,
        ]);
        out.extend_from_slice(&self.texel_block_dimensions);
        out.extend_from_slice(&self.bytes_planes);
        for s in &self.samples {
            let w0 = s.bit_offset as u32 | (s.bit_length as u32) << 16 | (s.channel_type as u32) << 24;
            out.extend_from_slice(&w0.to_le_bytes());
            out.extend_from_slice(&s.positions);
            out.extend_from_slice(&s.lower.to_le_bytes());
            out.extend_from_slice(&s.upper.to_le_bytes());
        }
        out
    }

    /// Describe a known format
    pub fn from_format(format: &FormatInfo) -> Self {
        let size = &format.size;
        let bytes = size.block_size_bytes();
        let model = match format.family {
            FormatFamily::Uncompressed { .. } | FormatFamily::DepthStencil => ColorModel::Rgbsda,
            FormatFamily::Bc1 => ColorModel::Bc1a,
            FormatFamily::Bc2 => ColorModel::Bc2,
            FormatFamily::Bc3 => ColorModel::Bc3,
            FormatFamily::Bc4 => ColorModel::Bc4,
            FormatFamily::Bc5 => ColorModel::Bc5,
            FormatFamily::Bc6h => ColorModel::Bc6h,
            FormatFamily::Bc7 => ColorModel::Bc7,
            FormatFamily::Etc1 => ColorModel::Etc1,
            FormatFamily::Etc2 | FormatFamily::Eac => ColorModel::Etc2,
            FormatFamily::Astc => ColorModel::Astc,
            FormatFamily::Pvrtc => ColorModel::Pvrtc,
            FormatFamily::Basis => ColorModel::Uastc,
        };

        let samples = match format.family {
            FormatFamily::Uncompressed { channels, float } => {
                channel_samples(size.flags, bytes, channels, float)
            }
            FormatFamily::DepthStencil => depth_samples(size.flags, bytes),
            _ => SmallVec::from_elem(
                Sample {
                    bit_offset: 0,
                    bit_length: (bytes * 8 - 1) as u8,
                    channel_type: 0,
                    positions: [0; 4],
                    lower: 0,
                    upper: u32::MAX,
                },
                1,
            ),
        };

        let mut bytes_planes = [0u8; 8];
        bytes_planes[0] = bytes as u8;
        Self {
            color_model: model,
            color_primaries: PRIMARIES_BT709,
            transfer_function: if format.srgb { TRANSFER_SRGB } else { TRANSFER_LINEAR },
            flags: 0,
            texel_block_dimensions: [
                (size.block_width.max(1) - 1) as u8,
                (size.block_height.max(1) - 1) as u8,
                (size.block_depth.max(1) - 1) as u8,
                0,
            ],
            bytes_planes,
            samples,
        }
    }

    /// Texel block dimensions in texels
    pub fn block_dimensions(&self) -> (u32, u32, u32) {
        let [w, h, d, _] = self.texel_block_dimensions;
        (w as u32 + 1, h as u32 + 1, d as u32 + 1)
    }

    /// Bytes in one block of plane 0
    pub fn bytes_plane0(&self) -> u32 {
        self.bytes_planes[0] as u32
    }

    /// Whether the transfer function is sRGB
    pub fn is_srgb(&self) -> bool {
        self.transfer_function == TRANSFER_SRGB
    }

    /// Addressing description of a Basis Universal payload
    pub fn basis_format(&self) -> KtxResult<FormatInfo> {
        if !self.color_model.is_basis() {
            return Err(KtxError::UnsupportedFeature(format!(
                "undefined format with colour model {:?}",
                self.color_model
            )));
        }
        // ETC1S leaves bytesPlane0 unset; its slice blocks are 8 bytes.
        let bytes = match self.bytes_plane0() {
            0 => 8,
            n => n,
        };
        let mut info = FormatInfo::basis(bytes);
        let (w, h, d) = self.block_dimensions();
        info.size.block_width = w;
        info.size.block_height = h;
        info.size.block_depth = d;
        info.srgb = self.is_srgb();
        Ok(info)
    }
}

fn channel_samples(flags: FormatSizeFlags, bytes: u32, channels: u8, float: bool) -> SmallVec<[Sample; 4]> {
    let ids = [CHANNEL_RED, CHANNEL_GREEN, CHANNEL_BLUE, CHANNEL_ALPHA];
    let channels = channels.clamp(1, 4) as usize;
    let widths: SmallVec<[u32; 4]> = if flags.contains(FormatSizeFlags::PACKED) && bytes == 2 && channels == 3 {
        SmallVec::from_slice(&[5, 6, 5])
    } else {
        SmallVec::from_elem(bytes * 8 / channels as u32, channels)
    };
    // Packed 5:6:5 stores red in the high bits.
    let packed = flags.contains(FormatSizeFlags::PACKED);
    let total: u32 = widths.iter().sum();

    let mut offset = 0;
    let mut samples = SmallVec::new();
    for (i, &bits) in widths.iter().enumerate() {
        let bit_offset = if packed { total - offset - bits } else { offset };
        let (channel_type, lower, upper) = if float && bits == 16 {
            (ids[i] | QUALIFIER_FLOAT | QUALIFIER_SIGNED, 0xBC00, 0x3C00)
        } else if float {
            (ids[i] | QUALIFIER_FLOAT | QUALIFIER_SIGNED, 0xBF80_0000, 0x3F80_0000)
        } else {
            (ids[i], 0, max_value(bits))
        };
        samples.push(Sample {
            bit_offset: bit_offset as u16,
            bit_length: (bits - 1) as u8,
            channel_type,
            positions: [0; 4],
            lower,
            upper,
        });
        offset += bits;
    }
    samples
}

fn depth_samples(flags: FormatSizeFlags, bytes: u32) -> SmallVec<[Sample; 4]> {
    let mut samples = SmallVec::new();
    let depth_bits = if flags.contains(FormatSizeFlags::STENCIL) { 24 } else { bytes * 8 };
    samples.push(Sample {
        bit_offset: 0,
        bit_length: (depth_bits - 1) as u8,
        channel_type: CHANNEL_DEPTH,
        positions: [0; 4],
        lower: 0,
        upper: max_value(depth_bits),
    });
    if flags.contains(FormatSizeFlags::STENCIL) {
        samples.push(Sample {
            bit_offset: 24,
            bit_length: 7,
            channel_type: CHANNEL_STENCIL,
            positions: [0; 4],
            lower: 0,
            upper: 0xFF,
        });
    }
    samples
}

fn max_value(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1 << bits) - 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ktx_core::format::vk;

    #[test]
    fn test_rgba8_descriptor() {
        let info = FormatInfo::from_vk_format(vk::R8G8B8A8_SRGB).unwrap();
        let dfd = DataFormatDescriptor::from_format(&info);

        assert_eq!(dfd.color_model, ColorModel::Rgbsda);
        assert!(dfd.is_srgb());
        assert_eq!(dfd.samples.len(), 4);
        assert_eq!(dfd.samples[3].channel_type, CHANNEL_ALPHA);
        assert_eq!(dfd.samples[1].bit_offset, 8);
        assert_eq!(dfd.samples[1].bit_length, 7);
        assert_eq!(dfd.bytes_plane0(), 4);

        let bytes = dfd.to_bytes();
        assert_eq!(bytes.len(), 4 + 24 + 4 * 16);
        assert_eq!(word(&bytes, 0) as usize, bytes.len());
        assert_eq!(DataFormatDescriptor::parse(&bytes).unwrap(), dfd);
    }

    #[test]
    fn test_compressed_descriptor() {
        let info = FormatInfo::from_vk_format(vk::BC7_UNORM).unwrap();
        let dfd = DataFormatDescriptor::from_format(&info);

        assert_eq!(dfd.color_model, ColorModel::Bc7);
        assert_eq!(dfd.block_dimensions(), (4, 4, 1));
        assert_eq!(dfd.samples[0].bit_length, 127);
        assert!(!dfd.color_model.is_basis());
    }

    #[test]
    fn test_packed_565() {
        let info = FormatInfo::from_vk_format(vk::R5G6B5_UNORM_PACK16).unwrap();
        let dfd = DataFormatDescriptor::from_format(&info);
        let offsets: Vec<_> = dfd.samples.iter().map(|s| s.bit_offset).collect();
        assert_eq!(offsets, vec![11, 5, 0]);
    }

    #[test]
    fn test_basis_format() {
        let mut dfd = DataFormatDescriptor::from_format(&FormatInfo::basis(16));
        assert_eq!(dfd.color_model, ColorModel::Uastc);
        assert_eq!(dfd.basis_format().unwrap().size.block_size_bytes(), 16);

        dfd.color_model = ColorModel::Etc1s;
        dfd.bytes_planes[0] = 0;
        assert_eq!(dfd.basis_format().unwrap().size.block_size_bytes(), 8);

        dfd.color_model = ColorModel::Bc7;
        assert!(matches!(dfd.basis_format(), Err(KtxError::UnsupportedFeature(_))));
    }

    #[test]
    fn test_parse_truncated() {
        let info = FormatInfo::from_vk_format(vk::R8G8B8A8_UNORM).unwrap();
        let bytes = DataFormatDescriptor::from_format(&info).to_bytes();
        assert!(matches!(
            DataFormatDescriptor::parse(&bytes[..20]),
            Err(KtxError::FileDataError(_))
        ));
        assert!(DataFormatDescriptor::parse(&bytes[..bytes.len() - 4]).is_err());
    }

    #[test]
    fn test_color_model_codes() {
        assert_eq!(ColorModel::from(163), ColorModel::Etc1s);
        assert_eq!(u8::from(ColorModel::Uastc), 166);
        assert_eq!(ColorModel::from(200), ColorModel::Other(200));
        assert!(ColorModel::Etc1s.is_basis());
    }
}
