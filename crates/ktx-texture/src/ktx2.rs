//! KTX 2 Container
//!
//! `«KTX 20»` files: little-endian header, level index, data format
//! descriptor, sorted metadata, optional supercompression global data and
//! level data stored smallest level first.
//!
//! Zlib-supercompressed levels are inflated on load and deflated on write.
//! Basis LZ data stays packed until a [`Transcoder`] turns it into a GPU
//! format. Zstd is recognised but not decoded.

use std::io::{Read as _, Write as _};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use ktx_core::addressing::align_up;
use ktx_core::error::try_alloc;
use ktx_core::format::vk;
use ktx_core::kvlist::{HashList, KTX_ORIENTATION_KEY, KTX_WRITER_KEY};
use ktx_core::{
    ClassId, FaceSlice, FormatInfo, ImageLayout, KtxError, KtxResult, LayoutRules, Orientation,
    TextureCreateFlags, TextureCreateInfo, TextureCreateStorage, WHOLE_LEVEL, WriteOptions,
};
use ktx_stream::{FileStream, MemStream, SeekFrom, Stream};

use crate::dfd::{ColorModel, DataFormatDescriptor};
use crate::iterate;
use crate::texture::{ImageVisitor, KtxTexture, TextureBase, TextureState};

/// File identifier of a KTX 2 container
pub const KTX2_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Size of the fixed header, identifier and section index included
pub const KTX2_HEADER_SIZE: usize = 80;

const LEVEL_INDEX_ENTRY_SIZE: usize = 24;
const SGD_ALIGNMENT: u32 = 8;

/// Whole-container compression applied on top of the texel encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SupercompressionScheme {
    #[default]
    None,
    BasisLz,
    Zstd,
    Zlib,
}

impl SupercompressionScheme {
    pub fn from_u32(value: u32) -> KtxResult<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::BasisLz),
            2 => Ok(Self::Zstd),
            3 => Ok(Self::Zlib),
            other => Err(KtxError::UnsupportedFeature(format!(
                "supercompression scheme {other}"
            ))),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::BasisLz => 1,
            Self::Zstd => 2,
            Self::Zlib => 3,
        }
    }
}

/// Fixed header fields following the identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ktx2Header {
    pub vk_format: u32,
    pub type_size: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub layer_count: u32,
    pub face_count: u32,
    pub level_count: u32,
    pub supercompression_scheme: u32,
    pub dfd_byte_offset: u32,
    pub dfd_byte_length: u32,
    pub kvd_byte_offset: u32,
    pub kvd_byte_length: u32,
    pub sgd_byte_offset: u64,
    pub sgd_byte_length: u64,
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

impl Ktx2Header {
    pub fn parse(bytes: &[u8; KTX2_HEADER_SIZE]) -> KtxResult<Self> {
        if bytes[..12] != KTX2_IDENTIFIER {
            return Err(KtxError::UnknownFileFormat);
        }
        Ok(Self {
            vk_format: le32(bytes, 12),
            type_size: le32(bytes, 16),
            pixel_width: le32(bytes, 20),
            pixel_height: le32(bytes, 24),
            pixel_depth: le32(bytes, 28),
            layer_count: le32(bytes, 32),
            face_count: le32(bytes, 36),
            level_count: le32(bytes, 40),
            supercompression_scheme: le32(bytes, 44),
            dfd_byte_offset: le32(bytes, 48),
            dfd_byte_length: le32(bytes, 52),
            kvd_byte_offset: le32(bytes, 56),
            kvd_byte_length: le32(bytes, 60),
            sgd_byte_offset: le64(bytes, 64),
            sgd_byte_length: le64(bytes, 72),
        })
    }

    pub fn to_bytes(&self) -> [u8; KTX2_HEADER_SIZE] {
        let mut out = [0u8; KTX2_HEADER_SIZE];
        out[..12].copy_from_slice(&KTX2_IDENTIFIER);
        let words = [
            self.vk_format,
            self.type_size,
            self.pixel_width,
            self.pixel_height,
            self.pixel_depth,
            self.layer_count,
            self.face_count,
            self.level_count,
            self.supercompression_scheme,
            self.dfd_byte_offset,
            self.dfd_byte_length,
            self.kvd_byte_offset,
            self.kvd_byte_length,
        ];
        for (i, w) in words.iter().enumerate() {
            out[12 + i * 4..16 + i * 4].copy_from_slice(&w.to_le_bytes());
        }
        out[64..72].copy_from_slice(&self.sgd_byte_offset.to_le_bytes());
        out[72..80].copy_from_slice(&self.sgd_byte_length.to_le_bytes());
        out
    }

    fn create_info(&self) -> KtxResult<TextureCreateInfo> {
        if self.pixel_depth > 0 && self.pixel_height == 0 {
            return Err(KtxError::data("3D texture with zero height"));
        }
        let num_dimensions = if self.pixel_depth > 0 {
            3
        } else if self.pixel_height > 0 {
            2
        } else {
            1
        };
        Ok(TextureCreateInfo {
            gl_internal_format: 0,
            vk_format: self.vk_format,
            base_width: self.pixel_width,
            base_height: self.pixel_height.max(1),
            base_depth: self.pixel_depth.max(1),
            num_dimensions,
            num_levels: self.level_count.max(1),
            num_layers: self.layer_count.max(1),
            num_faces: self.face_count,
            is_array: self.layer_count > 0,
            generate_mipmaps: self.level_count == 0,
        })
    }
}

/// Validate header geometry, reporting bad values as malformed file data
fn check_structure(info: &TextureCreateInfo, format: &FormatInfo) -> KtxResult<()> {
    info.validate(&format.size).map_err(|e| match e {
        KtxError::InvalidValue(msg) => KtxError::FileDataError(msg),
        other => other,
    })
}

/// Location of one level's stored bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelIndexEntry {
    pub byte_offset: u64,
    pub byte_length: u64,
    pub uncompressed_byte_length: u64,
}

type LevelIndex = SmallVec<[LevelIndexEntry; 16]>;

impl LevelIndexEntry {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            byte_offset: le64(bytes, 0),
            byte_length: le64(bytes, 8),
            uncompressed_byte_length: le64(bytes, 16),
        }
    }

    fn to_bytes(self) -> [u8; LEVEL_INDEX_ENTRY_SIZE] {
        let mut out = [0u8; LEVEL_INDEX_ENTRY_SIZE];
        out[0..8].copy_from_slice(&self.byte_offset.to_le_bytes());
        out[8..16].copy_from_slice(&self.byte_length.to_le_bytes());
        out[16..24].copy_from_slice(&self.uncompressed_byte_length.to_le_bytes());
        out
    }

    fn span(&self) -> std::ops::Range<usize> {
        let start = self.byte_offset as usize;
        start..start + self.byte_length as usize
    }
}

fn inflate(level: u32, stored: &[u8], dst: &mut [u8]) -> KtxResult<()> {
    let mut out = Vec::new();
    out.try_reserve_exact(dst.len())
        .map_err(|_| KtxError::OutOfMemory(dst.len()))?;
    ZlibDecoder::new(stored)
        .read_to_end(&mut out)
        .map_err(|e| KtxError::data(format!("level {level} failed to inflate: {e}")))?;
    if out.len() != dst.len() {
        return Err(KtxError::SizeMismatch {
            expected: dst.len(),
            actual: out.len(),
        });
    }
    dst.copy_from_slice(&out);
    Ok(())
}

fn deflate(data: &[u8]) -> KtxResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(KtxError::FileWriteError)?;
    encoder.finish().map_err(KtxError::FileWriteError)
}

/// Reads level data back from the source stream
#[derive(Debug, Clone)]
struct LevelSource {
    scheme: SupercompressionScheme,
    index: LevelIndex,
}

impl LevelSource {
    /// Read and decode `level` into `dst`, which must be one uncompressed level long
    fn read_level(&self, stream: &mut dyn Stream, level: u32, dst: &mut [u8]) -> KtxResult<()> {
        let entry = self.index[level as usize];
        stream.seek(SeekFrom::Start(entry.byte_offset))?;
        match self.scheme {
            SupercompressionScheme::None => stream.read(dst),
            SupercompressionScheme::Zlib => {
                let stored = stream.read_vec(entry.byte_length as usize)?;
                inflate(level, &stored, dst)
            }
            SupercompressionScheme::Zstd => {
                Err(KtxError::UnsupportedFeature("Zstd supercompression".into()))
            }
            SupercompressionScheme::BasisLz => Err(KtxError::InvalidOperation(
                "Basis LZ data must be transcoded before it can be addressed".into(),
            )),
        }
    }

    /// Read the stored bytes of every level back to back, smallest level
    /// first, returning their spans
    fn read_packed(
        &self,
        stream: &mut dyn Stream,
        order: impl Iterator<Item = u32>,
        dst: &mut [u8],
    ) -> KtxResult<LevelIndex> {
        let mut spans: LevelIndex =
            SmallVec::from_elem(LevelIndexEntry::default(), self.index.len());
        let mut cursor = 0usize;
        for level in order {
            let entry = self.index[level as usize];
            let len = entry.byte_length as usize;
            stream.seek(SeekFrom::Start(entry.byte_offset))?;
            stream.read(&mut dst[cursor..cursor + len])?;
            spans[level as usize] = LevelIndexEntry {
                byte_offset: cursor as u64,
                ..entry
            };
            cursor += len;
        }
        Ok(spans)
    }
}

/// Everything a transcoder needs to convert one level
#[derive(Debug)]
pub struct TranscodeRequest<'a> {
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Layers times faces
    pub num_images: u32,
    pub color_model: ColorModel,
    pub supercompression: SupercompressionScheme,
    /// Stored bytes of the level
    pub data: &'a [u8],
    /// Supercompression global data, empty when the scheme has none
    pub global_data: &'a [u8],
    pub target_format: &'a FormatInfo,
}

/// External codec turning Basis Universal payloads into GPU formats
pub trait Transcoder {
    /// Transcode one level; the result must hold every image of the level
    /// in the target format, laid out back to back
    fn transcode_level(&mut self, request: &TranscodeRequest<'_>) -> KtxResult<Vec<u8>>;
}

/// A KTX 2 texture
#[derive(Debug)]
pub struct Texture2 {
    base: TextureBase,
    vk_format: u32,
    type_size: u32,
    supercompression: SupercompressionScheme,
    dfd: DataFormatDescriptor,
    sgd: Vec<u8>,
    source: Option<LevelSource>,
    /// Spans of still-supercompressed level data inside the resident blob
    packed_levels: Option<LevelIndex>,
}

impl Texture2 {
    fn from_info(
        info: &TextureCreateInfo,
        format: FormatInfo,
        dfd: DataFormatDescriptor,
        supercompression: SupercompressionScheme,
    ) -> Self {
        let is_cubemap = info.num_faces == 6;
        let layout = ImageLayout::new(
            info.geometry(),
            format.size,
            LayoutRules::ktx2(&format.size, false),
        );
        Self {
            base: TextureBase {
                class_id: ClassId::Ktx2,
                format,
                layout,
                num_dimensions: info.num_dimensions,
                is_array: info.is_array,
                is_cubemap,
                generate_mipmaps: info.generate_mipmaps,
                orientation: Orientation::default(),
                kv: HashList::new(),
                kv_raw: None,
                data: None,
                data_size: layout.total_data_size(),
                stream: None,
                state: TextureState::Constructed,
            },
            vk_format: info.vk_format,
            type_size: format.type_size(),
            supercompression,
            dfd,
            sgd: Vec::new(),
            source: None,
            packed_levels: None,
        }
    }

    /// Create a texture from scratch
    pub fn create(info: &TextureCreateInfo, storage: TextureCreateStorage) -> KtxResult<Self> {
        let format = FormatInfo::from_vk_format(info.vk_format).ok_or_else(|| {
            KtxError::UnsupportedFeature(format!("Vulkan format {}", info.vk_format))
        })?;
        info.validate(&format.size)?;

        let dfd = DataFormatDescriptor::from_format(&format);
        let mut texture = Self::from_info(info, format, dfd, SupercompressionScheme::None);
        if storage == TextureCreateStorage::AllocStorage {
            texture.base.alloc_data()?;
        }
        log::debug!(
            "Created KTX 2 texture {}x{}x{}, {} levels, {} layers, {} faces, vkFormat {}",
            info.base_width,
            info.base_height,
            info.base_depth,
            info.num_levels,
            info.num_layers,
            info.num_faces,
            info.vk_format
        );
        Ok(texture)
    }

    /// Parse a texture from `stream`, taking ownership of it
    pub fn create_from_stream(
        mut stream: Box<dyn Stream>,
        flags: TextureCreateFlags,
    ) -> KtxResult<Self> {
        let mut bytes = [0u8; KTX2_HEADER_SIZE];
        stream.read(&mut bytes)?;
        let header = Ktx2Header::parse(&bytes)?;
        let scheme = SupercompressionScheme::from_u32(header.supercompression_scheme)?;
        let info = header.create_info()?;
        let known_format = if header.vk_format == vk::UNDEFINED {
            None
        } else {
            Some(FormatInfo::from_vk_format(header.vk_format).ok_or_else(|| {
                KtxError::UnsupportedFeature(format!("Vulkan format {}", header.vk_format))
            })?)
        };
        // Basis payloads use 4x4 blocks until the descriptor says otherwise
        check_structure(&info, &known_format.unwrap_or(FormatInfo::basis(16)))?;

        let level_count = info.num_levels as usize;
        let index_bytes = stream.read_vec(level_count * LEVEL_INDEX_ENTRY_SIZE)?;
        let index: LevelIndex = index_bytes
            .chunks_exact(LEVEL_INDEX_ENTRY_SIZE)
            .map(LevelIndexEntry::parse)
            .collect();

        if header.dfd_byte_length == 0 {
            return Err(KtxError::data("missing data format descriptor"));
        }
        stream.seek(SeekFrom::Start(header.dfd_byte_offset as u64))?;
        let dfd = DataFormatDescriptor::parse(&stream.read_vec(header.dfd_byte_length as usize)?)?;

        let format = match known_format {
            Some(format) => format,
            None => {
                let format = dfd.basis_format()?;
                check_structure(&info, &format)?;
                format
            }
        };

        let mut texture = Self::from_info(&info, format, dfd, scheme);
        texture.type_size = header.type_size;
        texture.validate_index(&index, stream.size()?)?;
        if scheme == SupercompressionScheme::BasisLz {
            texture.base.data_size = index.iter().map(|e| e.byte_length as usize).sum();
        }

        if header.kvd_byte_length > 0 {
            stream.seek(SeekFrom::Start(header.kvd_byte_offset as u64))?;
            if flags.contains(TextureCreateFlags::SKIP_KVDATA) {
                log::debug!("Skipping {} bytes of metadata", header.kvd_byte_length);
            } else {
                let raw = stream.read_vec(header.kvd_byte_length as usize)?;
                if flags.contains(TextureCreateFlags::RAW_KVDATA) {
                    texture.base.kv_raw = Some(raw);
                } else {
                    texture.base.kv = HashList::deserialize(&raw, false)?;
                }
            }
        }
        if let Some(value) = texture.base.kv.find_str(KTX_ORIENTATION_KEY) {
            match Orientation::parse_ktx2(value) {
                Some(orientation) => texture.base.orientation = orientation,
                None => log::warn!("Ignoring malformed KTXorientation {value:?}"),
            }
        }

        if header.sgd_byte_length > 0 {
            stream.seek(SeekFrom::Start(header.sgd_byte_offset))?;
            texture.sgd = stream.read_vec(header.sgd_byte_length as usize)?;
        }

        texture.source = Some(LevelSource { scheme, index });
        texture.base.stream = Some(stream);
        log::debug!(
            "Parsed KTX 2 header: {}x{}x{}, {} levels, {} layers, {} faces, {:?} supercompression",
            info.base_width,
            info.base_height,
            info.base_depth,
            info.num_levels,
            info.num_layers,
            info.num_faces,
            scheme
        );

        if flags.contains(TextureCreateFlags::LOAD_IMAGE_DATA) {
            texture.load_image_data()?;
        }
        Ok(texture)
    }

    /// Parse a texture from a copy of `bytes`
    pub fn create_from_memory(bytes: &[u8], flags: TextureCreateFlags) -> KtxResult<Self> {
        Self::create_from_stream(Box::new(MemStream::from_slice(bytes)?), flags)
    }

    /// Parse a texture from the file at `path`
    pub fn create_from_named_file(
        path: impl AsRef<Path>,
        flags: TextureCreateFlags,
    ) -> KtxResult<Self> {
        Self::create_from_stream(Box::new(FileStream::open(path)?), flags)
    }

    fn validate_index(&self, index: &LevelIndex, stream_size: u64) -> KtxResult<()> {
        let layout = &self.base.layout;
        for (level, entry) in index.iter().enumerate() {
            let end = entry.byte_offset.checked_add(entry.byte_length);
            if end.is_none_or(|end| end > stream_size) {
                return Err(KtxError::data(format!(
                    "level {level} data at {}+{} lies outside the file",
                    entry.byte_offset, entry.byte_length
                )));
            }
            let expected = layout.level_size(level as u32) as u64;
            let consistent = match self.supercompression {
                SupercompressionScheme::None => entry.byte_length == expected,
                SupercompressionScheme::Zlib | SupercompressionScheme::Zstd => {
                    entry.uncompressed_byte_length == expected
                }
                SupercompressionScheme::BasisLz => true,
            };
            if !consistent {
                return Err(KtxError::data(format!(
                    "level {level} length does not match its dimensions ({expected} bytes)"
                )));
            }
        }
        Ok(())
    }

    pub fn vk_format(&self) -> u32 {
        self.vk_format
    }

    pub fn type_size(&self) -> u32 {
        self.type_size
    }

    pub fn supercompression_scheme(&self) -> SupercompressionScheme {
        self.supercompression
    }

    /// Get the data format descriptor
    pub fn dfd(&self) -> &DataFormatDescriptor {
        &self.dfd
    }

    /// Get the supercompression global data
    pub fn supercompression_global_data(&self) -> &[u8] {
        &self.sgd
    }

    /// Level index read from the source file, if any
    pub fn level_index(&self) -> &[LevelIndexEntry] {
        self.source.as_ref().map(|s| s.index.as_slice()).unwrap_or(&[])
    }

    /// Deflate level data with zlib when the texture is written.
    ///
    /// Resident data stays uncompressed.
    pub fn set_zlib_supercompression(&mut self) -> KtxResult<()> {
        match self.supercompression {
            SupercompressionScheme::None | SupercompressionScheme::Zlib => {
                self.supercompression = SupercompressionScheme::Zlib;
                Ok(())
            }
            other => Err(KtxError::InvalidOperation(format!(
                "data already uses {other:?} supercompression"
            ))),
        }
    }

    fn require_addressable(&self) -> KtxResult<()> {
        if self.supercompression == SupercompressionScheme::BasisLz {
            return Err(KtxError::InvalidOperation(
                "Basis LZ data must be transcoded before it can be addressed".into(),
            ));
        }
        Ok(())
    }

    fn source(&self) -> KtxResult<LevelSource> {
        self.source
            .clone()
            .ok_or_else(|| KtxError::InvalidOperation("texture has no source stream".into()))
    }

    fn ensure_loaded(&mut self) -> KtxResult<()> {
        if self.base.data.is_some() {
            return Ok(());
        }
        if self.base.stream.is_none() {
            return Err(KtxError::InvalidOperation(
                "texture has neither image data nor a source stream".into(),
            ));
        }
        self.load_image_data()
    }

    /// Stored bytes of `level` in the resident data
    fn level_bytes(&self, level: u32) -> KtxResult<&[u8]> {
        let data = self
            .base
            .data
            .as_deref()
            .ok_or_else(|| KtxError::InvalidOperation("image data is not loaded".into()))?;
        let span = match &self.packed_levels {
            Some(packed) => {
                self.base.check_level(level)?;
                packed[level as usize].span()
            }
            None => self.base.layout.image_range(level, 0, WHOLE_LEVEL)?,
        };
        let len = data.len();
        data.get(span.clone()).ok_or(KtxError::SizeMismatch {
            expected: span.end,
            actual: len,
        })
    }

    /// Transcode a Basis Universal payload to `target_vk_format`.
    ///
    /// Every level the transcoder returns is checked against the size the
    /// target format requires; on success the texture describes the target
    /// format and is no longer supercompressed.
    pub fn transcode(
        &mut self,
        transcoder: &mut dyn Transcoder,
        target_vk_format: u32,
    ) -> KtxResult<()> {
        if !self.needs_transcoding() {
            return Err(KtxError::InvalidOperation(
                "texture does not need transcoding".into(),
            ));
        }
        let target = FormatInfo::from_vk_format(target_vk_format).ok_or_else(|| {
            KtxError::UnsupportedFeature(format!("Vulkan format {target_vk_format}"))
        })?;
        self.ensure_loaded()?;

        let geometry = *self.base.layout.geometry();
        let target_layout =
            ImageLayout::new(geometry, target.size, LayoutRules::ktx2(&target.size, false));
        let mut out = try_alloc(target_layout.total_data_size())?;
        for level in 0..geometry.num_levels {
            let (width, height, depth) = geometry.level_dimensions(level);
            let request = TranscodeRequest {
                level,
                width,
                height,
                depth,
                num_images: geometry.images_per_level(),
                color_model: self.dfd.color_model,
                supercompression: self.supercompression,
                data: self.level_bytes(level)?,
                global_data: &self.sgd,
                target_format: &target,
            };
            let transcoded = transcoder.transcode_level(&request)?;
            let range = target_layout.image_range(level, 0, WHOLE_LEVEL)?;
            if transcoded.len() != range.len() {
                return Err(KtxError::SizeMismatch {
                    expected: range.len(),
                    actual: transcoded.len(),
                });
            }
            out[range].copy_from_slice(&transcoded);
        }

        log::debug!(
            "Transcoded {:?} data to vkFormat {} ({} bytes)",
            self.dfd.color_model,
            target_vk_format,
            out.len()
        );
        self.base.format = target;
        self.base.layout = target_layout;
        self.base.data_size = out.len();
        self.base.data = Some(out);
        self.vk_format = target_vk_format;
        self.type_size = target.type_size();
        self.dfd = DataFormatDescriptor::from_format(&target);
        self.supercompression = SupercompressionScheme::None;
        self.sgd.clear();
        self.packed_levels = None;
        self.source = None;
        Ok(())
    }

    /// Bytes to store for each level, with their uncompressed lengths
    fn level_payloads(&self) -> KtxResult<Vec<(Vec<u8>, u64)>> {
        let layout = &self.base.layout;
        let mut payloads = Vec::with_capacity(layout.geometry().num_levels as usize);
        for level in 0..layout.geometry().num_levels {
            let bytes = self.level_bytes(level)?;
            let payload = match self.supercompression {
                SupercompressionScheme::None => (bytes.to_vec(), bytes.len() as u64),
                SupercompressionScheme::Zlib => (deflate(bytes)?, bytes.len() as u64),
                SupercompressionScheme::BasisLz => {
                    let uncompressed = self
                        .packed_levels
                        .as_ref()
                        .map_or(0, |p| p[level as usize].uncompressed_byte_length);
                    (bytes.to_vec(), uncompressed)
                }
                SupercompressionScheme::Zstd => {
                    return Err(KtxError::UnsupportedFeature("Zstd supercompression".into()));
                }
            };
            payloads.push(payload);
        }
        Ok(payloads)
    }

    fn metadata_bytes(&self, options: &WriteOptions) -> KtxResult<Vec<u8>> {
        if let (Some(raw), true) = (&self.base.kv_raw, self.base.kv.is_empty()) {
            return Ok(raw.clone());
        }
        let mut kv = self.base.kv_for_write()?;
        if let Some(writer) = &options.writer_id {
            if kv.find_value(KTX_WRITER_KEY).is_none() {
                let mut value = writer.as_bytes().to_vec();
                value.push(0);
                kv.add_kv_pair(KTX_WRITER_KEY, &value)?;
            }
        }
        kv.sort();
        Ok(kv.serialize(false))
    }
}

impl KtxTexture for Texture2 {
    fn base(&self) -> &TextureBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TextureBase {
        &mut self.base
    }

    fn data_size_uncompressed(&self) -> usize {
        self.base.layout.total_data_size()
    }

    fn needs_transcoding(&self) -> bool {
        self.dfd.color_model.is_basis()
    }

    fn image_offset(&self, level: u32, layer: u32, face_slice: FaceSlice) -> KtxResult<usize> {
        self.require_addressable()?;
        self.base.layout.image_offset(level, layer, face_slice)
    }

    fn iterate_levels(&self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        self.require_addressable()?;
        let data = self
            .base
            .data
            .as_deref()
            .ok_or_else(|| KtxError::InvalidOperation("image data is not loaded".into()))?;
        iterate::iterate_resident(&self.base.layout, data, visitor)
    }

    fn iterate_load_level_faces(&mut self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        self.require_addressable()?;
        if self.base.stream.is_none() && self.base.data.is_some() {
            return self.iterate_levels(visitor);
        }
        let source = self.source()?;
        let layout = self.base.layout;
        let stream = self.base.stream_mut()?;
        iterate::iterate_streamed(
            &layout,
            |level, buf| {
                let len = layout.level_size(level);
                buf.try_reserve(len).map_err(|_| KtxError::OutOfMemory(len))?;
                buf.resize(len, 0);
                source.read_level(&mut **stream, level, buf)
            },
            visitor,
        )
    }

    fn load_image_data_into(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        self.load_into(buf).map(|_| ())
    }

    fn load_image_data(&mut self) -> KtxResult<()> {
        if self.base.data.is_some() {
            return Err(KtxError::InvalidOperation("image data is already loaded".into()));
        }
        let mut data = try_alloc(self.base.data_size)?;
        self.packed_levels = self.load_into(&mut data)?;
        self.base.finish_load(data);
        Ok(())
    }

    fn write_to_stream_with(
        &mut self,
        dst: &mut dyn Stream,
        options: &WriteOptions,
    ) -> KtxResult<()> {
        self.ensure_loaded()?;

        let geometry = *self.base.layout.geometry();
        let payloads = self.level_payloads()?;
        let dfd = self.dfd.to_bytes();
        let kvd = self.metadata_bytes(options)?;

        let dfd_offset = KTX2_HEADER_SIZE + geometry.num_levels as usize * LEVEL_INDEX_ENTRY_SIZE;
        let kvd_offset = dfd_offset + dfd.len();
        let mut cursor = kvd_offset + kvd.len();
        let sgd_offset = if self.sgd.is_empty() {
            0
        } else {
            cursor = align_up(cursor, SGD_ALIGNMENT);
            let offset = cursor;
            cursor += self.sgd.len();
            offset
        };

        let alignment = match self.supercompression {
            SupercompressionScheme::None => self.base.layout.rules().level_alignment,
            _ => 1,
        };
        let mut index: LevelIndex =
            SmallVec::from_elem(LevelIndexEntry::default(), payloads.len());
        for level in self.base.layout.storage_order() {
            let (bytes, uncompressed) = &payloads[level as usize];
            cursor = align_up(cursor, alignment);
            index[level as usize] = LevelIndexEntry {
                byte_offset: cursor as u64,
                byte_length: bytes.len() as u64,
                uncompressed_byte_length: *uncompressed,
            };
            cursor += bytes.len();
        }

        let header = Ktx2Header {
            vk_format: self.vk_format,
            type_size: self.type_size,
            pixel_width: geometry.base_width,
            pixel_height: if self.base.num_dimensions > 1 { geometry.base_height } else { 0 },
            pixel_depth: if self.base.num_dimensions > 2 { geometry.base_depth } else { 0 },
            layer_count: if self.base.is_array { geometry.num_layers } else { 0 },
            face_count: geometry.num_faces,
            level_count: if self.base.generate_mipmaps { 0 } else { geometry.num_levels },
            supercompression_scheme: self.supercompression.as_u32(),
            dfd_byte_offset: dfd_offset as u32,
            dfd_byte_length: dfd.len() as u32,
            kvd_byte_offset: if kvd.is_empty() { 0 } else { kvd_offset as u32 },
            kvd_byte_length: kvd.len() as u32,
            sgd_byte_offset: sgd_offset as u64,
            sgd_byte_length: self.sgd.len() as u64,
        };

        let mut writer = PaddedWriter { dst, position: 0 };
        writer.write(&header.to_bytes())?;
        for entry in &index {
            writer.write(&entry.to_bytes())?;
        }
        writer.write(&dfd)?;
        writer.write(&kvd)?;
        if !self.sgd.is_empty() {
            writer.pad_to(sgd_offset)?;
            writer.write(&self.sgd)?;
        }
        for level in self.base.layout.storage_order() {
            writer.pad_to(index[level as usize].byte_offset as usize)?;
            writer.write(&payloads[level as usize].0)?;
        }
        log::debug!(
            "Wrote KTX 2 texture: {} bytes, {:?} supercompression",
            writer.position,
            self.supercompression
        );
        Ok(())
    }
}

impl Texture2 {
    /// Read every level from the source stream into `buf`, returning the
    /// packed level spans when the data stays supercompressed
    fn load_into(&mut self, buf: &mut [u8]) -> KtxResult<Option<LevelIndex>> {
        let needed = self.base.data_size;
        if buf.len() < needed {
            return Err(KtxError::SizeMismatch {
                expected: needed,
                actual: buf.len(),
            });
        }
        let source = self.source()?;
        let layout = self.base.layout;
        let stream = self.base.stream_mut()?;
        if source.scheme == SupercompressionScheme::BasisLz {
            return source
                .read_packed(&mut **stream, layout.storage_order(), buf)
                .map(Some);
        }
        for level in layout.storage_order() {
            let range = layout.image_range(level, 0, WHOLE_LEVEL)?;
            source.read_level(&mut **stream, level, &mut buf[range])?;
        }
        Ok(None)
    }
}

/// Tracks the output position so sections can be padded to their offsets
struct PaddedWriter<'a> {
    dst: &'a mut dyn Stream,
    position: usize,
}

impl PaddedWriter<'_> {
    fn write(&mut self, bytes: &[u8]) -> KtxResult<()> {
        self.dst.write(bytes)?;
        self.position += bytes.len();
        Ok(())
    }

    fn pad_to(&mut self, offset: usize) -> KtxResult<()> {
        const ZEROS: [u8; 16] = [0; 16];
        while self.position < offset {
            let n = (offset - self.position).min(ZEROS.len());
            self.write(&ZEROS[..n])?;
        }
        Ok(())
    }
}
