//! KTX 1 Container
//!
//! Header codec, loading, streaming iteration and writing for `«KTX 11»`
//! files. Image data on the wire is prefixed per level by an `imageSize`
//! word and padded to 4 bytes; the in-memory blob omits the prefixes.

use std::path::Path;

use ktx_core::addressing::align_up;
use ktx_core::error::try_alloc;
use ktx_core::kvlist::{HashList, KTX_ORIENTATION_KEY};
use ktx_core::{
    ClassId, FormatInfo, ImageLayout, KtxError, KtxResult, LayoutRules, Orientation,
    TextureCreateFlags, TextureCreateInfo, TextureCreateStorage, WriteOptions,
};
use ktx_stream::{FileStream, MemStream, SeekFrom, Stream};
use serde::{Deserialize, Serialize};

use crate::iterate;
use crate::texture::{ImageVisitor, KtxTexture, TextureBase, TextureState};

/// File identifier of a KTX 1 container
pub const KTX1_IDENTIFIER: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x31, 0x31, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

/// Size of the fixed header, identifier included
pub const KTX1_HEADER_SIZE: usize = 64;

const ENDIANNESS: u32 = 0x0403_0201;

/// Fixed header fields following the identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ktx1Header {
    pub gl_type: u32,
    pub gl_type_size: u32,
    pub gl_format: u32,
    pub gl_internal_format: u32,
    pub gl_base_internal_format: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub pixel_depth: u32,
    pub number_of_array_elements: u32,
    pub number_of_faces: u32,
    pub number_of_mipmap_levels: u32,
    pub bytes_of_key_value_data: u32,
}

impl Ktx1Header {
    /// Parse a header, returning it and whether the file is big endian
    pub fn parse(bytes: &[u8; KTX1_HEADER_SIZE]) -> KtxResult<(Self, bool)> {
        if bytes[..12] != KTX1_IDENTIFIER {
            return Err(KtxError::UnknownFileFormat);
        }
        let marker = [bytes[12], bytes[13], bytes[14], bytes[15]];
        let big_endian = match u32::from_le_bytes(marker) {
            ENDIANNESS => false,
            e if e == ENDIANNESS.swap_bytes() => true,
            e => {
                return Err(KtxError::data(format!("invalid endianness marker {e:#010x}")));
            }
        };

        let mut words = [0u32; 12];
        for (i, w) in words.iter_mut().enumerate() {
            let at = 16 + i * 4;
            let raw = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
            *w = if big_endian {
                u32::from_be_bytes(raw)
            } else {
                u32::from_le_bytes(raw)
            };
        }
        let [
            gl_type,
            gl_type_size,
            gl_format,
            gl_internal_format,
            gl_base_internal_format,
            pixel_width,
            pixel_height,
            pixel_depth,
            number_of_array_elements,
            number_of_faces,
            number_of_mipmap_levels,
            bytes_of_key_value_data,
        ] = words;

        let header = Self {
            gl_type,
            gl_type_size,
            gl_format,
            gl_internal_format,
            gl_base_internal_format,
            pixel_width,
            pixel_height,
            pixel_depth,
            number_of_array_elements,
            number_of_faces,
            number_of_mipmap_levels,
            bytes_of_key_value_data,
        };
        Ok((header, big_endian))
    }

    /// Serialize in host byte order
    pub fn to_bytes(&self) -> [u8; KTX1_HEADER_SIZE] {
        let words = [
            ENDIANNESS,
            self.gl_type,
            self.gl_type_size,
            self.gl_format,
            self.gl_internal_format,
            self.gl_base_internal_format,
            self.pixel_width,
            self.pixel_height,
            self.pixel_depth,
            self.number_of_array_elements,
            self.number_of_faces,
            self.number_of_mipmap_levels,
            self.bytes_of_key_value_data,
        ];
        let mut out = [0u8; KTX1_HEADER_SIZE];
        out[..12].copy_from_slice(&KTX1_IDENTIFIER);
        for (i, w) in words.iter().enumerate() {
            out[12 + i * 4..16 + i * 4].copy_from_slice(&w.to_ne_bytes());
        }
        out
    }

    /// Validate the header and translate it into create parameters
    fn create_info(&self) -> KtxResult<TextureCreateInfo> {
        if !matches!(self.gl_type_size, 1 | 2 | 4) {
            return Err(KtxError::data(format!(
                "glTypeSize {} must be 1, 2 or 4",
                self.gl_type_size
            )));
        }
        if (self.gl_format == 0) != (self.gl_type == 0) {
            return Err(KtxError::data(
                "glFormat and glType must both be zero for compressed data",
            ));
        }
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
            gl_internal_format: self.gl_internal_format,
            vk_format: 0,
            base_width: self.pixel_width,
            base_height: self.pixel_height.max(1),
            base_depth: self.pixel_depth.max(1),
            num_dimensions,
            num_levels: self.number_of_mipmap_levels.max(1),
            num_layers: self.number_of_array_elements.max(1),
            num_faces: self.number_of_faces,
            is_array: self.number_of_array_elements > 0,
            generate_mipmaps: self.number_of_mipmap_levels == 0,
        })
    }
}

/// Swap each `type_size`-byte component of `data` in place
fn swap_endian(data: &mut [u8], type_size: u32) {
    match type_size {
        2 => data.chunks_exact_mut(2).for_each(|c| c.swap(0, 1)),
        4 => data.chunks_exact_mut(4).for_each(<[u8]>::reverse),
        _ => {}
    }
}

/// Wire-format parameters needed to read level data back from a stream
#[derive(Debug, Clone, Copy)]
struct LevelReader {
    data_offset: u64,
    big_endian: bool,
    swap_data: bool,
    type_size: u32,
    face_sized: bool,
}

impl LevelReader {
    fn read_word(&self, stream: &mut dyn Stream) -> KtxResult<u32> {
        let mut raw = [0u8; 4];
        stream.read(&mut raw)?;
        Ok(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    /// Read the level at the stream position into `dst`, which must be
    /// exactly one level long
    fn read_level(
        &self,
        stream: &mut dyn Stream,
        layout: &ImageLayout,
        level: u32,
        dst: &mut [u8],
    ) -> KtxResult<()> {
        let image_size = self.read_word(stream)? as usize;
        let consistent = if self.face_sized {
            align_up(image_size, layout.rules().cube_face_alignment) == layout.image_size(level)
        } else {
            image_size == layout.level_size(level)
        };
        if !consistent {
            return Err(KtxError::data(format!(
                "level {level} imageSize {image_size} does not match its dimensions"
            )));
        }

        stream.read(dst)?;
        if self.swap_data {
            swap_endian(dst, self.type_size);
        }
        let padding = align_up(dst.len(), layout.rules().level_alignment) - dst.len();
        if padding > 0 && level + 1 < layout.geometry().num_levels {
            stream.skip(padding as u64)?;
        }
        Ok(())
    }
}

/// A KTX 1 texture
#[derive(Debug)]
pub struct Texture1 {
    base: TextureBase,
    gl_format: u32,
    gl_internal_format: u32,
    gl_base_internal_format: u32,
    gl_type: u32,
    gl_type_size: u32,
    reader: Option<LevelReader>,
}

impl Texture1 {
    fn from_info(
        info: &TextureCreateInfo,
        format: FormatInfo,
        transfer: ktx_core::GlTransfer,
    ) -> Self {
        let is_cubemap = info.num_faces == 6;
        let layout = ImageLayout::new(
            info.geometry(),
            format.size,
            LayoutRules::ktx1(is_cubemap, info.is_array),
        );
        Self {
            base: TextureBase {
                class_id: ClassId::Ktx1,
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
            gl_format: transfer.format,
            gl_internal_format: info.gl_internal_format,
            gl_base_internal_format: transfer.base_internal_format,
            gl_type: transfer.type_,
            gl_type_size: transfer.type_size,
            reader: None,
        }
    }

    fn lookup_format(gl_internal_format: u32) -> KtxResult<FormatInfo> {
        FormatInfo::from_gl_internal_format(gl_internal_format).ok_or_else(|| {
            KtxError::UnsupportedFeature(format!("GL internal format {gl_internal_format:#06x}"))
        })
    }

    /// Create a texture from scratch
    pub fn create(info: &TextureCreateInfo, storage: TextureCreateStorage) -> KtxResult<Self> {
        let format = Self::lookup_format(info.gl_internal_format)?;
        info.validate(&format.size)?;
        let transfer = format.gl_transfer(info.gl_internal_format);

        let mut texture = Self::from_info(info, format, transfer);
        if storage == TextureCreateStorage::AllocStorage {
            texture.base.alloc_data()?;
        }
        log::debug!(
            "Created KTX 1 texture {}x{}x{}, {} levels, {} layers, {} faces",
            info.base_width,
            info.base_height,
            info.base_depth,
            info.num_levels,
            info.num_layers,
            info.num_faces
        );
        Ok(texture)
    }

    /// Parse a texture from `stream`, taking ownership of it
    pub fn create_from_stream(
        mut stream: Box<dyn Stream>,
        flags: TextureCreateFlags,
    ) -> KtxResult<Self> {
        let mut bytes = [0u8; KTX1_HEADER_SIZE];
        stream.read(&mut bytes)?;
        let (header, big_endian) = Ktx1Header::parse(&bytes)?;
        if big_endian != cfg!(target_endian = "big") {
            log::warn!("KTX 1 data has reversed endianness; swapping on read");
        }

        let info = header.create_info()?;
        let format = Self::lookup_format(info.gl_internal_format)?;
        if (header.gl_type == 0) != format.size.is_compressed() {
            return Err(KtxError::data(format!(
                "glType {:#06x} inconsistent with internal format {:#06x}",
                header.gl_type, header.gl_internal_format
            )));
        }
        info.validate(&format.size).map_err(|e| match e {
            KtxError::InvalidValue(msg) => KtxError::FileDataError(msg),
            other => other,
        })?;

        let transfer = ktx_core::GlTransfer {
            format: header.gl_format,
            type_: header.gl_type,
            type_size: header.gl_type_size,
            base_internal_format: header.gl_base_internal_format,
        };
        let mut texture = Self::from_info(&info, format, transfer);

        let kv_len = header.bytes_of_key_value_data as u64;
        if flags.contains(TextureCreateFlags::SKIP_KVDATA) {
            stream.skip(kv_len)?;
        } else {
            let raw = stream.read_vec(kv_len as usize)?;
            if flags.contains(TextureCreateFlags::RAW_KVDATA) {
                texture.base.kv_raw = Some(raw);
            } else {
                texture.base.kv = HashList::deserialize(&raw, big_endian)?;
            }
        }
        if let Some(value) = texture.base.kv.find_str(KTX_ORIENTATION_KEY) {
            match Orientation::parse_ktx1(value) {
                Some(orientation) => texture.base.orientation = orientation,
                None => log::warn!("Ignoring malformed KTXorientation {value:?}"),
            }
        }

        texture.reader = Some(LevelReader {
            data_offset: stream.tell()?,
            big_endian,
            swap_data: big_endian != cfg!(target_endian = "big"),
            type_size: header.gl_type_size,
            face_sized: texture.base.is_cubemap && !texture.base.is_array,
        });
        texture.base.stream = Some(stream);
        log::debug!(
            "Parsed KTX 1 header: {}x{}x{}, {} levels, {} layers, {} faces, {} data bytes",
            info.base_width,
            info.base_height,
            info.base_depth,
            info.num_levels,
            info.num_layers,
            info.num_faces,
            texture.base.data_size
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

    pub fn gl_format(&self) -> u32 {
        self.gl_format
    }

    pub fn gl_internal_format(&self) -> u32 {
        self.gl_internal_format
    }

    pub fn gl_base_internal_format(&self) -> u32 {
        self.gl_base_internal_format
    }

    pub fn gl_type(&self) -> u32 {
        self.gl_type
    }

    pub fn gl_type_size(&self) -> u32 {
        self.gl_type_size
    }

    /// Whether the source data was stored in the opposite byte order
    pub fn needs_endian_swap(&self) -> bool {
        self.reader.is_some_and(|r| r.swap_data)
    }

    fn reader(&self) -> KtxResult<LevelReader> {
        self.reader
            .ok_or_else(|| KtxError::InvalidOperation("texture has no source stream".into()))
    }

    fn header(&self, kv_len: usize) -> Ktx1Header {
        let geometry = self.base.layout.geometry();
        Ktx1Header {
            gl_type: self.gl_type,
            gl_type_size: self.gl_type_size,
            gl_format: self.gl_format,
            gl_internal_format: self.gl_internal_format,
            gl_base_internal_format: self.gl_base_internal_format,
            pixel_width: geometry.base_width,
            pixel_height: if self.base.num_dimensions > 1 { geometry.base_height } else { 0 },
            pixel_depth: if self.base.num_dimensions > 2 { geometry.base_depth } else { 0 },
            number_of_array_elements: if self.base.is_array { geometry.num_layers } else { 0 },
            number_of_faces: geometry.num_faces,
            number_of_mipmap_levels: if self.base.generate_mipmaps { 0 } else { geometry.num_levels },
            bytes_of_key_value_data: kv_len as u32,
        }
    }
}

impl KtxTexture for Texture1 {
    fn base(&self) -> &TextureBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TextureBase {
        &mut self.base
    }

    fn data_size_uncompressed(&self) -> usize {
        self.base.data_size
    }

    fn needs_transcoding(&self) -> bool {
        false
    }

    fn iterate_load_level_faces(&mut self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        if self.base.stream.is_none() && self.base.data.is_some() {
            return self.iterate_levels(visitor);
        }
        let reader = self.reader()?;
        let layout = self.base.layout;
        let stream = self.base.stream_mut()?;
        stream.seek(SeekFrom::Start(reader.data_offset))?;
        iterate::iterate_streamed(
            &layout,
            |level, buf| {
                let len = layout.level_size(level);
                buf.try_reserve(len).map_err(|_| KtxError::OutOfMemory(len))?;
                buf.resize(len, 0);
                reader.read_level(&mut **stream, &layout, level, buf)
            },
            visitor,
        )
    }

    fn load_image_data_into(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        let layout = self.base.layout;
        let total = layout.total_data_size();
        if buf.len() < total {
            return Err(KtxError::SizeMismatch {
                expected: total,
                actual: buf.len(),
            });
        }
        let reader = self.reader()?;
        let stream = self.base.stream_mut()?;
        stream.seek(SeekFrom::Start(reader.data_offset))?;
        for level in layout.storage_order() {
            let start = layout.level_offset(level)?;
            let dst = &mut buf[start..start + layout.level_size(level)];
            reader.read_level(&mut **stream, &layout, level, dst)?;
        }
        Ok(())
    }

    fn load_image_data(&mut self) -> KtxResult<()> {
        if self.base.data.is_some() {
            return Err(KtxError::InvalidOperation("image data is already loaded".into()));
        }
        let mut data = try_alloc(self.base.layout.total_data_size())?;
        self.load_image_data_into(&mut data)?;
        self.base.finish_load(data);
        Ok(())
    }

    fn write_to_stream_with(
        &mut self,
        dst: &mut dyn Stream,
        _options: &WriteOptions,
    ) -> KtxResult<()> {
        if self.base.data.is_none() {
            if self.base.stream.is_none() {
                return Err(KtxError::InvalidOperation(
                    "texture has neither image data nor a source stream".into(),
                ));
            }
            self.load_image_data()?;
        }

        let big_endian = cfg!(target_endian = "big");
        let kv = match (&self.base.kv_raw, self.base.kv.is_empty()) {
            (Some(raw), true) => raw.clone(),
            _ => self.base.kv_for_write()?.serialize(big_endian),
        };
        dst.write(&self.header(kv.len()).to_bytes())?;
        dst.write(&kv)?;

        let layout = self.base.layout;
        let face_sized = self.base.is_cubemap && !self.base.is_array;
        let data = self
            .base
            .data
            .as_deref()
            .ok_or_else(|| KtxError::InvalidOperation("image data is not loaded".into()))?;
        let padding = [0u8; 4];
        let mut written = 0;
        for level in layout.storage_order() {
            let start = layout.level_offset(level)?;
            let len = layout.level_size(level);
            let image_size = if face_sized { layout.image_size(level) } else { len };
            dst.write(&(image_size as u32).to_ne_bytes())?;
            dst.write(&data[start..start + len])?;
            let pad = align_up(len, layout.rules().level_alignment) - len;
            dst.write(&padding[..pad])?;
            written += 4 + len + pad;
        }
        log::debug!(
            "Wrote KTX 1 texture: {} metadata bytes, {} image bytes",
            kv.len(),
            written
        );
        Ok(())
    }
}
