//! Texture Object
//!
//! State shared by both container versions and the [`KtxTexture`]
//! capability interface through which every version-specific operation is
//! dispatched.

use std::path::Path;

use ktx_core::error::try_alloc;
use ktx_core::kvlist::{HashList, KTX_ORIENTATION_KEY};
use ktx_core::{
    ClassId, FaceSlice, FormatInfo, ImageLayout, KtxError, KtxResult, Orientation, WriteOptions,
};
use ktx_stream::{FileStream, MemStream, Stream};
use serde::{Deserialize, Serialize};

use crate::iterate;

/// Lifecycle state of a texture object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureState {
    /// Created or parsed; images may still be set
    Constructed,
    /// Image data has been bulk loaded from the source stream
    DataLoaded,
}

/// One image handed to an iteration visitor
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    pub level: u32,
    pub layer: u32,
    pub face: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Image bytes; only valid for the duration of the visit
    pub data: &'a [u8],
}

impl ImageView<'_> {
    /// Byte length of the image
    pub fn image_size(&self) -> usize {
        self.data.len()
    }
}

/// Visitor invoked once per image. Returning an error stops the iteration.
pub type ImageVisitor<'v> = dyn FnMut(&ImageView<'_>) -> KtxResult<()> + 'v;

/// Geometry, metadata and image storage common to both versions
pub struct TextureBase {
    pub(crate) class_id: ClassId,
    pub(crate) format: FormatInfo,
    pub(crate) layout: ImageLayout,
    pub(crate) num_dimensions: u32,
    pub(crate) is_array: bool,
    pub(crate) is_cubemap: bool,
    pub(crate) generate_mipmaps: bool,
    pub(crate) orientation: Orientation,
    pub(crate) kv: HashList,
    pub(crate) kv_raw: Option<Vec<u8>>,
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) data_size: usize,
    pub(crate) stream: Option<Box<dyn Stream>>,
    pub(crate) state: TextureState,
}

impl std::fmt::Debug for TextureBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureBase")
            .field("class_id", &self.class_id)
            .field("geometry", self.layout.geometry())
            .field("num_dimensions", &self.num_dimensions)
            .field("is_array", &self.is_array)
            .field("is_cubemap", &self.is_cubemap)
            .field("data_size", &self.data_size)
            .field("resident", &self.data.is_some())
            .field("streaming", &self.stream.is_some())
            .field("state", &self.state)
            .finish()
    }
}

impl TextureBase {
    pub(crate) fn image_size(&self, level: u32) -> KtxResult<usize> {
        self.check_level(level)?;
        Ok(self.layout.image_size(level))
    }

    pub(crate) fn check_level(&self, level: u32) -> KtxResult<()> {
        let levels = self.layout.geometry().num_levels;
        if level >= levels {
            return Err(KtxError::invalid_value(format!(
                "level {level} out of range ({levels} levels)"
            )));
        }
        Ok(())
    }

    /// Allocate a zeroed buffer covering the whole layout
    pub(crate) fn alloc_data(&mut self) -> KtxResult<()> {
        self.data = Some(try_alloc(self.layout.total_data_size())?);
        self.data_size = self.layout.total_data_size();
        Ok(())
    }

    pub(crate) fn require_settable(&self) -> KtxResult<()> {
        if self.state != TextureState::Constructed {
            return Err(KtxError::InvalidOperation(
                "images can only be set before data is loaded".into(),
            ));
        }
        if self.data.is_none() {
            return Err(KtxError::InvalidOperation(
                "texture has no image storage".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn stream_mut(&mut self) -> KtxResult<&mut Box<dyn Stream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| KtxError::InvalidOperation("texture has no source stream".into()))
    }

    /// Metadata as written: the list plus `KTXorientation` when the
    /// orientation is not the default and the list carries none
    pub(crate) fn kv_for_write(&self) -> KtxResult<HashList> {
        let mut kv = self.kv.clone();
        if self.orientation != Orientation::default()
            && kv.find_value(KTX_ORIENTATION_KEY).is_none()
        {
            let value = match self.class_id {
                ClassId::Ktx1 => self.orientation.to_ktx1_value(self.num_dimensions),
                ClassId::Ktx2 => self.orientation.to_ktx2_value(self.num_dimensions),
            };
            let mut value = value.into_bytes();
            value.push(0);
            kv.add_kv_pair(KTX_ORIENTATION_KEY, &value)?;
        }
        Ok(kv)
    }

    /// Mark data as loaded and release the source stream
    pub(crate) fn finish_load(&mut self, data: Vec<u8>) {
        log::debug!("Loaded {} bytes of image data", data.len());
        self.data_size = data.len();
        self.data = Some(data);
        self.stream = None;
        self.state = TextureState::DataLoaded;
    }
}

/// Operations every texture object supports, independent of its
/// container version.
///
/// Implementors provide access to their [`TextureBase`] and the
/// version-specific operations; geometry accessors and the in-memory
/// operations are shared.
pub trait KtxTexture {
    /// Shared state
    fn base(&self) -> &TextureBase;

    /// Shared state, mutably
    fn base_mut(&mut self) -> &mut TextureBase;

    /// Size of the image data with any supercompression removed
    fn data_size_uncompressed(&self) -> usize;

    /// Whether the image data must pass through a transcoder before upload
    fn needs_transcoding(&self) -> bool;

    /// Visit every image, reading each level from the source stream on demand
    fn iterate_load_level_faces(&mut self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()>;

    /// Read all image data from the source stream into `buf`
    fn load_image_data_into(&mut self, buf: &mut [u8]) -> KtxResult<()>;

    /// Read all image data from the source stream into the texture
    fn load_image_data(&mut self) -> KtxResult<()>;

    /// Serialize the complete container
    fn write_to_stream_with(
        &mut self,
        dst: &mut dyn Stream,
        options: &WriteOptions,
    ) -> KtxResult<()>;

    /// Get the class id
    fn class_id(&self) -> ClassId {
        self.base().class_id
    }

    /// Get the format descriptor
    fn format(&self) -> &FormatInfo {
        &self.base().format
    }

    /// Get the addressing layout
    fn layout(&self) -> &ImageLayout {
        &self.base().layout
    }

    fn base_width(&self) -> u32 {
        self.layout().geometry().base_width
    }

    fn base_height(&self) -> u32 {
        self.layout().geometry().base_height
    }

    fn base_depth(&self) -> u32 {
        self.layout().geometry().base_depth
    }

    fn num_dimensions(&self) -> u32 {
        self.base().num_dimensions
    }

    fn num_levels(&self) -> u32 {
        self.layout().geometry().num_levels
    }

    fn num_layers(&self) -> u32 {
        self.layout().geometry().num_layers
    }

    fn num_faces(&self) -> u32 {
        self.layout().geometry().num_faces
    }

    fn is_array(&self) -> bool {
        self.base().is_array
    }

    fn is_cubemap(&self) -> bool {
        self.base().is_cubemap
    }

    fn is_compressed(&self) -> bool {
        self.format().size.is_compressed()
    }

    fn generate_mipmaps(&self) -> bool {
        self.base().generate_mipmaps
    }

    fn orientation(&self) -> Orientation {
        self.base().orientation
    }

    /// Set the logical orientation, replacing any `KTXorientation` entry
    fn set_orientation(&mut self, orientation: Orientation) {
        let base = self.base_mut();
        base.orientation = orientation;
        base.kv.delete_kv_pair(KTX_ORIENTATION_KEY);
    }

    /// Get the lifecycle state
    fn state(&self) -> TextureState {
        self.base().state
    }

    /// Byte length of the image data held in memory or described by the header
    fn data_size(&self) -> usize {
        self.base().data_size
    }

    /// Get the resident image data, if loaded or allocated
    fn data(&self) -> Option<&[u8]> {
        self.base().data.as_deref()
    }

    /// Get the resident image data mutably
    fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.base_mut().data.as_deref_mut()
    }

    /// Get the key-value metadata
    fn kv_data(&self) -> &HashList {
        &self.base().kv
    }

    /// Get the key-value metadata mutably
    fn kv_data_mut(&mut self) -> &mut HashList {
        &mut self.base_mut().kv
    }

    /// Unparsed metadata block, when loaded with `RAW_KVDATA`
    fn kv_data_raw(&self) -> Option<&[u8]> {
        self.base().kv_raw.as_deref()
    }

    /// Size in bytes of one texel block
    fn element_size(&self) -> u32 {
        self.format().size.block_size_bytes()
    }

    /// Dimensions of `level`
    fn level_dimensions(&self, level: u32) -> KtxResult<(u32, u32, u32)> {
        self.base().check_level(level)?;
        Ok(self.layout().geometry().level_dimensions(level))
    }

    /// Bytes in one row of blocks at `level`, including row padding
    fn row_pitch(&self, level: u32) -> KtxResult<usize> {
        self.base().check_level(level)?;
        Ok(self.layout().row_bytes(level))
    }

    /// Byte length of one image at `level`
    fn image_size(&self, level: u32) -> KtxResult<usize> {
        self.base().image_size(level)
    }

    /// Offset of an image in the uncompressed data blob
    fn image_offset(&self, level: u32, layer: u32, face_slice: FaceSlice) -> KtxResult<usize> {
        self.layout().image_offset(level, layer, face_slice)
    }

    /// Visit every image of the resident data in level, layer, face order
    fn iterate_levels(&self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        let data = self.data().ok_or_else(|| {
            KtxError::InvalidOperation("image data is not loaded".into())
        })?;
        iterate::iterate_resident(self.layout(), data, visitor)
    }

    /// Copy one image from memory into the texture's storage
    fn set_image_from_memory(
        &mut self,
        level: u32,
        layer: u32,
        face_slice: FaceSlice,
        src: &[u8],
    ) -> KtxResult<()> {
        let base = self.base_mut();
        base.require_settable()?;
        let range = base.layout.image_range(level, layer, face_slice)?;
        if src.len() != range.len() {
            return Err(KtxError::SizeMismatch {
                expected: range.len(),
                actual: src.len(),
            });
        }
        let data = base.data.as_mut().ok_or_else(|| {
            KtxError::InvalidOperation("texture has no image storage".into())
        })?;
        data[range].copy_from_slice(src);
        Ok(())
    }

    /// Read one image of `src_size` bytes from `src` into the texture's storage
    fn set_image_from_stream(
        &mut self,
        level: u32,
        layer: u32,
        face_slice: FaceSlice,
        src: &mut dyn Stream,
        src_size: usize,
    ) -> KtxResult<()> {
        let base = self.base_mut();
        base.require_settable()?;
        let range = base.layout.image_range(level, layer, face_slice)?;
        if src_size != range.len() {
            return Err(KtxError::SizeMismatch {
                expected: range.len(),
                actual: src_size,
            });
        }
        let data = base.data.as_mut().ok_or_else(|| {
            KtxError::InvalidOperation("texture has no image storage".into())
        })?;
        src.read(&mut data[range])
    }

    /// Serialize the complete container with default options
    fn write_to_stream(&mut self, dst: &mut dyn Stream) -> KtxResult<()> {
        self.write_to_stream_with(dst, &WriteOptions::default())
    }

    /// Serialize the complete container into a new buffer
    fn write_to_memory(&mut self) -> KtxResult<Vec<u8>> {
        let mut stream = MemStream::new();
        self.write_to_stream(&mut stream)?;
        Ok(stream.into_inner())
    }

    /// Serialize the complete container to a file, creating or truncating it
    fn write_to_named_file(&mut self, path: &Path) -> KtxResult<()> {
        let mut stream = FileStream::create(path)?;
        self.write_to_stream(&mut stream)?;
        stream.flush()
    }

    /// Release the texture's image data, metadata and source stream
    fn destroy(self)
    where
        Self: Sized,
    {
        let base = self.base();
        log::debug!(
            "Destroying {:?} texture ({} bytes resident)",
            base.class_id,
            base.data.as_ref().map_or(0, Vec::len)
        );
    }
}
