//! Version Dispatch
//!
//! [`Texture`] holds either container version and forwards every
//! [`KtxTexture`] operation to it. Opening a stream sniffs the identifier
//! to pick the version.

use std::path::Path;

use ktx_core::{
    ClassId, FaceSlice, KtxError, KtxResult, TextureCreateFlags, TextureCreateInfo,
    TextureCreateStorage, WriteOptions,
};
use ktx_stream::{FileStream, MemStream, SeekFrom, Stream};

use crate::ktx1::{KTX1_IDENTIFIER, Texture1};
use crate::ktx2::{KTX2_IDENTIFIER, Texture2};
use crate::texture::{ImageVisitor, KtxTexture, TextureBase};

/// A texture of either container version
#[derive(Debug)]
pub enum Texture {
    V1(Texture1),
    V2(Texture2),
}

macro_rules! dispatch {
    ($self:expr, $t:ident => $body:expr) => {
        match $self {
            Texture::V1($t) => $body,
            Texture::V2($t) => $body,
        }
    };
}

impl Texture {
    /// Create a texture of version `class_id` from scratch
    pub fn create(
        info: &TextureCreateInfo,
        storage: TextureCreateStorage,
        class_id: ClassId,
    ) -> KtxResult<Self> {
        match class_id {
            ClassId::Ktx1 => Texture1::create(info, storage).map(Self::V1),
            ClassId::Ktx2 => Texture2::create(info, storage).map(Self::V2),
        }
    }

    /// Parse a texture of either version from `stream`
    pub fn create_from_stream(
        mut stream: Box<dyn Stream>,
        flags: TextureCreateFlags,
    ) -> KtxResult<Self> {
        let mut identifier = [0u8; 12];
        stream.read(&mut identifier).map_err(|e| match e {
            KtxError::UnexpectedEndOfData { .. } => KtxError::UnknownFileFormat,
            other => other,
        })?;
        stream.seek(SeekFrom::Start(0))?;

        if identifier == KTX1_IDENTIFIER {
            Texture1::create_from_stream(stream, flags).map(Self::V1)
        } else if identifier == KTX2_IDENTIFIER {
            Texture2::create_from_stream(stream, flags).map(Self::V2)
        } else {
            log::debug!("Unrecognised identifier {identifier:02x?}");
            Err(KtxError::UnknownFileFormat)
        }
    }

    /// Parse a texture of either version from a copy of `bytes`
    pub fn create_from_memory(bytes: &[u8], flags: TextureCreateFlags) -> KtxResult<Self> {
        Self::create_from_stream(Box::new(MemStream::from_slice(bytes)?), flags)
    }

    /// Parse a texture of either version from the file at `path`
    pub fn create_from_named_file(
        path: impl AsRef<Path>,
        flags: TextureCreateFlags,
    ) -> KtxResult<Self> {
        Self::create_from_stream(Box::new(FileStream::open(path)?), flags)
    }

    pub fn as_ktx1(&self) -> Option<&Texture1> {
        match self {
            Self::V1(t) => Some(t),
            Self::V2(_) => None,
        }
    }

    pub fn as_ktx2(&self) -> Option<&Texture2> {
        match self {
            Self::V1(_) => None,
            Self::V2(t) => Some(t),
        }
    }

    pub fn as_ktx2_mut(&mut self) -> Option<&mut Texture2> {
        match self {
            Self::V1(_) => None,
            Self::V2(t) => Some(t),
        }
    }
}

impl From<Texture1> for Texture {
    fn from(texture: Texture1) -> Self {
        Self::V1(texture)
    }
}

impl From<Texture2> for Texture {
    fn from(texture: Texture2) -> Self {
        Self::V2(texture)
    }
}

impl KtxTexture for Texture {
    fn base(&self) -> &TextureBase {
        dispatch!(self, t => t.base())
    }

    fn base_mut(&mut self) -> &mut TextureBase {
        dispatch!(self, t => t.base_mut())
    }

    fn data_size_uncompressed(&self) -> usize {
        dispatch!(self, t => t.data_size_uncompressed())
    }

    fn needs_transcoding(&self) -> bool {
        dispatch!(self, t => t.needs_transcoding())
    }

    fn image_offset(&self, level: u32, layer: u32, face_slice: FaceSlice) -> KtxResult<usize> {
        dispatch!(self, t => t.image_offset(level, layer, face_slice))
    }

    fn iterate_levels(&self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        dispatch!(self, t => t.iterate_levels(visitor))
    }

    fn iterate_load_level_faces(&mut self, visitor: &mut ImageVisitor<'_>) -> KtxResult<()> {
        dispatch!(self, t => t.iterate_load_level_faces(visitor))
    }

    fn load_image_data_into(&mut self, buf: &mut [u8]) -> KtxResult<()> {
        dispatch!(self, t => t.load_image_data_into(buf))
    }

    fn load_image_data(&mut self) -> KtxResult<()> {
        dispatch!(self, t => t.load_image_data())
    }

    fn write_to_stream_with(
        &mut self,
        dst: &mut dyn Stream,
        options: &WriteOptions,
    ) -> KtxResult<()> {
        dispatch!(self, t => t.write_to_stream_with(dst, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ktx_core::format::{gl, vk};

    fn create(class_id: ClassId) -> Texture {
        let info = TextureCreateInfo {
            gl_internal_format: gl::RGBA8,
            vk_format: vk::R8G8B8A8_UNORM,
            base_width: 4,
            base_height: 4,
            num_levels: 3,
            ..Default::default()
        };
        Texture::create(&info, TextureCreateStorage::AllocStorage, class_id).unwrap()
    }

    #[test]
    fn test_sniffs_version() {
        for class_id in [ClassId::Ktx1, ClassId::Ktx2] {
            let bytes = create(class_id).write_to_memory().unwrap();
            let texture = Texture::create_from_memory(&bytes, TextureCreateFlags::empty()).unwrap();
            assert_eq!(texture.class_id(), class_id);
            assert_eq!(texture.as_ktx1().is_some(), class_id == ClassId::Ktx1);
            assert_eq!(texture.as_ktx2().is_some(), class_id == ClassId::Ktx2);
        }
    }

    #[test]
    fn test_version_specific_offsets() {
        // KTX 1 stores the base level first, KTX 2 stores it last
        let v1 = create(ClassId::Ktx1);
        let v2 = create(ClassId::Ktx2);
        assert_eq!(v1.image_offset(0, 0, FaceSlice::Index(0)).unwrap(), 0);
        assert_eq!(v2.image_offset(0, 0, FaceSlice::Index(0)).unwrap(), 20);
        assert_eq!(v1.data_size(), v2.data_size());
    }

    #[test]
    fn test_unknown_identifier() {
        assert!(matches!(
            Texture::create_from_memory(b"not a texture file", TextureCreateFlags::empty()),
            Err(KtxError::UnknownFileFormat)
        ));
        assert!(matches!(
            Texture::create_from_memory(b"short", TextureCreateFlags::empty()),
            Err(KtxError::UnknownFileFormat)
        ));
    }
}
