//! # KTX Texture
//!
//! Texture objects for KTX 1 and KTX 2 containers.
//!
//! This crate provides:
//! - **Texture objects**: Create, load, inspect, modify and write textures
//! - **Iteration**: Per-image visitors over resident or streamed data
//! - **KTX 1**: GL-typed containers with endianness conversion
//! - **KTX 2**: Vulkan-typed containers with data format descriptors,
//!   zlib supercompression and Basis Universal transcoding hooks

pub mod dfd;
pub mod dispatch;
mod iterate;
pub mod ktx1;
pub mod ktx2;
pub mod texture;

pub use dfd::{ColorModel, DataFormatDescriptor, Sample};
pub use dispatch::Texture;
pub use ktx1::{Ktx1Header, Texture1};
pub use ktx2::{
    Ktx2Header, LevelIndexEntry, SupercompressionScheme, Texture2, TranscodeRequest, Transcoder,
};
pub use texture::{ImageView, ImageVisitor, KtxTexture, TextureBase, TextureState};
