//! Image Addressing
//!
//! Maps a (level, layer, face-slice) coordinate to a byte range inside the
//! packed image data of a texture:
//! - Per-level image sizes for linear and block-compressed formats
//! - Row, cube-face and level alignment supplied as [`LayoutRules`]
//! - Ascending (KTX 1) or descending (KTX 2) level storage order
//!
//! Every function here is pure; nothing touches image bytes.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{KtxError, KtxResult};
use crate::format::FormatSize;

/// Order in which mip levels are laid out in the data blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelOrder {
    /// Base level first
    Ascending,
    /// Smallest level first
    Descending,
}

/// Alignment and ordering parameters of an image data layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRules {
    /// Alignment of each row of an uncompressed image
    pub row_alignment: u32,
    /// Alignment applied to each face image (KTX 1 cube padding)
    pub cube_face_alignment: u32,
    /// Alignment of the start of each level within the blob
    pub level_alignment: u32,
    /// Storage order of levels
    pub level_order: LevelOrder,
}

impl LayoutRules {
    /// Rules of the KTX 1 container.
    ///
    /// Rows are padded to `GL_UNPACK_ALIGNMENT` (4), faces of non-array
    /// cubemaps and whole levels are padded to 4 bytes.
    pub fn ktx1(is_cubemap: bool, is_array: bool) -> Self {
        Self {
            row_alignment: 4,
            cube_face_alignment: if is_cubemap && !is_array { 4 } else { 1 },
            level_alignment: 4,
            level_order: LevelOrder::Ascending,
        }
    }

    /// Rules of the KTX 2 container.
    ///
    /// Rows are tightly packed; each level starts on a multiple of
    /// `lcm(block size, 4)` unless the data is supercompressed.
    pub fn ktx2(format: &FormatSize, supercompressed: bool) -> Self {
        Self {
            row_alignment: 1,
            cube_face_alignment: 1,
            level_alignment: if supercompressed {
                1
            } else {
                lcm4(format.block_size_bytes())
            },
            level_order: LevelOrder::Descending,
        }
    }
}

/// Face-slice selector of an image address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceSlice {
    /// A single face (or the only image of a non-cubemap layer)
    Index(u32),
    /// The whole level as one contiguous span
    WholeLevel,
}

/// Address the whole level
pub const WHOLE_LEVEL: FaceSlice = FaceSlice::WholeLevel;

impl From<u32> for FaceSlice {
    fn from(value: u32) -> Self {
        if value == u32::MAX {
            Self::WholeLevel
        } else {
            Self::Index(value)
        }
    }
}

/// Level, layer and face counts plus base dimensions of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub base_depth: u32,
    pub num_levels: u32,
    pub num_layers: u32,
    pub num_faces: u32,
}

impl Geometry {
    /// Dimensions of `level`, never less than one texel per axis
    pub fn level_dimensions(&self, level: u32) -> (u32, u32, u32) {
        (
            shift_dim(self.base_width, level),
            shift_dim(self.base_height, level),
            shift_dim(self.base_depth, level),
        )
    }

    /// Number of images (layer x face) at every level
    pub fn images_per_level(&self) -> u32 {
        self.num_layers * self.num_faces
    }
}

fn shift_dim(dim: u32, level: u32) -> u32 {
    dim.checked_shr(level).unwrap_or(0).max(1)
}

/// Round `value` up to a multiple of `alignment`
pub fn align_up(value: usize, alignment: u32) -> usize {
    let alignment = alignment.max(1) as usize;
    value.div_ceil(alignment) * alignment
}

/// Least common multiple of `value` and 4
pub fn lcm4(value: u32) -> u32 {
    match value {
        0 => 4,
        v if v % 4 == 0 => v,
        v if v % 2 == 0 => v * 2,
        v => v * 4,
    }
}

/// Addressing calculus over one texture's geometry, format and layout rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    geometry: Geometry,
    format: FormatSize,
    rules: LayoutRules,
}

impl ImageLayout {
    /// Create a layout
    pub fn new(geometry: Geometry, format: FormatSize, rules: LayoutRules) -> Self {
        Self {
            geometry,
            format,
            rules,
        }
    }

    /// Get the geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Get the format size
    pub fn format(&self) -> &FormatSize {
        &self.format
    }

    /// Get the layout rules
    pub fn rules(&self) -> &LayoutRules {
        &self.rules
    }

    fn block_counts(&self, level: u32) -> (usize, usize, usize) {
        let (w, h, d) = self.geometry.level_dimensions(level);
        let f = &self.format;
        let x = w.div_ceil(f.block_width.max(1)).max(f.min_blocks_x);
        let y = h.div_ceil(f.block_height.max(1)).max(f.min_blocks_y);
        let z = d.div_ceil(f.block_depth.max(1)).max(1);
        (x as usize, y as usize, z as usize)
    }

    /// Bytes in one row of blocks at `level`, including row padding
    pub fn row_bytes(&self, level: u32) -> usize {
        let (x, _, _) = self.block_counts(level);
        let bytes = x * self.format.block_size_bytes() as usize;
        if self.format.is_compressed() {
            bytes
        } else {
            align_up(bytes, self.rules.row_alignment)
        }
    }

    /// Byte length of one (layer, face) image at `level`
    pub fn image_size(&self, level: u32) -> usize {
        let (_, y, z) = self.block_counts(level);
        align_up(self.row_bytes(level) * y * z, self.rules.cube_face_alignment)
    }

    /// Byte length of all layers and faces of `level`, without level padding
    pub fn level_size(&self, level: u32) -> usize {
        self.image_size(level) * self.geometry.images_per_level() as usize
    }

    /// Levels in the order they are stored
    pub fn storage_order(&self) -> impl Iterator<Item = u32> {
        let n = self.geometry.num_levels;
        let descending = self.rules.level_order == LevelOrder::Descending;
        (0..n).map(move |i| if descending { n - 1 - i } else { i })
    }

    fn check_level(&self, level: u32) -> KtxResult<()> {
        if level >= self.geometry.num_levels {
            return Err(KtxError::InvalidValue(format!(
                "level {} out of range ({} levels)",
                level, self.geometry.num_levels
            )));
        }
        Ok(())
    }

    /// Offset of the start of `level` in the data blob
    pub fn level_offset(&self, level: u32) -> KtxResult<usize> {
        self.check_level(level)?;
        let mut offset = 0;
        for l in self.storage_order() {
            offset = align_up(offset, self.rules.level_alignment);
            if l == level {
                break;
            }
            offset += self.level_size(l);
        }
        Ok(offset)
    }

    /// Offset of one image, or of the whole level for [`FaceSlice::WholeLevel`]
    pub fn image_offset(&self, level: u32, layer: u32, face_slice: FaceSlice) -> KtxResult<usize> {
        self.check_level(level)?;
        if layer >= self.geometry.num_layers {
            return Err(KtxError::InvalidValue(format!(
                "layer {} out of range ({} layers)",
                layer, self.geometry.num_layers
            )));
        }
        let level_offset = self.level_offset(level)?;
        match face_slice {
            FaceSlice::WholeLevel => Ok(level_offset),
            FaceSlice::Index(face) if face >= self.geometry.num_faces => {
                Err(KtxError::InvalidValue(format!(
                    "face {} out of range ({} faces)",
                    face, self.geometry.num_faces
                )))
            }
            FaceSlice::Index(face) => {
                let index = (layer * self.geometry.num_faces + face) as usize;
                Ok(level_offset + index * self.image_size(level))
            }
        }
    }

    /// Byte range of one image, or of the whole level
    pub fn image_range(
        &self,
        level: u32,
        layer: u32,
        face_slice: FaceSlice,
    ) -> KtxResult<Range<usize>> {
        let start = self.image_offset(level, layer, face_slice)?;
        let len = match face_slice {
            FaceSlice::WholeLevel => self.level_size(level),
            FaceSlice::Index(_) => self.image_size(level),
        };
        Ok(start..start + len)
    }

    /// Total byte length of the image data blob
    pub fn total_data_size(&self) -> usize {
        let mut end = 0;
        for l in self.storage_order() {
            end = align_up(end, self.rules.level_alignment) + self.level_size(l);
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{gl, FormatInfo};

    fn rgba8() -> FormatSize {
        FormatInfo::from_gl_internal_format(gl::RGBA8).unwrap().size
    }

    fn geometry(w: u32, h: u32, levels: u32, layers: u32, faces: u32) -> Geometry {
        Geometry {
            base_width: w,
            base_height: h,
            base_depth: 1,
            num_levels: levels,
            num_layers: layers,
            num_faces: faces,
        }
    }

    #[test]
    fn test_mip_chain_ascending() {
        let layout = ImageLayout::new(geometry(4, 4, 3, 1, 1), rgba8(), LayoutRules::ktx1(false, false));

        assert_eq!(layout.image_size(0), 64);
        assert_eq!(layout.image_size(1), 16);
        assert_eq!(layout.image_size(2), 4);
        assert_eq!(layout.total_data_size(), 84);
        assert_eq!(layout.image_offset(1, 0, FaceSlice::Index(0)).unwrap(), 64);
        assert_eq!(layout.image_offset(2, 0, FaceSlice::Index(0)).unwrap(), 80);
    }

    #[test]
    fn test_mip_chain_descending() {
        let layout = ImageLayout::new(geometry(4, 4, 3, 1, 1), rgba8(), LayoutRules::ktx2(&rgba8(), false));

        assert_eq!(layout.level_offset(2).unwrap(), 0);
        assert_eq!(layout.level_offset(1).unwrap(), 4);
        assert_eq!(layout.level_offset(0).unwrap(), 20);
        assert_eq!(layout.total_data_size(), 84);
        assert_eq!(layout.storage_order().collect::<Vec<_>>(), vec![2, 1, 0]);
    }

    #[test]
    fn test_cubemap_faces() {
        let layout = ImageLayout::new(geometry(8, 8, 1, 1, 6), rgba8(), LayoutRules::ktx1(true, false));
        let s = layout.image_size(0);

        assert_eq!(s, 256);
        assert_eq!(layout.image_offset(0, 0, FaceSlice::Index(3)).unwrap(), 3 * s);
        assert_eq!(layout.image_offset(0, 0, WHOLE_LEVEL).unwrap(), 0);
        assert_eq!(layout.image_range(0, 0, WHOLE_LEVEL).unwrap(), 0..6 * s);
    }

    #[test]
    fn test_array_layers() {
        let layout = ImageLayout::new(geometry(2, 2, 2, 3, 1), rgba8(), LayoutRules::ktx1(false, true));

        // level 0: 3 x 16 bytes, level 1: 3 x 4 bytes
        assert_eq!(layout.level_size(0), 48);
        assert_eq!(layout.image_offset(0, 2, FaceSlice::Index(0)).unwrap(), 32);
        assert_eq!(layout.image_offset(1, 1, FaceSlice::Index(0)).unwrap(), 52);
        assert_eq!(layout.total_data_size(), 60);
    }

    #[test]
    fn test_row_padding() {
        let rgb8 = FormatInfo::from_gl_internal_format(gl::RGB8).unwrap().size;
        let geom = geometry(3, 2, 1, 1, 1);

        let ktx1 = ImageLayout::new(geom, rgb8, LayoutRules::ktx1(false, false));
        assert_eq!(ktx1.row_bytes(0), 12);
        assert_eq!(ktx1.image_size(0), 24);

        let ktx2 = ImageLayout::new(geom, rgb8, LayoutRules::ktx2(&rgb8, false));
        assert_eq!(ktx2.row_bytes(0), 9);
        assert_eq!(ktx2.image_size(0), 18);
        assert_eq!(ktx2.rules().level_alignment, 12);
    }

    #[test]
    fn test_block_compressed_minimum_one_block() {
        let bc1 = FormatInfo::from_gl_internal_format(gl::COMPRESSED_RGB_S3TC_DXT1).unwrap().size;
        let layout = ImageLayout::new(geometry(16, 16, 5, 1, 1), bc1, LayoutRules::ktx1(false, false));

        assert_eq!(layout.image_size(0), 4 * 4 * 8);
        assert_eq!(layout.image_size(1), 2 * 2 * 8);
        assert_eq!(layout.image_size(2), 8);
        assert_eq!(layout.image_size(3), 8);
        assert_eq!(layout.image_size(4), 8);
    }

    #[test]
    fn test_non_square_levels() {
        let layout = ImageLayout::new(geometry(8, 2, 4, 1, 1), rgba8(), LayoutRules::ktx1(false, false));
        assert_eq!(layout.geometry().level_dimensions(3), (1, 1, 1));
        assert_eq!(layout.image_size(2), 2 * 4);
    }

    #[test]
    fn test_out_of_range() {
        let layout = ImageLayout::new(geometry(4, 4, 3, 1, 1), rgba8(), LayoutRules::ktx1(false, false));

        assert!(matches!(layout.image_offset(3, 0, FaceSlice::Index(0)), Err(KtxError::InvalidValue(_))));
        assert!(matches!(layout.image_offset(0, 1, FaceSlice::Index(0)), Err(KtxError::InvalidValue(_))));
        assert!(matches!(layout.image_offset(0, 0, FaceSlice::Index(1)), Err(KtxError::InvalidValue(_))));
        assert!(layout.level_offset(3).is_err());
    }

    #[test]
    fn test_face_slice_from_u32() {
        assert_eq!(FaceSlice::from(2), FaceSlice::Index(2));
        assert_eq!(FaceSlice::from(u32::MAX), WHOLE_LEVEL);
    }

    #[test]
    fn test_lcm4() {
        assert_eq!(lcm4(1), 4);
        assert_eq!(lcm4(2), 4);
        assert_eq!(lcm4(3), 12);
        assert_eq!(lcm4(6), 12);
        assert_eq!(lcm4(8), 8);
        assert_eq!(lcm4(16), 16);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn layouts() -> impl Strategy<Value = ImageLayout> {
            (1u32..=64, 1u32..=64, 1u32..=4, any::<bool>(), any::<bool>(), 0usize..3).prop_map(
                |(w, h, layers, cube, ktx2, fmt)| {
                    let format = [gl::RGBA8, gl::RGB8, gl::COMPRESSED_RGBA_S3TC_DXT5][fmt];
                    let format = FormatInfo::from_gl_internal_format(format).unwrap().size;
                    let size = if cube { w } else { h };
                    let max_levels = 32 - w.max(size).leading_zeros();
                    let geom = geometry(w, size, max_levels, layers, if cube { 6 } else { 1 });
                    let rules = if ktx2 {
                        LayoutRules::ktx2(&format, false)
                    } else {
                        LayoutRules::ktx1(cube, layers > 1)
                    };
                    ImageLayout::new(geom, format, rules)
                },
            )
        }

        proptest! {
            #[test]
            fn test_images_fit_in_blob(layout in layouts()) {
                let g = *layout.geometry();
                let total = layout.total_data_size();
                for level in 0..g.num_levels {
                    for layer in 0..g.num_layers {
                        for face in 0..g.num_faces {
                            let offset = layout.image_offset(level, layer, FaceSlice::Index(face))?;
                            prop_assert!(offset + layout.image_size(level) <= total);
                        }
                    }
                }
            }

            #[test]
            fn test_levels_do_not_overlap(layout in layouts()) {
                let mut ranges: Vec<_> = (0..layout.geometry().num_levels)
                    .map(|l| layout.image_range(l, 0, WHOLE_LEVEL).unwrap())
                    .collect();
                ranges.sort_by_key(|r| r.start);
                for pair in ranges.windows(2) {
                    prop_assert!(pair[0].end <= pair[1].start);
                }
            }

            #[test]
            fn test_level_alignment_honoured(layout in layouts()) {
                let alignment = layout.rules().level_alignment as usize;
                for level in 0..layout.geometry().num_levels {
                    prop_assert_eq!(layout.level_offset(level)? % alignment, 0);
                }
            }
        }
    }
}
