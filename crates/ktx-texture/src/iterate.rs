//! Iteration Engine
//!
//! Walks levels in semantic order (base first) and, within a level, layers
//! then faces, handing each image to a visitor. The first visitor error
//! stops the walk and is returned to the caller.

use ktx_core::{ImageLayout, KtxError, KtxResult};

use crate::texture::{ImageView, ImageVisitor};

/// Visit every image of a fully resident data blob
pub(crate) fn iterate_resident(
    layout: &ImageLayout,
    data: &[u8],
    visitor: &mut ImageVisitor<'_>,
) -> KtxResult<()> {
    for level in 0..layout.geometry().num_levels {
        let start = layout.level_offset(level)?;
        let len = layout.level_size(level);
        let level_data = data.get(start..start + len).ok_or(KtxError::SizeMismatch {
            expected: start + len,
            actual: data.len(),
        })?;
        visit_level(layout, level, level_data, visitor)?;
    }
    Ok(())
}

/// Visit every image, obtaining each level's bytes from `fetch`.
///
/// `fetch` fills the buffer with exactly one level; the buffer is reused
/// between levels.
pub(crate) fn iterate_streamed<F>(
    layout: &ImageLayout,
    mut fetch: F,
    visitor: &mut ImageVisitor<'_>,
) -> KtxResult<()>
where
    F: FnMut(u32, &mut Vec<u8>) -> KtxResult<()>,
{
    let mut buffer = Vec::new();
    for level in 0..layout.geometry().num_levels {
        buffer.clear();
        fetch(level, &mut buffer)?;
        visit_level(layout, level, &buffer, visitor)?;
    }
    Ok(())
}

/// Visit the images of one level held in `level_data`
pub(crate) fn visit_level(
    layout: &ImageLayout,
    level: u32,
    level_data: &[u8],
    visitor: &mut ImageVisitor<'_>,
) -> KtxResult<()> {
    let geometry = layout.geometry();
    let (width, height, depth) = geometry.level_dimensions(level);
    let image_size = layout.image_size(level);
    if level_data.len() < layout.level_size(level) {
        return Err(KtxError::SizeMismatch {
            expected: layout.level_size(level),
            actual: level_data.len(),
        });
    }

    for layer in 0..geometry.num_layers {
        for face in 0..geometry.num_faces {
            let offset = (layer * geometry.num_faces + face) as usize * image_size;
            log::trace!(
                "Visiting level {level} layer {layer} face {face} ({width}x{height}x{depth}, {image_size} bytes)"
            );
            visitor(&ImageView {
                level,
                layer,
                face,
                width,
                height,
                depth,
                data: &level_data[offset..offset + image_size],
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ktx_core::format::{gl, FormatInfo};
    use ktx_core::{Geometry, LayoutRules};

    fn layout(levels: u32, layers: u32, faces: u32) -> ImageLayout {
        let format = FormatInfo::from_gl_internal_format(gl::RGBA8).unwrap().size;
        let geometry = Geometry {
            base_width: 4,
            base_height: 4,
            base_depth: 1,
            num_levels: levels,
            num_layers: layers,
            num_faces: faces,
        };
        ImageLayout::new(geometry, format, LayoutRules::ktx1(faces == 6, layers > 1))
    }

    #[test]
    fn test_visit_order() {
        let layout = layout(2, 2, 6);
        let data = vec![0u8; layout.total_data_size()];
        let mut seen = Vec::new();
        iterate_resident(&layout, &data, &mut |image: &ImageView<'_>| {
            seen.push((image.level, image.layer, image.face, image.image_size()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.len(), 2 * 2 * 6);
        assert_eq!(seen[0], (0, 0, 0, 64));
        assert_eq!(seen[5], (0, 0, 5, 64));
        assert_eq!(seen[6], (0, 1, 0, 64));
        assert_eq!(seen[12], (1, 0, 0, 16));
    }

    #[test]
    fn test_short_circuit() {
        let layout = layout(3, 1, 1);
        let data = vec![0u8; layout.total_data_size()];
        let mut calls = 0;
        let result = iterate_resident(&layout, &data, &mut |image: &ImageView<'_>| {
            calls += 1;
            if image.level == 1 {
                return Err(KtxError::invalid_value("stop"));
            }
            Ok(())
        });

        assert!(matches!(result, Err(KtxError::InvalidValue(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_streamed_matches_resident() {
        let layout = layout(3, 1, 1);
        let data: Vec<u8> = (0..layout.total_data_size()).map(|i| i as u8).collect();

        let mut resident = Vec::new();
        iterate_resident(&layout, &data, &mut |image: &ImageView<'_>| {
            resident.push(image.data.to_vec());
            Ok(())
        })
        .unwrap();

        let mut streamed = Vec::new();
        iterate_streamed(
            &layout,
            |level, buf| {
                let start = layout.level_offset(level)?;
                buf.extend_from_slice(&data[start..start + layout.level_size(level)]);
                Ok(())
            },
            &mut |image: &ImageView<'_>| {
                streamed.push(image.data.to_vec());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(resident, streamed);
    }

    #[test]
    fn test_short_level_rejected() {
        let layout = layout(1, 1, 1);
        let result = visit_level(&layout, 0, &[0u8; 10], &mut |_: &ImageView<'_>| Ok(()));
        assert!(matches!(result, Err(KtxError::SizeMismatch { expected: 64, actual: 10 })));
    }
}
