//! Addressing Benchmarks
//!
//! Offset calculation, resident iteration and container round trips

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ktx_core::format::{gl, vk};
use ktx_core::{ClassId, FaceSlice, TextureCreateFlags, TextureCreateInfo, TextureCreateStorage};
use ktx_texture::{ImageView, KtxTexture, Texture};

fn info(size: u32, faces: u32) -> TextureCreateInfo {
    TextureCreateInfo {
        gl_internal_format: gl::RGBA8,
        vk_format: vk::R8G8B8A8_UNORM,
        base_width: size,
        base_height: size,
        num_levels: 32 - size.leading_zeros(),
        num_faces: faces,
        ..Default::default()
    }
}

fn texture(size: u32, faces: u32, class_id: ClassId) -> Texture {
    Texture::create(&info(size, faces), TextureCreateStorage::AllocStorage, class_id)
        .expect("valid create info")
}

fn bench_image_offset(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_offset");

    for class_id in [ClassId::Ktx1, ClassId::Ktx2] {
        let texture = texture(1024, 6, class_id);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{class_id:?}")),
            &texture,
            |b, texture| {
                b.iter(|| {
                    let mut sum = 0usize;
                    for level in 0..texture.num_levels() {
                        for face in 0..6 {
                            sum += texture
                                .image_offset(level, 0, FaceSlice::Index(face))
                                .unwrap_or(0);
                        }
                    }
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

fn bench_iterate_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate_levels");

    for size in [64, 256, 1024] {
        let texture = texture(size, 1, ClassId::Ktx2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &texture, |b, texture| {
            b.iter(|| {
                let mut bytes = 0usize;
                texture
                    .iterate_levels(&mut |image: &ImageView<'_>| {
                        bytes += image.image_size();
                        Ok(())
                    })
                    .expect("resident data");
                black_box(bytes)
            });
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_trip");

    for class_id in [ClassId::Ktx1, ClassId::Ktx2] {
        let bytes = texture(256, 1, class_id)
            .write_to_memory()
            .expect("writable texture");
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{class_id:?}")),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let mut texture =
                        Texture::create_from_memory(bytes, TextureCreateFlags::LOAD_IMAGE_DATA)
                            .expect("valid container");
                    black_box(texture.write_to_memory().expect("writable texture"))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_image_offset, bench_iterate_levels, bench_round_trip);
criterion_main!(benches);
