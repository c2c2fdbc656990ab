use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sixel_codec::{sixel_encode, sixel_encode_indexed_to_vec, EncodeOptions, IndexedImage};
use std::hint::black_box;

fn generate_gradient_rgba(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let r = ((x * 255) / width.max(1)) as u8;
            let g = ((y * 255) / height.max(1)) as u8;
            let b = 128;
            pixels.push(r);
            pixels.push(g);
            pixels.push(b);
            pixels.push(255); // Alpha
        }
    }
    pixels
}

/// Indexed test card: vertical stripes of `colors` entries with a diagonal.
fn generate_indexed(width: usize, height: usize, colors: usize) -> (Vec<u8>, Vec<u8>) {
    let pixels = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                if x == y {
                    0
                } else {
                    ((x * colors / width) % colors) as u8
                }
            })
        })
        .collect();
    let palette = (0..colors)
        .flat_map(|i| {
            let v = (i * 255 / colors.max(1)) as u8;
            [v, 255 - v, v / 2]
        })
        .collect();
    (pixels, palette)
}

fn bench_encode_indexed(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_indexed_600x450");

    for colors in [2usize, 16, 256] {
        let (pixels, palette) = generate_indexed(600, 450, colors);
        let image = IndexedImage::new(&pixels, 600, 450, &palette).expect("valid image");
        let opts = EncodeOptions::default();

        group.bench_with_input(BenchmarkId::from_parameter(colors), &image, |b, image| {
            b.iter(|| {
                let result = sixel_encode_indexed_to_vec(black_box(image), &opts);
                assert!(result.is_ok());
                result
            })
        });
    }

    group.finish();
}

fn bench_encode_small(c: &mut Criterion) {
    let rgba = generate_gradient_rgba(64, 64);
    let opts = EncodeOptions::default();

    c.bench_function("encode_gradient_64x64", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgba), 64, 64, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_encode_medium(c: &mut Criterion) {
    let rgba = generate_gradient_rgba(200, 200);
    let opts = EncodeOptions::default();

    c.bench_function("encode_gradient_200x200", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgba), 200, 200, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

fn bench_encode_few_colors(c: &mut Criterion) {
    let rgba = generate_gradient_rgba(200, 200);
    let opts = EncodeOptions {
        max_colors: 16,
        ..Default::default()
    };

    c.bench_function("encode_gradient_200x200_16_colors", |b| {
        b.iter(|| {
            let result = sixel_encode(black_box(&rgba), 200, 200, &opts);
            assert!(result.is_ok());
            result
        })
    });
}

criterion_group!(
    benches,
    bench_encode_indexed,
    bench_encode_small,
    bench_encode_medium,
    bench_encode_few_colors,
);
criterion_main!(benches);
