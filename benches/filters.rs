use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cvlab::imgproc::{canny, gaussian_blur, nl_means_denoise, threshold, BorderMode, ThresholdType};
use image::{GrayImage, Luma};

fn test_image(size: u32) -> GrayImage {
    let mut img = GrayImage::new(size, size);
    for y in 0..size {
        for x in 0..size {
            img.put_pixel(x, y, Luma([((x * 7 + y * 13) % 256) as u8]));
        }
    }
    img
}

fn bench_filters(c: &mut Criterion) {
    let img = test_image(512);

    c.bench_function("gaussian_blur_512_k5", |b| {
        b.iter(|| gaussian_blur(black_box(&img), 5, 1.2, 1.2, BorderMode::Reflect101).unwrap())
    });

    c.bench_function("canny_512", |b| {
        b.iter(|| canny(black_box(&img), 50.0, 150.0, 3, false).unwrap())
    });

    c.bench_function("threshold_512_binary", |b| {
        b.iter(|| threshold(black_box(&img), 127, 255, ThresholdType::Binary))
    });

    let small = test_image(96);
    c.bench_function("nl_means_96", |b| {
        b.iter(|| nl_means_denoise(black_box(&small), 10.0, 3, 9).unwrap())
    });
}

criterion_group!(benches, bench_filters);
criterion_main!(benches);
