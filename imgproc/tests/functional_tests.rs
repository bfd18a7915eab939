use cvlab_imgproc::*;
use image::{GrayImage, Luma};

fn gradient_image(w: u32, h: u32) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.put_pixel(x, y, Luma([((x * 255) / w.max(1)) as u8]));
        }
    }
    img
}

#[test]
fn blur_then_threshold_keeps_split() {
    let img = gradient_image(64, 64);

    let blurred = gaussian_blur(&img, 5, 1.2, 1.2, BorderMode::Reflect101).unwrap();
    let out = threshold(&blurred, 127, 255, ThresholdType::Binary);

    assert_eq!(out.get_pixel(2, 32)[0], 0);
    assert_eq!(out.get_pixel(61, 32)[0], 255);
    assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
}

#[test]
fn morphology_open_removes_speckle_that_blur_only_softens() {
    let mut img = GrayImage::new(21, 21);
    img.put_pixel(10, 10, Luma([255]));

    let kernel = create_morph_kernel(MorphShape::Rectangle, 3, 3);
    let opened = morph(
        &img,
        MorphType::Open,
        &kernel,
        1,
        BorderMode::Constant(0),
    );
    assert!(opened.as_raw().iter().all(|&v| v == 0));

    let blurred = gaussian_blur(&img, 3, 1.0, 1.0, BorderMode::Reflect101).unwrap();
    assert!(blurred.as_raw().iter().any(|&v| v > 0));
}

#[test]
fn canny_after_equalization_still_finds_edge() {
    // Low-contrast step: equalization amplifies it before edge detection.
    let mut img = GrayImage::new(32, 32);
    for y in 0..32 {
        for x in 0..32 {
            let val = if x < 16 { 100u8 } else { 118u8 };
            img.put_pixel(x, y, Luma([val]));
        }
    }

    let stretched = histogram_equalization(&img);
    let edges = canny(&stretched, 50.0, 150.0, 3, false).unwrap();
    assert!((0..32).any(|x| edges.get_pixel(x, 16)[0] == 255));
}

#[test]
fn otsu_matches_manual_threshold_on_bimodal_input() {
    let mut img = GrayImage::new(10, 10);
    for y in 0..10 {
        for x in 0..10 {
            let val = if (x + y) % 2 == 0 { 40u8 } else { 210u8 };
            img.put_pixel(x, y, Luma([val]));
        }
    }

    let (t, auto) = threshold_otsu(&img, 255, ThresholdType::Binary);
    let manual = threshold(&img, t, 255, ThresholdType::Binary);
    assert_eq!(auto.as_raw(), manual.as_raw());
}

#[test]
fn unsharp_pipeline_sharpens_blurred_edge() {
    let img = gradient_image(32, 8);
    let blurred = gaussian_blur(&img, 5, 2.0, 2.0, BorderMode::Reflect101).unwrap();
    let sharp = unsharp_mask(&blurred, &gaussian_blur_sigma(&blurred, 1.5, BorderMode::Reflect101), 1.5, 0).unwrap();

    // Sharpening widens the local value range of the soft gradient.
    let range = |i: &GrayImage| {
        i.as_raw().iter().copied().max().unwrap() - i.as_raw().iter().copied().min().unwrap()
    };
    assert!(range(&sharp) >= range(&blurred));
}
