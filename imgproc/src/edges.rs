use image::GrayImage;
use rayon::prelude::*;

use crate::convolve::separable_convolve_signed;
use crate::{gaussian_blur_sigma, BorderMode, ImgprocError, Result};

fn sobel_kernels_1d(ksize: u32) -> Result<(Vec<f32>, Vec<f32>)> {
    match ksize {
        3 => Ok((vec![-1.0, 0.0, 1.0], vec![1.0, 2.0, 1.0])),
        5 => Ok((
            vec![-1.0, -2.0, 0.0, 2.0, 1.0],
            vec![1.0, 4.0, 6.0, 4.0, 1.0],
        )),
        7 => Ok((
            vec![-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0],
            vec![1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0],
        )),
        _ => Err(ImgprocError::InvalidParameters(format!(
            "sobel aperture must be 3, 5 or 7, got {ksize}"
        ))),
    }
}

fn scharr_kernels_1d() -> (Vec<f32>, Vec<f32>) {
    (vec![-1.0, 0.0, 1.0], vec![3.0, 10.0, 3.0])
}

/// |v| * scale + delta, clamped to u8. The derivative operators keep their
/// signed response until this final remap.
fn convert_scale_abs(signed: &[f32], width: u32, height: u32, scale: f32, delta: f32) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    out.as_mut()
        .par_iter_mut()
        .zip(signed.par_iter())
        .for_each(|(dst, &v)| {
            *dst = (v.abs() * scale + delta).clamp(0.0, 255.0) as u8;
        });
    out
}

fn directional_kernels(
    dx: i32,
    dy: i32,
    deriv: &[f32],
    smooth: &[f32],
) -> (Vec<f32>, Vec<f32>) {
    let kx = if dx > 0 { deriv } else { smooth };
    let ky = if dy > 0 { deriv } else { smooth };
    (kx.to_vec(), ky.to_vec())
}

pub fn sobel_ex(
    src: &GrayImage,
    dx: i32,
    dy: i32,
    ksize: u32,
    scale: f32,
    delta: f32,
    border: BorderMode,
) -> Result<GrayImage> {
    let (deriv, smooth) = sobel_kernels_1d(ksize)?;
    let (kx, ky) = directional_kernels(dx, dy, &deriv, &smooth);
    let signed = separable_convolve_signed(src, &kx, &ky, border);
    Ok(convert_scale_abs(
        &signed,
        src.width(),
        src.height(),
        scale,
        delta,
    ))
}

pub fn sobel(src: &GrayImage) -> Result<(GrayImage, GrayImage)> {
    let gx = sobel_ex(src, 1, 0, 3, 1.0, 0.0, BorderMode::Replicate)?;
    let gy = sobel_ex(src, 0, 1, 3, 1.0, 0.0, BorderMode::Replicate)?;
    Ok((gx, gy))
}

pub fn scharr_ex(
    src: &GrayImage,
    dx: i32,
    dy: i32,
    scale: f32,
    delta: f32,
    border: BorderMode,
) -> GrayImage {
    let (deriv, smooth) = scharr_kernels_1d();
    let (kx, ky) = directional_kernels(dx, dy, &deriv, &smooth);
    let signed = separable_convolve_signed(src, &kx, &ky, border);
    convert_scale_abs(&signed, src.width(), src.height(), scale, delta)
}

/// Euclidean gradient magnitude at the given aperture.
pub fn sobel_magnitude(src: &GrayImage, ksize: u32, border: BorderMode) -> Result<GrayImage> {
    let (deriv, smooth) = sobel_kernels_1d(ksize)?;
    let gx = separable_convolve_signed(src, &deriv, &smooth, border);
    let gy = separable_convolve_signed(src, &smooth, &deriv, border);

    let mut out = GrayImage::new(src.width(), src.height());
    out.as_mut()
        .par_iter_mut()
        .zip(gx.par_iter())
        .zip(gy.par_iter())
        .for_each(|((dst, &x), &y)| {
            *dst = (x * x + y * y).sqrt().min(255.0) as u8;
        });

    Ok(out)
}

/// Laplacian with aperture 1..=7 (odd), remapped through |v| * scale + delta.
/// Apertures above 3 smooth with the size-matched gaussian first.
pub fn laplacian_ex(
    src: &GrayImage,
    ksize: u32,
    scale: f32,
    delta: f32,
    border: BorderMode,
) -> Result<GrayImage> {
    if !matches!(ksize, 1 | 3 | 5 | 7) {
        return Err(ImgprocError::InvalidParameters(format!(
            "laplacian aperture must be 1, 3, 5 or 7, got {ksize}"
        )));
    }

    let smoothed;
    let input = if ksize > 3 {
        let sigma = crate::default_gaussian_sigma(ksize as usize);
        smoothed = gaussian_blur_sigma(src, sigma, border);
        &smoothed
    } else {
        src
    };

    let kernel = crate::laplacian_kernel();
    let signed = crate::convolve::convolve_signed(input, &kernel, border);
    Ok(convert_scale_abs(
        &signed,
        src.width(),
        src.height(),
        scale,
        delta,
    ))
}

pub fn laplacian(src: &GrayImage) -> GrayImage {
    // The aperture-3 path cannot fail.
    laplacian_ex(src, 3, 1.0, 0.0, BorderMode::Replicate)
        .unwrap_or_else(|_| GrayImage::new(src.width(), src.height()))
}

fn gradients_and_directions(
    src: &GrayImage,
    aperture: u32,
    l2_gradient: bool,
) -> Result<(Vec<f32>, Vec<u8>)> {
    let (deriv, smooth) = sobel_kernels_1d(aperture)?;
    let gx = separable_convolve_signed(src, &deriv, &smooth, BorderMode::Reflect101);
    let gy = separable_convolve_signed(src, &smooth, &deriv, BorderMode::Reflect101);

    let len = gx.len();
    let mut magnitude = vec![0.0f32; len];
    let mut direction = vec![0u8; len];

    magnitude
        .par_iter_mut()
        .zip(direction.par_iter_mut())
        .zip(gx.par_iter())
        .zip(gy.par_iter())
        .for_each(|(((mag, dir), &x), &y)| {
            *mag = if l2_gradient {
                (x * x + y * y).sqrt()
            } else {
                x.abs() + y.abs()
            };

            // Quantize the gradient direction into four bins:
            // 0 = horizontal, 1 = 45 degrees, 2 = vertical, 3 = 135 degrees.
            let abs_x = x.abs();
            let abs_y = y.abs();
            let tan_22_5 = 0.41421356f32;

            *dir = if abs_y <= abs_x * tan_22_5 {
                0
            } else if abs_x <= abs_y * tan_22_5 {
                2
            } else if x * y > 0.0 {
                1
            } else {
                3
            };
        });

    Ok((magnitude, direction))
}

fn non_max_suppression(width: usize, height: usize, mag: &[f32], dir: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];

    out.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, out_row)| {
            if y == 0 || y + 1 >= height {
                return;
            }
            let r0 = (y - 1) * width;
            let r1 = y * width;
            let r2 = (y + 1) * width;

            for x in 1..width.saturating_sub(1) {
                let m = mag[r1 + x];
                let (m1, m2) = match dir[r1 + x] {
                    0 => (mag[r1 + x - 1], mag[r1 + x + 1]),
                    1 => (mag[r0 + x + 1], mag[r2 + x - 1]),
                    2 => (mag[r0 + x], mag[r2 + x]),
                    _ => (mag[r0 + x - 1], mag[r2 + x + 1]),
                };

                if m >= m1 && m >= m2 {
                    out_row[x] = m;
                }
            }
        });

    out
}

fn hysteresis(width: usize, height: usize, nms: &[f32], low: f32, high: f32) -> GrayImage {
    const STRONG: u8 = 255;
    const WEAK: u8 = 75;

    let mut state = vec![0u8; width * height];
    let mut stack = Vec::new();

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let idx = y * width + x;
            let v = nms[idx];
            if v >= high {
                state[idx] = STRONG;
                stack.push((x, y));
            } else if v >= low {
                state[idx] = WEAK;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(height - 1);
        let x0 = x.saturating_sub(1);
        let x1 = (x + 1).min(width - 1);
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                let nidx = ny * width + nx;
                if state[nidx] == WEAK {
                    state[nidx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }

    let mut out = GrayImage::new(width as u32, height as u32);
    out.as_mut().par_iter_mut().enumerate().for_each(|(i, px)| {
        *px = if state[i] == STRONG { 255 } else { 0 };
    });
    out
}

/// Canny edge detector: gaussian pre-blur, aperture-selectable sobel
/// gradients, non-maximum suppression, double-threshold hysteresis.
/// An inverted threshold pair is tolerated (`high` is raised to `low`).
pub fn canny(
    src: &GrayImage,
    low_threshold: f32,
    high_threshold: f32,
    aperture: u32,
    l2_gradient: bool,
) -> Result<GrayImage> {
    let blurred = gaussian_blur_sigma(src, 1.0, BorderMode::Reflect101);
    let width = blurred.width() as usize;
    let height = blurred.height() as usize;

    let (mag, dir) = gradients_and_directions(&blurred, aperture, l2_gradient)?;
    let nms = non_max_suppression(width, height, &mag, &dir);

    let low = low_threshold.max(0.0);
    let high = high_threshold.max(low);
    Ok(hysteresis(width, height, &nms, low, high))
}
