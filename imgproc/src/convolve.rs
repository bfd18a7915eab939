use image::GrayImage;
use rayon::prelude::*;

use crate::{ensure_odd, ensure_same_dimensions, Result};

#[derive(Debug, Clone)]
pub struct Kernel {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Kernel {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_slice(data: &[f32], width: usize, height: usize) -> Self {
        Self::new(data.to_vec(), width, height)
    }

    pub fn center(&self) -> (isize, isize) {
        ((self.width / 2) as isize, (self.height / 2) as isize)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderMode {
    Constant(u8),
    Replicate,
    Reflect,
    Reflect101,
    Wrap,
}

pub(crate) fn map_coord(coord: isize, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Replicate => Some(coord.clamp(0, n - 1) as usize),
        BorderMode::Wrap => {
            let mut c = coord % n;
            if c < 0 {
                c += n;
            }
            Some(c as usize)
        }
        BorderMode::Reflect => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c - 1;
            }
            Some(c as usize)
        }
        BorderMode::Reflect101 => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n - 2;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c;
            }
            Some(c as usize)
        }
    }
}

fn border_fill(mode: BorderMode) -> f32 {
    match mode {
        BorderMode::Constant(v) => v as f32,
        _ => 0.0,
    }
}

pub fn box_kernel(size: usize) -> Kernel {
    let value = 1.0 / (size * size) as f32;
    Kernel::new(vec![value; size * size], size, size)
}

pub fn laplacian_kernel() -> Kernel {
    Kernel::from_slice(&[0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0], 3, 3)
}

pub fn gaussian_kernel_1d(sigma: f32, size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "gaussian kernel size must be odd");
    let mut kernel = Vec::with_capacity(size);
    let center = (size / 2) as isize;
    let sigma2 = sigma * sigma;
    let mut sum = 0.0f32;

    for i in 0..size {
        let x = (i as isize - center) as f32;
        let v = (-(x * x) / (2.0 * sigma2)).exp();
        kernel.push(v);
        sum += v;
    }

    if sum != 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }

    kernel
}

/// Sigma implied by a kernel size when the caller passes sigma <= 0,
/// matching the usual vision-library convention.
pub fn default_gaussian_sigma(ksize: usize) -> f32 {
    0.3 * (((ksize as f32) - 1.0) * 0.5 - 1.0) + 0.8
}

/// Kernel size implied by a sigma: covers +/- 3 sigma, forced odd.
pub fn kernel_size_for_sigma(sigma: f32) -> usize {
    (((sigma * 6.0).ceil() as usize) | 1).max(3)
}

pub fn convolve(image: &GrayImage, kernel: &Kernel) -> GrayImage {
    convolve_with_border(image, kernel, BorderMode::Replicate)
}

pub fn convolve_with_border(image: &GrayImage, kernel: &Kernel, border: BorderMode) -> GrayImage {
    let width = image.width() as usize;
    let mut out = GrayImage::new(image.width(), image.height());
    let signed = convolve_signed(image, kernel, border);

    out.as_mut()
        .par_chunks_mut(width.max(1))
        .zip(signed.par_chunks(width.max(1)))
        .for_each(|(row, src)| {
            for (dst, &v) in row.iter_mut().zip(src) {
                *dst = v.clamp(0.0, 255.0) as u8;
            }
        });

    out
}

/// Full-precision convolution, keeping negative responses. Used by the
/// derivative operators that remap the signed result themselves.
pub(crate) fn convolve_signed(image: &GrayImage, kernel: &Kernel, border: BorderMode) -> Vec<f32> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let (kx_center, ky_center) = kernel.center();
    let data = image.as_raw();
    let mut out = vec![0.0f32; width * height];

    out.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for ky in 0..kernel.height {
                    let src_y = y as isize + ky as isize - ky_center;
                    let iy = map_coord(src_y, height, border);
                    for kx in 0..kernel.width {
                        let src_x = x as isize + kx as isize - kx_center;
                        let value = match (map_coord(src_x, width, border), iy) {
                            (Some(ix), Some(iy)) => data[iy * width + ix] as f32,
                            _ => border_fill(border),
                        };
                        sum += value * kernel.get(kx, ky);
                    }
                }
                *slot = sum;
            }
        });

    out
}

pub fn separable_convolve(
    image: &GrayImage,
    kx: &[f32],
    ky: &[f32],
    border: BorderMode,
) -> GrayImage {
    let signed = separable_convolve_signed(image, kx, ky, border);
    let width = image.width() as usize;
    let mut out = GrayImage::new(image.width(), image.height());

    out.as_mut()
        .par_chunks_mut(width.max(1))
        .zip(signed.par_chunks(width.max(1)))
        .for_each(|(row, src)| {
            for (dst, &v) in row.iter_mut().zip(src) {
                *dst = v.clamp(0.0, 255.0) as u8;
            }
        });

    out
}

pub(crate) fn separable_convolve_signed(
    image: &GrayImage,
    kx: &[f32],
    ky: &[f32],
    border: BorderMode,
) -> Vec<f32> {
    assert!(kx.len() % 2 == 1, "kx size must be odd");
    assert!(ky.len() % 2 == 1, "ky size must be odd");

    let width = image.width() as usize;
    let height = image.height() as usize;
    let rx = (kx.len() / 2) as isize;
    let ry = (ky.len() / 2) as isize;
    let src = image.as_raw();

    // Horizontal pass into a full-precision buffer.
    let mut tmp = vec![0.0f32; width * height];
    tmp.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let offset = y * width;
            for (x, slot) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for (k, &w) in kx.iter().enumerate() {
                    let sx = x as isize + k as isize - rx;
                    let value = match map_coord(sx, width, border) {
                        Some(ix) => src[offset + ix] as f32,
                        None => border_fill(border),
                    };
                    sum += value * w;
                }
                *slot = sum;
            }
        });

    // Vertical pass.
    let mut out = vec![0.0f32; width * height];
    out.par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for (k, &w) in ky.iter().enumerate() {
                    let sy = y as isize + k as isize - ry;
                    let value = match map_coord(sy, height, border) {
                        Some(iy) => tmp[iy * width + x],
                        None => border_fill(border),
                    };
                    sum += value * w;
                }
                *slot = sum;
            }
        });

    out
}

/// Gaussian blur with an explicit odd kernel size and per-axis sigmas.
/// Sigma values <= 0 fall back to the size-derived default.
pub fn gaussian_blur(
    image: &GrayImage,
    ksize: u32,
    sigma_x: f32,
    sigma_y: f32,
    border: BorderMode,
) -> Result<GrayImage> {
    ensure_odd("kernel size", ksize, 1)?;

    if ksize == 1 && sigma_x <= 0.0 && sigma_y <= 0.0 {
        return Ok(image.clone());
    }

    let size = ksize.max(3) as usize;
    let sx = if sigma_x > 0.0 {
        sigma_x
    } else {
        default_gaussian_sigma(size)
    };
    let sy = if sigma_y > 0.0 { sigma_y } else { sx };

    let kx = gaussian_kernel_1d(sx, size);
    let ky = gaussian_kernel_1d(sy, size);
    Ok(separable_convolve(image, &kx, &ky, border))
}

/// Gaussian blur from sigma alone; the kernel size is derived.
pub fn gaussian_blur_sigma(image: &GrayImage, sigma: f32, border: BorderMode) -> GrayImage {
    let size = kernel_size_for_sigma(sigma);
    let kernel = gaussian_kernel_1d(sigma, size);
    separable_convolve(image, &kernel, &kernel, border)
}

pub fn box_blur(image: &GrayImage, size: usize) -> GrayImage {
    convolve(image, &box_kernel(size))
}

pub fn median_blur(image: &GrayImage, ksize: u32) -> Result<GrayImage> {
    ensure_odd("kernel size", ksize, 1)?;
    if ksize == 1 {
        return Ok(image.clone());
    }

    let width = image.width() as usize;
    let height = image.height() as usize;
    let radius = (ksize / 2) as isize;
    let src = image.as_raw();
    let mut out = GrayImage::new(image.width(), image.height());

    out.as_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let mut window = Vec::with_capacity((ksize * ksize) as usize);
            for (x, slot) in row.iter_mut().enumerate() {
                window.clear();
                for dy in -radius..=radius {
                    let sy = (y as isize + dy).clamp(0, height as isize - 1) as usize;
                    for dx in -radius..=radius {
                        let sx = (x as isize + dx).clamp(0, width as isize - 1) as usize;
                        window.push(src[sy * width + sx]);
                    }
                }
                window.sort_unstable();
                *slot = window[window.len() / 2];
            }
        });

    Ok(out)
}

/// Weighted sum of two equally-sized images: `a * alpha + b * beta + gamma`.
pub fn add_weighted(
    a: &GrayImage,
    alpha: f32,
    b: &GrayImage,
    beta: f32,
    gamma: f32,
) -> Result<GrayImage> {
    ensure_same_dimensions(a.dimensions(), b.dimensions())?;

    let mut out = GrayImage::new(a.width(), a.height());
    out.as_mut()
        .par_iter_mut()
        .zip(a.as_raw().par_iter())
        .zip(b.as_raw().par_iter())
        .for_each(|((dst, &va), &vb)| {
            let v = va as f32 * alpha + vb as f32 * beta + gamma;
            *dst = v.clamp(0.0, 255.0) as u8;
        });

    Ok(out)
}

/// Laplacian sharpening: identity minus the scaled second derivative. The
/// kernel sums to one, so flat regions are untouched.
pub fn sharpen(image: &GrayImage, amount: f32) -> GrayImage {
    let mut kernel = laplacian_kernel();
    for v in &mut kernel.data {
        *v *= -amount;
    }
    let center = kernel.width / 2;
    kernel.data[center * kernel.width + center] += 1.0;
    convolve(image, &kernel)
}

/// Classic unsharp masking against a pre-blurred companion image. Pixels
/// whose |src - blurred| falls below `threshold` are left untouched.
pub fn unsharp_mask(
    src: &GrayImage,
    blurred: &GrayImage,
    amount: f32,
    threshold: u8,
) -> Result<GrayImage> {
    ensure_same_dimensions(src.dimensions(), blurred.dimensions())?;

    let mut out = GrayImage::new(src.width(), src.height());
    out.as_mut()
        .par_iter_mut()
        .zip(src.as_raw().par_iter())
        .zip(blurred.as_raw().par_iter())
        .for_each(|((dst, &orig), &blur)| {
            if orig.abs_diff(blur) < threshold {
                *dst = orig;
            } else {
                let v = orig as f32 * (1.0 + amount) - blur as f32 * amount;
                *dst = v.clamp(0.0, 255.0) as u8;
            }
        });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn gaussian_kernel_1d_is_normalized() {
        let k = gaussian_kernel_1d(1.2, 7);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }

    #[test]
    fn gaussian_blur_preserves_size() {
        let mut img = GrayImage::new(32, 24);
        img.put_pixel(10, 10, Luma([255]));

        let out = gaussian_blur(&img, 5, 1.0, 1.0, BorderMode::Reflect101).unwrap();
        assert_eq!(out.width(), img.width());
        assert_eq!(out.height(), img.height());
        // The spike spreads but total brightness stays in the neighborhood.
        assert!(out.get_pixel(10, 10)[0] < 255);
        assert!(out.get_pixel(9, 10)[0] > 0);
    }

    #[test]
    fn gaussian_blur_rejects_even_kernel() {
        let img = GrayImage::new(8, 8);
        assert!(gaussian_blur(&img, 4, 1.0, 1.0, BorderMode::Reflect101).is_err());
    }

    #[test]
    fn box_blur_constant_image_unchanged() {
        let mut img = GrayImage::new(9, 9);
        img.as_mut().fill(100);
        let out = box_blur(&img, 3);
        assert!(out.as_raw().iter().all(|&v| v == 100));
    }

    #[test]
    fn median_blur_removes_salt_noise() {
        let mut img = GrayImage::new(9, 9);
        img.as_mut().fill(10);
        img.put_pixel(4, 4, Luma([255]));

        let out = median_blur(&img, 3).unwrap();
        assert_eq!(out.get_pixel(4, 4)[0], 10);
    }

    #[test]
    fn map_coord_reflect101_mirrors_without_edge_repeat() {
        assert_eq!(map_coord(-1, 5, BorderMode::Reflect101), Some(1));
        assert_eq!(map_coord(5, 5, BorderMode::Reflect101), Some(3));
        assert_eq!(map_coord(-1, 5, BorderMode::Reflect), Some(0));
        assert_eq!(map_coord(-2, 5, BorderMode::Wrap), Some(3));
        assert_eq!(map_coord(-2, 5, BorderMode::Constant(0)), None);
    }

    #[test]
    fn unsharp_mask_respects_threshold() {
        let mut src = GrayImage::new(4, 1);
        let mut blur = GrayImage::new(4, 1);
        src.put_pixel(0, 0, Luma([100]));
        blur.put_pixel(0, 0, Luma([98]));
        src.put_pixel(1, 0, Luma([100]));
        blur.put_pixel(1, 0, Luma([50]));

        let out = unsharp_mask(&src, &blur, 1.0, 10).unwrap();
        // Small difference left untouched, large difference amplified.
        assert_eq!(out.get_pixel(0, 0)[0], 100);
        assert_eq!(out.get_pixel(1, 0)[0], 150);
    }

    #[test]
    fn sharpen_amplifies_local_contrast() {
        let mut img = GrayImage::new(9, 9);
        img.as_mut().fill(100);
        img.put_pixel(4, 4, Luma([140]));

        let out = sharpen(&img, 1.0);
        assert!(out.get_pixel(4, 4)[0] > 140);
        // Flat regions stay put.
        assert_eq!(out.get_pixel(1, 1)[0], 100);
    }

    #[test]
    fn add_weighted_dimension_mismatch_errors() {
        let a = GrayImage::new(4, 4);
        let b = GrayImage::new(5, 4);
        assert!(add_weighted(&a, 0.5, &b, 0.5, 0.0).is_err());
    }
}
