use image::GrayImage;
use rayon::prelude::*;

use crate::{ImgprocError, Result};

pub fn compute_histogram(image: &GrayImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &px in image.as_raw() {
        hist[px as usize] += 1;
    }
    hist
}

pub fn compute_cdf(hist: &[u32; 256]) -> [u32; 256] {
    let mut cdf = [0u32; 256];
    cdf[0] = hist[0];
    for i in 1..256 {
        cdf[i] = cdf[i - 1] + hist[i];
    }
    cdf
}

fn equalization_lut(hist: &[u32; 256], total: u32) -> [u8; 256] {
    let cdf = compute_cdf(hist);
    let cdf_min = cdf.iter().find(|&&x| x > 0).copied().unwrap_or(0);

    let mut lut = [0u8; 256];
    if total > cdf_min {
        let denom = (total - cdf_min) as f32;
        for i in 0..256 {
            lut[i] = ((cdf[i].saturating_sub(cdf_min)) as f32 / denom * 255.0).round() as u8;
        }
    } else {
        // Constant image: identity mapping.
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
    }
    lut
}

fn apply_lut_parallel(image: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    let mut output = GrayImage::new(image.width(), image.height());
    output
        .as_mut()
        .par_iter_mut()
        .zip(image.as_raw().par_iter())
        .for_each(|(dst, &v)| {
            *dst = lut[v as usize];
        });
    output
}

pub fn histogram_equalization(image: &GrayImage) -> GrayImage {
    let hist = compute_histogram(image);
    let total = image.width() * image.height();
    let lut = equalization_lut(&hist, total);
    apply_lut_parallel(image, &lut)
}

/// Linear rescale of the actual value range to the full 0..=255 span.
/// A constant image maps to zero.
pub fn normalize_minmax(image: &GrayImage) -> GrayImage {
    let min = image.as_raw().iter().copied().min().unwrap_or(0);
    let max = image.as_raw().iter().copied().max().unwrap_or(0);

    let mut lut = [0u8; 256];
    if max > min {
        let span = (max - min) as f32;
        for (i, slot) in lut.iter_mut().enumerate() {
            let v = (i as f32 - min as f32) / span * 255.0;
            *slot = v.clamp(0.0, 255.0) as u8;
        }
    }
    apply_lut_parallel(image, &lut)
}

/// Contrast stretch between two clip points. The pair carries no ordering
/// constraint: a collapsed or inverted range degenerates to a hard cut at
/// `upper` instead of failing.
pub fn stretch_clip(image: &GrayImage, lower: u8, upper: u8) -> GrayImage {
    let mut lut = [0u8; 256];
    let span = upper as i32 - lower as i32;

    for (i, slot) in lut.iter_mut().enumerate() {
        let i = i as i32;
        *slot = if span <= 0 {
            if i > upper as i32 {
                255
            } else {
                0
            }
        } else {
            (((i - lower as i32) as f32 / span as f32) * 255.0)
                .round()
                .clamp(0.0, 255.0) as u8
        };
    }
    apply_lut_parallel(image, &lut)
}

/// Contrast-limited adaptive histogram equalization over a `tiles x tiles`
/// grid with bilinear blending between neighboring tile mappings.
/// `clip_limit` is relative to the uniform bin height (1.0 disables gain).
pub fn clahe(image: &GrayImage, clip_limit: f32, tiles: u32) -> Result<GrayImage> {
    if tiles == 0 {
        return Err(ImgprocError::InvalidParameters(
            "tile grid must have at least one tile".into(),
        ));
    }
    if clip_limit <= 0.0 {
        return Err(ImgprocError::InvalidParameters(format!(
            "clip limit must be positive, got {clip_limit}"
        )));
    }

    let width = image.width() as usize;
    let height = image.height() as usize;
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let tiles = (tiles as usize).min(width).min(height).max(1);
    let tile_w = width.div_ceil(tiles);
    let tile_h = height.div_ceil(tiles);
    let data = image.as_raw();

    // One clipped-equalization LUT per tile.
    let mut luts = vec![[0u8; 256]; tiles * tiles];
    for ty in 0..tiles {
        for tx in 0..tiles {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[data[y * width + x] as usize] += 1;
                }
            }

            let pixels = ((x1 - x0) * (y1 - y0)) as u32;
            let limit = ((clip_limit * pixels as f32 / 256.0).max(1.0)) as u32;

            // Clip peaks and spread the excess uniformly.
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            let mut remainder = (excess % 256) as usize;
            for bin in hist.iter_mut() {
                *bin += bonus;
                if remainder > 0 {
                    *bin += 1;
                    remainder -= 1;
                }
            }

            luts[ty * tiles + tx] = equalization_lut(&hist, pixels);
        }
    }

    let mut out = GrayImage::new(image.width(), image.height());
    out.as_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            // Position of this row between the vertical tile centers.
            let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
            let ty0 = fy.floor().clamp(0.0, (tiles - 1) as f32) as usize;
            let ty1 = (ty0 + 1).min(tiles - 1);
            let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

            for (x, slot) in row.iter_mut().enumerate() {
                let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
                let tx0 = fx.floor().clamp(0.0, (tiles - 1) as f32) as usize;
                let tx1 = (tx0 + 1).min(tiles - 1);
                let wx = (fx - tx0 as f32).clamp(0.0, 1.0);

                let v = data[y * width + x] as usize;
                let tl = luts[ty0 * tiles + tx0][v] as f32;
                let tr = luts[ty0 * tiles + tx1][v] as f32;
                let bl = luts[ty1 * tiles + tx0][v] as f32;
                let br = luts[ty1 * tiles + tx1][v] as f32;

                let top = tl * (1.0 - wx) + tr * wx;
                let bottom = bl * (1.0 - wx) + br * wx;
                *slot = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
            }
        });

    Ok(out)
}
