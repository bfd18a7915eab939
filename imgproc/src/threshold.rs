use image::GrayImage;
use rayon::prelude::*;

use crate::{ensure_odd, gaussian_blur_sigma, BorderMode, ImgprocError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdType {
    Binary,
    BinaryInv,
    Trunc,
    ToZero,
    ToZeroInv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptiveMethod {
    MeanC,
    GaussianC,
}

pub fn threshold(src: &GrayImage, thresh: u8, max_value: u8, typ: ThresholdType) -> GrayImage {
    let mut dst = GrayImage::new(src.width(), src.height());

    dst.as_mut()
        .par_iter_mut()
        .zip(src.as_raw().par_iter())
        .for_each(|(out_px, &value)| {
            *out_px = apply_threshold(value, thresh, max_value, typ);
        });

    dst
}

/// Global threshold chosen by Otsu's between-class variance sweep.
/// Returns the selected threshold alongside the binarized image.
pub fn threshold_otsu(src: &GrayImage, max_value: u8, typ: ThresholdType) -> (u8, GrayImage) {
    let hist = histogram(src);
    let total = (src.width() * src.height()) as f64;

    let mut sum_all = 0.0f64;
    for (i, &count) in hist.iter().enumerate() {
        sum_all += (i as f64) * (count as f64);
    }

    let mut weight_background = 0.0f64;
    let mut sum_background = 0.0f64;
    let mut best_between = -1.0f64;
    let mut best_threshold = 0u8;

    for t in 0u16..=255 {
        let idx = t as usize;
        weight_background += hist[idx] as f64;
        if weight_background <= f64::EPSILON {
            continue;
        }

        let weight_foreground = total - weight_background;
        if weight_foreground <= f64::EPSILON {
            break;
        }

        sum_background += (t as f64) * (hist[idx] as f64);
        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_all - sum_background) / weight_foreground;
        let diff = mean_background - mean_foreground;
        let between = weight_background * weight_foreground * diff * diff;

        if between > best_between {
            best_between = between;
            best_threshold = t as u8;
        }
    }

    let dst = threshold(src, best_threshold, max_value, typ);
    (best_threshold, dst)
}

/// Global threshold by the triangle method: the histogram bin farthest from
/// the line between the histogram peak and the far end of its support.
pub fn threshold_triangle(src: &GrayImage, max_value: u8, typ: ThresholdType) -> (u8, GrayImage) {
    let hist = histogram(src);

    let peak = hist
        .iter()
        .enumerate()
        .max_by_key(|(_, &c)| c)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let first = hist.iter().position(|&c| c > 0).unwrap_or(0);
    let last = hist.iter().rposition(|&c| c > 0).unwrap_or(255);

    // Sweep over the longer tail of the distribution.
    let (from, to) = if peak - first > last - peak {
        (first, peak)
    } else {
        (peak, last)
    };

    let peak_height = hist[peak] as f64;
    let base = (to - from) as f64;
    let mut best_dist = -1.0f64;
    let mut best_threshold = from;

    if base > 0.0 && peak_height > 0.0 {
        for t in from..=to {
            // Distance from (t, hist[t]) to the peak-to-base line, up to a
            // constant factor.
            let x = (t - from) as f64 / base;
            let line = if to == peak {
                peak_height * x
            } else {
                peak_height * (1.0 - x)
            };
            let dist = line - hist[t] as f64;
            if dist > best_dist {
                best_dist = dist;
                best_threshold = t;
            }
        }
    }

    let best_threshold = best_threshold as u8;
    let dst = threshold(src, best_threshold, max_value, typ);
    (best_threshold, dst)
}

pub fn adaptive_threshold(
    src: &GrayImage,
    max_value: u8,
    method: AdaptiveMethod,
    typ: ThresholdType,
    block_size: u32,
    c: f32,
) -> Result<GrayImage> {
    ensure_odd("block_size", block_size, 3)?;
    if !matches!(typ, ThresholdType::Binary | ThresholdType::BinaryInv) {
        return Err(ImgprocError::InvalidParameters(
            "adaptive threshold supports Binary or BinaryInv types".into(),
        ));
    }

    let mut dst = GrayImage::new(src.width(), src.height());
    let local = match method {
        AdaptiveMethod::MeanC => local_mean_image(src, block_size),
        AdaptiveMethod::GaussianC => local_gaussian_image(src, block_size),
    };

    dst.as_mut()
        .par_iter_mut()
        .zip(src.as_raw().par_iter())
        .zip(local.as_raw().par_iter())
        .for_each(|((out, &value), &mean)| {
            let cutoff = mean as f32 - c;
            let above = value as f32 > cutoff;
            *out = match typ {
                ThresholdType::Binary => {
                    if above {
                        max_value
                    } else {
                        0
                    }
                }
                _ => {
                    if above {
                        0
                    } else {
                        max_value
                    }
                }
            };
        });

    Ok(dst)
}

fn apply_threshold(value: u8, thresh: u8, max_value: u8, typ: ThresholdType) -> u8 {
    match typ {
        ThresholdType::Binary => {
            if value > thresh {
                max_value
            } else {
                0
            }
        }
        ThresholdType::BinaryInv => {
            if value > thresh {
                0
            } else {
                max_value
            }
        }
        ThresholdType::Trunc => value.min(thresh),
        ThresholdType::ToZero => {
            if value > thresh {
                value
            } else {
                0
            }
        }
        ThresholdType::ToZeroInv => {
            if value > thresh {
                0
            } else {
                value
            }
        }
    }
}

fn histogram(src: &GrayImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &px in src.as_raw() {
        hist[px as usize] += 1;
    }
    hist
}

fn local_mean_image(src: &GrayImage, block_size: u32) -> GrayImage {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let radius = (block_size / 2) as i32;
    let stride = width + 1;

    let mut integral = vec![0u64; (width + 1) * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            row_sum += src.as_raw()[y * width + x] as u64;
            let idx = (y + 1) * stride + (x + 1);
            integral[idx] = integral[idx - stride] + row_sum;
        }
    }

    let mut out = GrayImage::new(src.width(), src.height());
    for y in 0..height {
        for x in 0..width {
            let x0 = (x as i32 - radius).max(0) as usize;
            let y0 = (y as i32 - radius).max(0) as usize;
            let x1 = (x as i32 + radius + 1).min(width as i32) as usize;
            let y1 = (y as i32 + radius + 1).min(height as i32) as usize;

            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let area = ((x1 - x0) * (y1 - y0)) as u64;
            out.as_mut()[y * width + x] = (sum / area).min(255) as u8;
        }
    }
    out
}

fn local_gaussian_image(src: &GrayImage, block_size: u32) -> GrayImage {
    let sigma = crate::default_gaussian_sigma(block_size as usize);
    gaussian_blur_sigma(src, sigma, BorderMode::Reflect101)
}
