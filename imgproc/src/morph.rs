use image::GrayImage;
use rayon::prelude::*;

use crate::convolve::map_coord;
use crate::{ensure_odd, BorderMode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphType {
    Erode,
    Dilate,
    Open,
    Close,
    Gradient,
    TopHat,
    BlackHat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphShape {
    Rectangle,
    Cross,
    Ellipse,
}

/// Structuring element as a list of (dx, dy) offsets around the anchor.
pub fn create_morph_kernel(shape: MorphShape, width: u32, height: u32) -> Vec<(i32, i32)> {
    let mut kernel = Vec::new();
    let cx = width as i32 / 2;
    let cy = height as i32 / 2;

    match shape {
        MorphShape::Rectangle => {
            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    kernel.push((x - cx, y - cy));
                }
            }
        }
        MorphShape::Ellipse => {
            let rx = width as f32 / 2.0;
            let ry = height as f32 / 2.0;

            for y in 0..height as i32 {
                for x in 0..width as i32 {
                    let dx = (x - cx) as f32;
                    let dy = (y - cy) as f32;
                    if (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry) <= 1.0 {
                        kernel.push((x - cx, y - cy));
                    }
                }
            }
        }
        MorphShape::Cross => {
            for i in -(width as i32 / 2)..=(width as i32 / 2) {
                kernel.push((i, 0));
            }
            for i in -(height as i32 / 2)..=(height as i32 / 2) {
                if i != 0 {
                    kernel.push((0, i));
                }
            }
        }
    }

    kernel
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

fn rank_filter(
    src: &GrayImage,
    kernel: &[(i32, i32)],
    border: BorderMode,
    which: Extreme,
) -> GrayImage {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let data = src.as_raw();
    let mut out = GrayImage::new(src.width(), src.height());

    out.as_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let mut acc = match which {
                    Extreme::Min => 255u8,
                    Extreme::Max => 0u8,
                };

                for &(kx, ky) in kernel {
                    let sx = x as isize + kx as isize;
                    let sy = y as isize + ky as isize;
                    let value = match (map_coord(sx, width, border), map_coord(sy, height, border))
                    {
                        (Some(ix), Some(iy)) => data[iy * width + ix],
                        _ => match border {
                            BorderMode::Constant(v) => v,
                            // Unreachable for the non-constant modes, which
                            // always map in range.
                            _ => 0,
                        },
                    };
                    acc = match which {
                        Extreme::Min => acc.min(value),
                        Extreme::Max => acc.max(value),
                    };
                }

                *slot = acc;
            }
        });

    out
}

pub fn erode(src: &GrayImage, kernel: &[(i32, i32)], iterations: u32, border: BorderMode) -> GrayImage {
    let mut output = src.clone();
    for _ in 0..iterations {
        output = rank_filter(&output, kernel, border, Extreme::Min);
    }
    output
}

pub fn dilate(src: &GrayImage, kernel: &[(i32, i32)], iterations: u32, border: BorderMode) -> GrayImage {
    let mut output = src.clone();
    for _ in 0..iterations {
        output = rank_filter(&output, kernel, border, Extreme::Max);
    }
    output
}

pub fn morph(
    src: &GrayImage,
    morph_type: MorphType,
    kernel: &[(i32, i32)],
    iterations: u32,
    border: BorderMode,
) -> GrayImage {
    match morph_type {
        MorphType::Erode => erode(src, kernel, iterations, border),
        MorphType::Dilate => dilate(src, kernel, iterations, border),
        MorphType::Open => {
            let eroded = erode(src, kernel, iterations, border);
            dilate(&eroded, kernel, iterations, border)
        }
        MorphType::Close => {
            let dilated = dilate(src, kernel, iterations, border);
            erode(&dilated, kernel, iterations, border)
        }
        MorphType::Gradient => {
            let dilated = dilate(src, kernel, iterations, border);
            let eroded = erode(src, kernel, iterations, border);
            subtract(&dilated, &eroded)
        }
        MorphType::TopHat => {
            let opened = morph(src, MorphType::Open, kernel, iterations, border);
            subtract(src, &opened)
        }
        MorphType::BlackHat => {
            let closed = morph(src, MorphType::Close, kernel, iterations, border);
            subtract(&closed, src)
        }
    }
}

/// Validated entry point used by the morphology panel: square structuring
/// element with an odd side.
pub fn morph_ex(
    src: &GrayImage,
    morph_type: MorphType,
    shape: MorphShape,
    kernel_size: u32,
    iterations: u32,
    border: BorderMode,
) -> Result<GrayImage> {
    ensure_odd("kernel size", kernel_size, 1)?;
    let kernel = create_morph_kernel(shape, kernel_size, kernel_size);
    Ok(morph(src, morph_type, &kernel, iterations.max(1), border))
}

fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let mut output = GrayImage::new(a.width(), a.height());

    output
        .as_mut()
        .par_iter_mut()
        .zip(a.as_raw().par_iter())
        .zip(b.as_raw().par_iter())
        .for_each(|((out, &va), &vb)| {
            *out = va.saturating_sub(vb);
        });

    output
}
