use image::{GrayImage, RgbImage};
use rayon::prelude::*;

use crate::{ensure_odd, rgb_to_ycbcr_planes, ycbcr_planes_to_rgb, ImgprocError, Result};

/// Edge-preserving bilateral filter. `d <= 0` derives the window from
/// `sigma_space`.
pub fn bilateral_filter(
    src: &GrayImage,
    d: i32,
    sigma_color: f32,
    sigma_space: f32,
) -> GrayImage {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let data = src.as_raw();
    let mut dst = GrayImage::new(src.width(), src.height());

    let radius = if d <= 0 {
        (sigma_space * 1.5).ceil() as i32
    } else {
        d / 2
    }
    .max(1);

    let gauss_color_coeff = -0.5 / (sigma_color * sigma_color);
    let gauss_space_coeff = -0.5 / (sigma_space * sigma_space);

    dst.as_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let mut sum_weight = 0.0f32;
                let mut sum_val = 0.0f32;
                let center_val = data[y * width + x] as f32;

                for dy in -radius..=radius {
                    let sy = y as i32 + dy;
                    if sy < 0 || sy >= height as i32 {
                        continue;
                    }

                    for dx in -radius..=radius {
                        let sx = x as i32 + dx;
                        if sx < 0 || sx >= width as i32 {
                            continue;
                        }

                        let val = data[sy as usize * width + sx as usize] as f32;
                        let dist_sq = (dx * dx + dy * dy) as f32;
                        let color_diff = val - center_val;

                        let weight = (dist_sq * gauss_space_coeff
                            + color_diff * color_diff * gauss_color_coeff)
                            .exp();

                        sum_val += val * weight;
                        sum_weight += weight;
                    }
                }

                *slot = (sum_val / sum_weight).clamp(0.0, 255.0) as u8;
            }
        });

    dst
}

/// Non-local means denoising on a single plane. Patch similarity over the
/// `template_size` window steers averaging over the `search_size` window,
/// with filter strength `h`.
pub fn nl_means_denoise(
    src: &GrayImage,
    h: f32,
    template_size: u32,
    search_size: u32,
) -> Result<GrayImage> {
    ensure_odd("template window", template_size, 3)?;
    ensure_odd("search window", search_size, 3)?;
    if h <= 0.0 {
        return Err(ImgprocError::InvalidParameters(format!(
            "filter strength must be positive, got {h}"
        )));
    }

    let width = src.width() as usize;
    let height = src.height() as usize;
    let data = src.as_raw();
    let t_radius = (template_size / 2) as isize;
    let s_radius = (search_size / 2) as isize;
    let patch_area = (template_size * template_size) as f32;
    let inv_h2 = 1.0 / (h * h);

    let clamp_x = |v: isize| v.clamp(0, width as isize - 1) as usize;
    let clamp_y = |v: isize| v.clamp(0, height as isize - 1) as usize;

    let patch_distance = |px: usize, py: usize, qx: isize, qy: isize| -> f32 {
        let mut ssd = 0.0f32;
        for ty in -t_radius..=t_radius {
            for tx in -t_radius..=t_radius {
                let a = data[clamp_y(py as isize + ty) * width + clamp_x(px as isize + tx)] as f32;
                let b = data[clamp_y(qy + ty) * width + clamp_x(qx + tx)] as f32;
                let d = a - b;
                ssd += d * d;
            }
        }
        ssd / patch_area
    };

    let mut out = GrayImage::new(src.width(), src.height());
    out.as_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let mut sum_weight = 0.0f32;
                let mut sum_val = 0.0f32;

                for sy in -s_radius..=s_radius {
                    let qy = y as isize + sy;
                    for sx in -s_radius..=s_radius {
                        let qx = x as isize + sx;
                        let d2 = patch_distance(x, y, qx, qy);
                        let weight = (-d2 * inv_h2).exp();
                        let val = data[clamp_y(qy) * width + clamp_x(qx)] as f32;

                        sum_weight += weight;
                        sum_val += val * weight;
                    }
                }

                *slot = (sum_val / sum_weight).clamp(0.0, 255.0) as u8;
            }
        });

    Ok(out)
}

/// Color non-local means: luma denoised with `h`, chroma planes with
/// `h_color`, recombined from YCbCr.
pub fn nl_means_denoise_colored(
    src: &RgbImage,
    h: f32,
    h_color: f32,
    template_size: u32,
    search_size: u32,
) -> Result<RgbImage> {
    let [y, cb, cr] = rgb_to_ycbcr_planes(src);

    let y = nl_means_denoise(&y, h, template_size, search_size)?;
    let cb = nl_means_denoise(&cb, h_color, template_size, search_size)?;
    let cr = nl_means_denoise(&cr, h_color, template_size, search_size)?;

    Ok(ycbcr_planes_to_rgb(&y, &cb, &cr))
}
