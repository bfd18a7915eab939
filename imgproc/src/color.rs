use image::{GrayImage, Rgb, RgbImage};
use rayon::prelude::*;

/// Per-channel HSV remap: shift then scale hue (degrees, wrapping), shift
/// then scale saturation and value (clamped). Neutral adjustment is all
/// shifts 0 and all scales 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvAdjust {
    pub hue_shift: f32,
    pub hue_scale: f32,
    pub sat_shift: f32,
    pub sat_scale: f32,
    pub val_shift: f32,
    pub val_scale: f32,
}

impl Default for HsvAdjust {
    fn default() -> Self {
        Self {
            hue_shift: 0.0,
            hue_scale: 1.0,
            sat_shift: 0.0,
            sat_scale: 1.0,
            val_shift: 0.0,
            val_scale: 1.0,
        }
    }
}

/// RGB -> (hue degrees [0, 360), saturation [0, 1], value [0, 1]).
pub fn rgb_to_hsv(px: Rgb<u8>) -> (f32, f32, f32) {
    let r = px[0] as f32 / 255.0;
    let g = px[1] as f32 / 255.0;
    let b = px[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Remaps every pixel through HSV space. Saturation and value shifts are in
/// 0..=255 display units, converted to the unit range internally.
pub fn adjust_hsv(src: &RgbImage, adj: &HsvAdjust) -> RgbImage {
    let mut out = RgbImage::new(src.width(), src.height());
    let width = src.width() as usize;

    out.as_mut()
        .par_chunks_mut(width.max(1) * 3)
        .zip(src.as_raw().par_chunks(width.max(1) * 3))
        .for_each(|(dst_row, src_row)| {
            for (dst, src) in dst_row.chunks_exact_mut(3).zip(src_row.chunks_exact(3)) {
                let (h, s, v) = rgb_to_hsv(Rgb([src[0], src[1], src[2]]));
                let h = h * adj.hue_scale + adj.hue_shift;
                let s = s * adj.sat_scale + adj.sat_shift / 255.0;
                let v = v * adj.val_scale + adj.val_shift / 255.0;
                let px = hsv_to_rgb(h, s, v);
                dst.copy_from_slice(&px.0);
            }
        });

    out
}

/// LUT for combined brightness / contrast / gamma: contrast and brightness
/// first, then the gamma curve. Gamma values <= 0 are treated as 1.
pub fn brightness_contrast_lut(brightness: i32, contrast: f32, gamma: f32) -> [u8; 256] {
    let gamma = if gamma > 0.0 { gamma } else { 1.0 };
    let mut lut = [0u8; 256];

    for (i, slot) in lut.iter_mut().enumerate() {
        let linear = (contrast * i as f32 + brightness as f32).clamp(0.0, 255.0);
        let curved = 255.0 * (linear / 255.0).powf(1.0 / gamma);
        *slot = curved.round().clamp(0.0, 255.0) as u8;
    }

    lut
}

pub fn apply_lut(src: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    let mut out = GrayImage::new(src.width(), src.height());
    out.as_mut()
        .par_iter_mut()
        .zip(src.as_raw().par_iter())
        .for_each(|(dst, &v)| {
            *dst = lut[v as usize];
        });
    out
}

/// Splits RGB into BT.601 luma plus offset chroma planes, all u8.
pub fn rgb_to_ycbcr_planes(src: &RgbImage) -> [GrayImage; 3] {
    let (w, h) = src.dimensions();
    let mut y = GrayImage::new(w, h);
    let mut cb = GrayImage::new(w, h);
    let mut cr = GrayImage::new(w, h);

    for (i, px) in src.pixels().enumerate() {
        let r = px[0] as f32;
        let g = px[1] as f32;
        let b = px[2] as f32;

        y.as_mut()[i] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        cb.as_mut()[i] = (128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b)
            .round()
            .clamp(0.0, 255.0) as u8;
        cr.as_mut()[i] = (128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b)
            .round()
            .clamp(0.0, 255.0) as u8;
    }

    [y, cb, cr]
}

pub fn ycbcr_planes_to_rgb(y: &GrayImage, cb: &GrayImage, cr: &GrayImage) -> RgbImage {
    let (w, h) = y.dimensions();
    let mut out = RgbImage::new(w, h);

    for (i, px) in out.pixels_mut().enumerate() {
        let yv = y.as_raw()[i] as f32;
        let cbv = *cb.as_raw().get(i).unwrap_or(&128) as f32 - 128.0;
        let crv = *cr.as_raw().get(i).unwrap_or(&128) as f32 - 128.0;

        px[0] = (yv + 1.402 * crv).round().clamp(0.0, 255.0) as u8;
        px[1] = (yv - 0.344_136 * cbv - 0.714_136 * crv)
            .round()
            .clamp(0.0, 255.0) as u8;
        px[2] = (yv + 1.772 * cbv).round().clamp(0.0, 255.0) as u8;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_roundtrip_on_primaries() {
        for px in [
            Rgb([255, 0, 0]),
            Rgb([0, 255, 0]),
            Rgb([0, 0, 255]),
            Rgb([255, 255, 255]),
            Rgb([0, 0, 0]),
            Rgb([128, 64, 32]),
        ] {
            let (h, s, v) = rgb_to_hsv(px);
            let back = hsv_to_rgb(h, s, v);
            for c in 0..3 {
                assert!(
                    px[c].abs_diff(back[c]) <= 1,
                    "roundtrip drift for {px:?} -> {back:?}"
                );
            }
        }
    }

    #[test]
    fn neutral_adjust_is_identity_up_to_rounding() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(1, 1, Rgb([200, 100, 50]));
        let out = adjust_hsv(&img, &HsvAdjust::default());

        let a = img.get_pixel(1, 1);
        let b = out.get_pixel(1, 1);
        for c in 0..3 {
            assert!(a[c].abs_diff(b[c]) <= 1);
        }
    }

    #[test]
    fn hue_shift_rotates_red_toward_green() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let out = adjust_hsv(
            &img,
            &HsvAdjust {
                hue_shift: 120.0,
                ..HsvAdjust::default()
            },
        );
        let px = out.get_pixel(0, 0);
        assert!(px[1] > 200 && px[0] < 50 && px[2] < 50, "got {px:?}");
    }

    #[test]
    fn identity_lut_preserves_values() {
        let lut = brightness_contrast_lut(0, 1.0, 1.0);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[128], 128);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn brightness_shifts_lut_up() {
        let lut = brightness_contrast_lut(50, 1.0, 1.0);
        assert_eq!(lut[0], 50);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn gamma_brightens_midtones() {
        let lut = brightness_contrast_lut(0, 1.0, 2.0);
        assert!(lut[64] > 64);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn ycbcr_roundtrip_close() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([200, 30, 90]));
        img.put_pixel(1, 1, Rgb([10, 250, 125]));

        let [y, cb, cr] = rgb_to_ycbcr_planes(&img);
        let back = ycbcr_planes_to_rgb(&y, &cb, &cr);

        for (a, b) in img.pixels().zip(back.pixels()) {
            for c in 0..3 {
                assert!(a[c].abs_diff(b[c]) <= 2, "{a:?} vs {b:?}");
            }
        }
    }
}
