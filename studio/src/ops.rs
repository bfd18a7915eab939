//! The built-in operator catalogue: one declarative descriptor per panel
//! (display name, control schema, apply function), so no operator needs its
//! own panel type.

use cvlab_core::Picture;
use cvlab_imgproc as imgproc;
use cvlab_imgproc::{AdaptiveMethod, BorderMode, HsvAdjust, MorphShape, MorphType, ThresholdType};
use image::GrayImage;

use crate::controls::{ControlSpec, ParamSet};

/// A transform operator as seen by the panel protocol: a pure function from
/// (image, parameters) to a new image, plus the schema of its controls.
#[derive(Debug, Clone, Copy)]
pub struct OperatorSpec {
    pub name: &'static str,
    pub controls: &'static [ControlSpec],
    pub apply: fn(&Picture, &ParamSet) -> imgproc::Result<Picture>,
}

pub fn builtin_operators() -> &'static [OperatorSpec] {
    &BUILTIN
}

pub fn operator(name: &str) -> Option<&'static OperatorSpec> {
    BUILTIN.iter().find(|op| op.name == name)
}

static BUILTIN: [OperatorSpec; 13] = [
    OperatorSpec {
        name: "Canny Edge Detection",
        controls: CANNY_CONTROLS,
        apply: apply_canny,
    },
    OperatorSpec {
        name: "Sobel Magnitude",
        controls: SOBEL_CONTROLS,
        apply: apply_sobel,
    },
    OperatorSpec {
        name: "Laplacian Edge Detection",
        controls: LAPLACIAN_DETECT_CONTROLS,
        apply: apply_laplacian_detect,
    },
    OperatorSpec {
        name: "Laplacian Edge Enhancement",
        controls: LAPLACIAN_ENHANCE_CONTROLS,
        apply: apply_laplacian_enhance,
    },
    OperatorSpec {
        name: "Gaussian Blur",
        controls: GAUSSIAN_CONTROLS,
        apply: apply_gaussian,
    },
    OperatorSpec {
        name: "Unsharp Mask",
        controls: UNSHARP_CONTROLS,
        apply: apply_unsharp,
    },
    OperatorSpec {
        name: "Thresholding",
        controls: THRESHOLD_CONTROLS,
        apply: apply_threshold,
    },
    OperatorSpec {
        name: "Morphology",
        controls: MORPH_CONTROLS,
        apply: apply_morphology,
    },
    OperatorSpec {
        name: "Adjust HSV",
        controls: HSV_CONTROLS,
        apply: apply_hsv,
    },
    OperatorSpec {
        name: "Brightness / Contrast",
        controls: BRIGHTNESS_CONTROLS,
        apply: apply_brightness,
    },
    OperatorSpec {
        name: "Histogram",
        controls: HISTOGRAM_CONTROLS,
        apply: apply_histogram,
    },
    OperatorSpec {
        name: "Denoise",
        controls: DENOISE_CONTROLS,
        apply: apply_denoise,
    },
    OperatorSpec {
        name: "Convert to Grayscale",
        controls: &[],
        apply: apply_grayscale,
    },
];

const EDGE_BORDERS: &[&str] = &["Default", "Constant", "Replicate", "Reflect101", "Wrap"];
const MORPH_BORDERS: &[&str] = &["Constant", "Replicate", "Reflect", "Wrap", "Reflect101"];

fn edge_border(choice: usize) -> BorderMode {
    match choice {
        1 => BorderMode::Constant(0),
        2 => BorderMode::Replicate,
        4 => BorderMode::Wrap,
        _ => BorderMode::Reflect101,
    }
}

fn morph_border(choice: usize, value: u8) -> BorderMode {
    match choice {
        0 => BorderMode::Constant(value),
        1 => BorderMode::Replicate,
        2 => BorderMode::Reflect,
        3 => BorderMode::Wrap,
        _ => BorderMode::Reflect101,
    }
}

/// Gray result presented with the channel count of the source image.
fn match_channels(src: &Picture, gray: GrayImage) -> Picture {
    if src.is_color() {
        Picture::Rgb(Picture::Gray(gray).to_rgb())
    } else {
        Picture::Gray(gray)
    }
}

/// Runs a grayscale transform on the luma plane only, leaving chroma
/// untouched for color input.
fn on_luma_plane<F>(src: &Picture, f: F) -> imgproc::Result<Picture>
where
    F: Fn(&GrayImage) -> imgproc::Result<GrayImage>,
{
    match src {
        Picture::Gray(g) => Ok(Picture::Gray(f(g)?)),
        Picture::Rgb(rgb) => {
            let [y, cb, cr] = imgproc::rgb_to_ycbcr_planes(rgb);
            let y = f(&y)?;
            Ok(Picture::Rgb(imgproc::ycbcr_planes_to_rgb(&y, &cb, &cr)))
        }
    }
}

const CANNY_CONTROLS: &[ControlSpec] = &[
    ControlSpec::int("threshold1", "Threshold 1:", 0, 500, 50),
    ControlSpec::int("threshold2", "Threshold 2:", 0, 500, 150),
    ControlSpec::choice("aperture_size", "Aperture Size:", &["3", "5", "7"], 0),
    ControlSpec::flag("l2_gradient", "Use L2 Gradient (more accurate)", false),
];

fn apply_canny(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let aperture = [3u32, 5, 7][params.choice("aperture_size")];
    let edges = imgproc::canny(
        &src.to_gray(),
        params.int("threshold1") as f32,
        params.int("threshold2") as f32,
        aperture,
        params.flag("l2_gradient"),
    )?;
    Ok(match_channels(src, edges))
}

const SOBEL_CONTROLS: &[ControlSpec] = &[ControlSpec::choice(
    "aperture_size",
    "Aperture Size:",
    &["3", "5", "7"],
    1,
)];

fn apply_sobel(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let aperture = [3u32, 5, 7][params.choice("aperture_size")];
    let mag = imgproc::sobel_magnitude(&src.to_gray(), aperture, BorderMode::Replicate)?;
    Ok(match_channels(src, mag))
}

const LAPLACIAN_DETECT_CONTROLS: &[ControlSpec] = &[
    ControlSpec::odd("kernel_size", "Kernel Size:", 1, 7, 3, 1),
    ControlSpec::int("scale", "Scale:", 1, 10, 1),
    ControlSpec::int("delta", "Delta:", 0, 255, 0),
    ControlSpec::scaled("blend_factor", "Blend Factor:", 0, 10, 10, 10),
    ControlSpec::choice("border_type", "Border Type:", EDGE_BORDERS, 0),
];

fn apply_laplacian_detect(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let border = edge_border(params.choice("border_type"));
    let edges = imgproc::laplacian_ex(
        &src.to_gray(),
        params.int("kernel_size") as u32,
        params.int("scale") as f32,
        params.int("delta") as f32,
        border,
    )?;

    let blend = params.float("blend_factor") as f32;
    if blend >= 1.0 {
        return Ok(match_channels(src, edges));
    }

    // Blend the edge response over the source image.
    src.try_map_channels(|channel| imgproc::add_weighted(channel, 1.0 - blend, &edges, blend, 0.0))
}

const LAPLACIAN_ENHANCE_CONTROLS: &[ControlSpec] = &[
    ControlSpec::scaled("amount", "Enhance Amount:", 0, 20, 10, 10),
    ControlSpec::int("pre_blur", "Pre-blur Sigma:", 0, 10, 0),
    ControlSpec::int("scale", "Scale:", 1, 10, 1),
    ControlSpec::choice("border_type", "Border Type:", EDGE_BORDERS, 0),
];

fn apply_laplacian_enhance(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let amount = params.float("amount") as f32;
    let pre_blur = params.int("pre_blur") as f32;
    let scale = params.int("scale") as f32;
    let border = edge_border(params.choice("border_type"));

    src.try_map_channels(|channel| {
        let working = if pre_blur > 0.0 {
            imgproc::gaussian_blur_sigma(channel, pre_blur, border)
        } else {
            channel.clone()
        };

        let mut kernel = imgproc::laplacian_kernel();
        for v in &mut kernel.data {
            *v *= scale;
        }
        let response = imgproc::convolve_with_border(&working, &kernel, border);

        // Subtracting the scaled second derivative steepens edges.
        imgproc::add_weighted(&working, 1.0, &response, -amount, 0.0)
    })
}

const GAUSSIAN_CONTROLS: &[ControlSpec] = &[
    ControlSpec::odd("kernel_size", "Kernel Size:", 1, 31, 5, 1),
    ControlSpec::scaled("sigma_x", "Sigma X:", 1, 100, 10, 10),
    ControlSpec::scaled("sigma_y", "Sigma Y:", 1, 100, 10, 10),
    ControlSpec::choice("border_type", "Border Type:", EDGE_BORDERS, 0),
];

fn apply_gaussian(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let ksize = params.int("kernel_size") as u32;
    let sigma_x = params.float("sigma_x") as f32;
    let sigma_y = params.float("sigma_y") as f32;
    let border = edge_border(params.choice("border_type"));

    src.try_map_channels(|channel| imgproc::gaussian_blur(channel, ksize, sigma_x, sigma_y, border))
}

const UNSHARP_CONTROLS: &[ControlSpec] = &[
    ControlSpec::scaled("amount", "Amount:", 0, 30, 10, 10),
    ControlSpec::scaled("radius", "Radius:", 1, 50, 10, 10),
    ControlSpec::int("threshold", "Threshold:", 0, 255, 0),
    ControlSpec::choice("blur_method", "Blur Method:", &["Gaussian", "Median", "Bilateral"], 0),
    ControlSpec::flag("preserve_color", "Sharpen luminance only", true),
];

fn apply_unsharp(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let amount = params.float("amount") as f32;
    let radius = (params.float("radius") as f32).max(0.1);
    let threshold = params.int("threshold") as u8;
    let method = params.choice("blur_method");

    let sharpen_plane = move |plane: &GrayImage| -> imgproc::Result<GrayImage> {
        let blurred = match method {
            1 => {
                let ksize = (radius.round() as u32) * 2 + 1;
                imgproc::median_blur(plane, ksize)?
            }
            2 => imgproc::bilateral_filter(plane, 0, radius * 25.0, radius),
            _ => imgproc::gaussian_blur_sigma(plane, radius, BorderMode::Reflect101),
        };
        imgproc::unsharp_mask(plane, &blurred, amount, threshold)
    };

    if params.flag("preserve_color") {
        on_luma_plane(src, sharpen_plane)
    } else {
        src.try_map_channels(sharpen_plane)
    }
}

const THRESHOLD_METHODS: &[&str] = &[
    "Binary",
    "Binary Inverted",
    "Truncate",
    "To Zero",
    "To Zero Inverted",
    "Adaptive Mean",
    "Adaptive Gaussian",
    "Otsu's (Global)",
    "Triangle (Global)",
];

const THRESHOLD_CONTROLS: &[ControlSpec] = &[
    ControlSpec::choice("method", "Threshold Method:", THRESHOLD_METHODS, 0),
    ControlSpec::int("thresh", "Threshold Value:", 0, 255, 127),
    ControlSpec::int("maxval", "Maximum Value:", 0, 255, 255),
    ControlSpec::odd("block_size", "Block Size:", 3, 51, 11, 3),
    ControlSpec::int("c", "C Value:", -10, 10, 2),
    ControlSpec::flag("otsu", "Always use Otsu's method", false),
    ControlSpec::flag("triangle", "Always use Triangle method", false),
];

fn apply_threshold(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let gray = src.to_gray();
    let thresh = params.int("thresh") as u8;
    let maxval = params.int("maxval") as u8;
    let block_size = params.int("block_size") as u32;
    let c = params.int("c") as f32;

    let global_type = |idx: usize| match idx {
        1 => ThresholdType::BinaryInv,
        2 => ThresholdType::Trunc,
        3 => ThresholdType::ToZero,
        4 => ThresholdType::ToZeroInv,
        _ => ThresholdType::Binary,
    };

    let method = params.choice("method");
    let result = match method {
        5 => imgproc::adaptive_threshold(
            &gray,
            maxval,
            AdaptiveMethod::MeanC,
            ThresholdType::Binary,
            block_size,
            c,
        )?,
        6 => imgproc::adaptive_threshold(
            &gray,
            maxval,
            AdaptiveMethod::GaussianC,
            ThresholdType::Binary,
            block_size,
            c,
        )?,
        7 => imgproc::threshold_otsu(&gray, maxval, ThresholdType::Binary).1,
        8 => imgproc::threshold_triangle(&gray, maxval, ThresholdType::Binary).1,
        idx => {
            let typ = global_type(idx);
            // The auto-threshold flags override the manual slider.
            if params.flag("otsu") {
                imgproc::threshold_otsu(&gray, maxval, typ).1
            } else if params.flag("triangle") {
                imgproc::threshold_triangle(&gray, maxval, typ).1
            } else {
                imgproc::threshold(&gray, thresh, maxval, typ)
            }
        }
    };

    Ok(match_channels(src, result))
}

const MORPH_OPERATIONS: &[&str] = &[
    "Erode",
    "Dilate",
    "Open",
    "Close",
    "Gradient",
    "Top Hat",
    "Black Hat",
];

const MORPH_CONTROLS: &[ControlSpec] = &[
    ControlSpec::choice("operation", "Operation:", MORPH_OPERATIONS, 0),
    ControlSpec::choice("kernel_shape", "Kernel Shape:", &["Rectangle", "Cross", "Ellipse"], 0),
    ControlSpec::odd("kernel_size", "Kernel Size:", 1, 21, 5, 1),
    ControlSpec::int("iterations", "Iterations:", 1, 10, 1),
    ControlSpec::choice("border_type", "Border Type:", MORPH_BORDERS, 0),
    ControlSpec::int("border_value", "Border Value:", 0, 255, 0),
];

fn apply_morphology(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let op = match params.choice("operation") {
        1 => MorphType::Dilate,
        2 => MorphType::Open,
        3 => MorphType::Close,
        4 => MorphType::Gradient,
        5 => MorphType::TopHat,
        6 => MorphType::BlackHat,
        _ => MorphType::Erode,
    };
    let shape = match params.choice("kernel_shape") {
        1 => MorphShape::Cross,
        2 => MorphShape::Ellipse,
        _ => MorphShape::Rectangle,
    };
    let kernel_size = params.int("kernel_size") as u32;
    let iterations = params.int("iterations") as u32;
    let border = morph_border(
        params.choice("border_type"),
        params.int("border_value") as u8,
    );

    src.try_map_channels(|channel| {
        imgproc::morph_ex(channel, op, shape, kernel_size, iterations, border)
    })
}

const HSV_CONTROLS: &[ControlSpec] = &[
    ControlSpec::int("hue_shift", "Hue Shift:", -180, 180, 0),
    ControlSpec::scaled("hue_scale", "Hue Scale:", 50, 200, 100, 100),
    ControlSpec::int("sat_shift", "Saturation Shift:", -100, 100, 0),
    ControlSpec::scaled("sat_scale", "Saturation Scale:", 50, 200, 100, 100),
    ControlSpec::int("val_shift", "Value Shift:", -100, 100, 0),
    ControlSpec::scaled("val_scale", "Value Scale:", 50, 200, 100, 100),
];

fn apply_hsv(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let adjust = HsvAdjust {
        hue_shift: params.int("hue_shift") as f32,
        hue_scale: params.float("hue_scale") as f32,
        sat_shift: params.int("sat_shift") as f32,
        sat_scale: params.float("sat_scale") as f32,
        val_shift: params.int("val_shift") as f32,
        val_scale: params.float("val_scale") as f32,
    };
    Ok(Picture::Rgb(imgproc::adjust_hsv(&src.to_rgb(), &adjust)))
}

const BRIGHTNESS_CONTROLS: &[ControlSpec] = &[
    ControlSpec::int("brightness", "Brightness:", -127, 127, 0),
    ControlSpec::scaled("contrast", "Contrast:", 0, 300, 100, 100),
    ControlSpec::scaled("gamma", "Gamma:", 10, 300, 100, 100),
];

fn apply_brightness(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let lut = imgproc::brightness_contrast_lut(
        params.int("brightness") as i32,
        params.float("contrast") as f32,
        params.float("gamma") as f32,
    );
    Ok(src.map_channels(|channel| imgproc::apply_lut(channel, &lut)))
}

const HISTOGRAM_METHODS: &[&str] = &["None", "Normalize", "Stretch", "Equalization", "CLAHE"];

const HISTOGRAM_CONTROLS: &[ControlSpec] = &[
    ControlSpec::choice("method", "Method:", HISTOGRAM_METHODS, 0),
    ControlSpec::scaled("clip_limit", "Clip Limit:", 1, 40, 20, 10),
    ControlSpec::int("tile_grid_size", "Tile Grid Size:", 2, 16, 8),
    ControlSpec::int("stretch_min", "Lower Clip:", 0, 255, 0),
    ControlSpec::int("stretch_max", "Upper Clip:", 0, 255, 255),
];

fn apply_histogram(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let method = params.choice("method");
    let clip_limit = params.float("clip_limit") as f32;
    let tiles = params.int("tile_grid_size") as u32;
    // No ordering constraint between the clip points; an inverted pair
    // degenerates inside the operator.
    let lower = params.int("stretch_min") as u8;
    let upper = params.int("stretch_max") as u8;

    on_luma_plane(src, |plane| {
        Ok(match method {
            1 => imgproc::normalize_minmax(plane),
            2 => imgproc::stretch_clip(plane, lower, upper),
            3 => imgproc::histogram_equalization(plane),
            4 => imgproc::clahe(plane, clip_limit, tiles)?,
            _ => plane.clone(),
        })
    })
}

const DENOISE_CONTROLS: &[ControlSpec] = &[
    ControlSpec::int("filter_strength", "Filter Strength:", 1, 50, 10),
    ControlSpec::int("color_strength", "Color Strength:", 1, 50, 10),
    ControlSpec::odd("template_window", "Template Window:", 3, 11, 7, 3),
    ControlSpec::odd("search_window", "Search Window:", 3, 21, 21, 3),
];

fn apply_denoise(src: &Picture, params: &ParamSet) -> imgproc::Result<Picture> {
    let h = params.int("filter_strength") as f32;
    let h_color = params.int("color_strength") as f32;
    let template = params.int("template_window") as u32;
    let search = params.int("search_window") as u32;

    match src {
        Picture::Gray(g) => Ok(Picture::Gray(imgproc::nl_means_denoise(
            g, h, template, search,
        )?)),
        Picture::Rgb(rgb) => Ok(Picture::Rgb(imgproc::nl_means_denoise_colored(
            rgb, h, h_color, template, search,
        )?)),
    }
}

fn apply_grayscale(src: &Picture, _params: &ParamSet) -> imgproc::Result<Picture> {
    Ok(Picture::Gray(src.to_gray()))
}
