use image::RgbImage;

/// Per-pixel distance lookup on the most recent depth frame.
pub trait DepthProbe {
    /// Distance in metres at column `x`, row `y` of the depth image, or
    /// `None` for out-of-range coordinates and invalid samples.
    fn distance_at(&self, x: u32, y: u32) -> Option<f32>;
}

/// Mono sensor resolutions supported by the stereo rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorResolution {
    R400p,
    R800p,
}

impl SensorResolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            SensorResolution::R400p => (640, 400),
            SensorResolution::R800p => (1280, 800),
        }
    }
}

/// Calibration needed to turn disparity into physical distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGeometry {
    /// Focal length in pixels at the capture resolution.
    pub focal_px: f32,
    /// Distance between the two mono cameras in metres.
    pub baseline_m: f32,
}

impl Default for StereoGeometry {
    fn default() -> Self {
        // Typical values for a small USB stereo module at 400p.
        Self {
            focal_px: 441.25,
            baseline_m: 0.075,
        }
    }
}

impl StereoGeometry {
    /// Depth in millimetres for one disparity sample. Sub-half-pixel
    /// disparities are treated as invalid.
    pub fn depth_mm(&self, disparity_px: f32) -> Option<u16> {
        if disparity_px < 0.5 {
            return None;
        }
        let mm = self.focal_px * self.baseline_m * 1000.0 / disparity_px;
        Some(mm.clamp(0.0, u16::MAX as f32) as u16)
    }
}

/// A depth image in millimetres, row-major. Zero means "no measurement".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32, data: Vec<u16>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get_mm(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y * self.width + x) as usize])
    }

    /// Normalized false-color rendering for on-screen display. Valid samples
    /// ramp from red (near) to blue (far); missing samples stay black.
    pub fn colorize(&self) -> RgbImage {
        let valid = self.data.iter().copied().filter(|&v| v > 0);
        let min = valid.clone().min().unwrap_or(0);
        let max = valid.max().unwrap_or(0);
        let span = (max.saturating_sub(min)).max(1) as f32;

        let mut out = RgbImage::new(self.width, self.height);
        for (i, px) in out.pixels_mut().enumerate() {
            let mm = self.data[i];
            if mm == 0 {
                continue;
            }
            let t = (mm.saturating_sub(min)) as f32 / span;
            *px = cvlab_imgproc::hsv_to_rgb(t * 240.0, 1.0, 1.0);
        }
        out
    }
}

impl DepthProbe for DepthFrame {
    fn distance_at(&self, x: u32, y: u32) -> Option<f32> {
        match self.get_mm(x, y) {
            None | Some(0) => None,
            Some(mm) => Some(mm as f32 / 1000.0),
        }
    }
}
