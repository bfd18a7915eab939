use image::GrayImage;
use rayon::prelude::*;

use cvlab_core::Picture;

use crate::depth::{DepthFrame, DepthProbe, SensorResolution, StereoGeometry};
use crate::{FrameSource, Result, VideoError};

/// Disparity in pixels per left-image coordinate; 0 marks an invalid match.
#[derive(Debug, Clone)]
pub struct DisparityMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub max_disparity: u32,
}

impl DisparityMap {
    pub fn new(width: u32, height: u32, max_disparity: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
            max_disparity,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Winner-takes-all SAD block matcher over rectified mono pairs.
#[derive(Debug, Clone)]
pub struct BlockMatcher {
    pub block_size: u32,
    pub max_disparity: u32,
    /// Best cost must undercut the runner-up by this factor to count.
    pub uniqueness_ratio: f32,
}

impl Default for BlockMatcher {
    fn default() -> Self {
        Self {
            block_size: 11,
            max_disparity: 64,
            uniqueness_ratio: 0.95,
        }
    }
}

impl BlockMatcher {
    pub fn compute(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap> {
        if left.dimensions() != right.dimensions() {
            return Err(VideoError::InvalidParameters(
                "left and right images must share dimensions".into(),
            ));
        }
        if self.block_size % 2 == 0 || self.block_size < 3 {
            return Err(VideoError::InvalidParameters(format!(
                "block size must be odd and >= 3, got {}",
                self.block_size
            )));
        }

        let width = left.width() as usize;
        let height = left.height() as usize;
        let half = (self.block_size / 2) as usize;
        let max_d = self.max_disparity as usize;
        let left_data = left.as_raw();
        let right_data = right.as_raw();

        let mut map = DisparityMap::new(left.width(), left.height(), self.max_disparity);

        map.data
            .par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                if y < half || y + half >= height {
                    return;
                }

                for x in half..width.saturating_sub(half) {
                    let mut best_cost = u32::MAX;
                    let mut second_cost = u32::MAX;
                    let mut best_d = 0usize;

                    for d in 0..=max_d.min(x - half) {
                        let mut cost = 0u32;
                        for j in 0..self.block_size as usize {
                            let row_off = (y + j - half) * width;
                            for i in 0..self.block_size as usize {
                                let l = left_data[row_off + x + i - half];
                                let r = right_data[row_off + x + i - half - d];
                                cost += l.abs_diff(r) as u32;
                            }
                        }

                        if cost < best_cost {
                            second_cost = best_cost;
                            best_cost = cost;
                            best_d = d;
                        } else if cost < second_cost {
                            second_cost = cost;
                        }
                    }

                    let unique = second_cost == u32::MAX
                        || (best_cost as f32) < self.uniqueness_ratio * second_cost as f32;
                    if unique && best_cost != u32::MAX {
                        row[x] = best_d as f32;
                    }
                }
            });

        Ok(map)
    }
}

/// 3x3 median over valid disparity samples; knocks out isolated mismatches.
pub fn median_filter_disparity(map: &DisparityMap) -> DisparityMap {
    let width = map.width as usize;
    let height = map.height as usize;
    let mut out = map.clone();

    for y in 0..height {
        for x in 0..width {
            let mut window = [0.0f32; 9];
            let mut n = 0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
                    let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
                    window[n] = map.data[sy * width + sx];
                    n += 1;
                }
            }
            let window = &mut window[..n];
            window.sort_by(|a, b| a.total_cmp(b));
            out.data[y * width + x] = window[n / 2];
        }
    }

    out
}

/// Configuration of the stereo depth rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StereoConfig {
    pub resolution: SensorResolution,
    /// Doubles the disparity search range for close-range measurements.
    pub extended_disparity: bool,
    pub median_filter: bool,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            resolution: SensorResolution::R400p,
            extended_disparity: false,
            median_filter: true,
        }
    }
}

/// Depth-capable frame source: pulls synchronized mono pairs from two inner
/// sources, matches them, and yields a false-color depth image. The raw
/// depth of the newest frame stays available for the interactive probe.
#[derive(Debug)]
pub struct StereoDepthSource {
    left: Box<dyn FrameSource>,
    right: Box<dyn FrameSource>,
    config: StereoConfig,
    geometry: StereoGeometry,
    matcher: BlockMatcher,
    last_depth: Option<DepthFrame>,
    running: bool,
}

impl StereoDepthSource {
    pub fn new(
        left: Box<dyn FrameSource>,
        right: Box<dyn FrameSource>,
        config: StereoConfig,
        geometry: StereoGeometry,
    ) -> Self {
        let matcher = BlockMatcher {
            max_disparity: if config.extended_disparity { 128 } else { 64 },
            ..BlockMatcher::default()
        };

        Self {
            left,
            right,
            config,
            geometry,
            matcher,
            last_depth: None,
            running: false,
        }
    }

    /// Rig over two V4L2 mono cameras; the configured sensor resolution
    /// picks the capture size of both.
    #[cfg(all(target_os = "linux", feature = "v4l2"))]
    pub fn from_device_pair(
        left_index: u32,
        right_index: u32,
        config: StereoConfig,
        geometry: StereoGeometry,
    ) -> Self {
        use crate::backends::{WebcamConfig, WebcamSource};

        let (width, height) = config.resolution.dimensions();
        let camera = |device_index| {
            Box::new(WebcamSource::new(WebcamConfig {
                device_index,
                width,
                height,
                fps: 30,
            })) as Box<dyn FrameSource>
        };

        Self::new(camera(left_index), camera(right_index), config, geometry)
    }

    pub fn config(&self) -> &StereoConfig {
        &self.config
    }

    pub fn last_depth(&self) -> Option<&DepthFrame> {
        self.last_depth.as_ref()
    }
}

impl FrameSource for StereoDepthSource {
    fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(VideoError::AlreadyRunning);
        }

        self.left.start()?;
        if let Err(e) = self.right.start() {
            // Never leave a half-open rig behind.
            self.left.stop();
            return Err(e);
        }

        self.running = true;
        tracing::debug!(resolution = ?self.config.resolution, "stereo depth source started");
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Picture>> {
        if !self.running {
            return Ok(None);
        }

        let (left, right) = match (self.left.poll_frame()?, self.right.poll_frame()?) {
            (Some(l), Some(r)) => (l, r),
            // An unpaired frame is dropped rather than matched stale.
            _ => return Ok(None),
        };

        let left = left.to_gray();
        let right = right.to_gray();
        if left.dimensions() != right.dimensions() {
            return Err(VideoError::CaptureFailed(format!(
                "stereo pair size mismatch: {:?} vs {:?}",
                left.dimensions(),
                right.dimensions()
            )));
        }

        let mut disparity = self.matcher.compute(&left, &right)?;
        if self.config.median_filter {
            disparity = median_filter_disparity(&disparity);
        }

        let depth = disparity_to_depth(&disparity, &self.geometry);
        let display = depth.colorize();
        self.last_depth = Some(depth);

        Ok(Some(Picture::Rgb(display)))
    }

    fn stop(&mut self) {
        if self.running {
            tracing::debug!("stereo depth source stopped");
        }
        self.left.stop();
        self.right.stop();
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn depth_probe(&self) -> Option<&dyn DepthProbe> {
        self.last_depth.as_ref().map(|d| d as &dyn DepthProbe)
    }
}

/// Converts matched disparities to millimetre depth, zeroing samples outside
/// the valid disparity band.
pub fn disparity_to_depth(disparity: &DisparityMap, geometry: &StereoGeometry) -> DepthFrame {
    let mut data = Vec::with_capacity(disparity.data.len());

    for &d in &disparity.data {
        let mm = if d < 0.5 || d >= disparity.max_disparity as f32 {
            0
        } else {
            geometry.depth_mm(d).unwrap_or(0)
        };
        data.push(mm);
    }

    DepthFrame::new(disparity.width, disparity.height, data)
}
