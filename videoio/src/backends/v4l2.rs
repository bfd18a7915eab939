//! Video4Linux2 webcam backend

use cvlab_core::Picture;
use image::RgbImage;
use v4l::buffer::Type;
use v4l::format::FourCC;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{FrameSource, Result, VideoError};

/// Requested device and stream parameters; the driver may adjust the
/// resolution, in which case frames carry the negotiated size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebcamConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

pub struct WebcamSource {
    config: WebcamConfig,
    device: Option<Device>,
    stream: Option<MmapStream<'static>>,
    frame_width: u32,
    frame_height: u32,
}

impl std::fmt::Debug for WebcamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebcamSource")
            .field("config", &self.config)
            .field("stream_active", &self.stream.is_some())
            .finish()
    }
}

impl WebcamSource {
    pub fn new(config: WebcamConfig) -> Self {
        Self {
            config,
            device: None,
            stream: None,
            frame_width: 0,
            frame_height: 0,
        }
    }
}

impl FrameSource for WebcamSource {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(VideoError::AlreadyRunning);
        }

        let device = Device::new(self.config.device_index as usize)
            .map_err(|e| VideoError::Backend(format!("failed to open device: {e}")))?;

        let mut fmt = device
            .format()
            .map_err(|e| VideoError::Backend(format!("failed to get format: {e}")))?;
        fmt.width = self.config.width;
        fmt.height = self.config.height;
        fmt.fourcc = FourCC::new(b"YUYV");

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| VideoError::Backend(format!("failed to set format: {e}")))?;

        // Frame-rate is advisory; drivers that cannot honor it still stream.
        let _ = device.set_params(&v4l::video::capture::Parameters::with_fps(self.config.fps));

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)
            .map_err(|e| VideoError::Backend(format!("failed to create stream: {e}")))?;

        // Only publish state once everything opened; an early return above
        // drops the partially configured device.
        self.frame_width = negotiated.width;
        self.frame_height = negotiated.height;
        self.device = Some(device);
        self.stream = Some(stream);

        tracing::debug!(
            index = self.config.device_index,
            width = self.frame_width,
            height = self.frame_height,
            "webcam started"
        );
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Picture>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        let (data, _metadata) = stream
            .next()
            .map_err(|e| VideoError::CaptureFailed(format!("failed to grab frame: {e}")))?;

        let rgb = yuyv_to_rgb(data, self.frame_width, self.frame_height);
        Ok(Some(Picture::Rgb(rgb)))
    }

    fn stop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(index = self.config.device_index, "webcam stopped");
        }
        self.stream = None;
        self.device = None;
    }

    fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

/// YUYV 4:2:2 to RGB, BT.601 limited range.
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    let pixels = (width * height) as usize;

    for i in 0..pixels {
        let pair = i / 2;
        let base = pair * 4;
        if base + 3 >= data.len() {
            break;
        }

        let y = data[base + if i % 2 == 0 { 0 } else { 2 }] as f32;
        let u = data[base + 1] as f32 - 128.0;
        let v = data[base + 3] as f32 - 128.0;

        let c = (y - 16.0).max(0.0) * 1.164;
        let px = &mut out.as_mut()[i * 3..i * 3 + 3];
        px[0] = (c + 1.596 * v).clamp(0.0, 255.0) as u8;
        px[1] = (c - 0.392 * u - 0.813 * v).clamp(0.0, 255.0) as u8;
        px[2] = (c + 2.017 * u).clamp(0.0, 255.0) as u8;
    }

    out
}
