use std::fs;
use std::path::{Path, PathBuf};

use cvlab_core::Picture;
use image::DynamicImage;

use crate::{FrameSource, Result, VideoError};

/// Replays a directory of PNG frames in filename order. The hardware-free
/// stand-in for a camera: tests and demos drive the exact frame-source
/// protocol against it.
#[derive(Debug)]
pub struct PngSequenceSource {
    directory: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    running: bool,
}

impl PngSequenceSource {
    pub fn new(directory: &Path) -> Self {
        Self {
            directory: directory.to_path_buf(),
            frames: Vec::new(),
            cursor: 0,
            looping: false,
            running: false,
        }
    }

    /// Restart from the first frame instead of running dry.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for PngSequenceSource {
    fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(VideoError::AlreadyRunning);
        }

        let mut frames: Vec<PathBuf> = fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(VideoError::Backend(format!(
                "no png frames in {}",
                self.directory.display()
            )));
        }

        self.frames = frames;
        self.cursor = 0;
        self.running = true;
        tracing::debug!(frames = self.frames.len(), dir = %self.directory.display(), "png sequence started");
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Picture>> {
        if !self.running {
            return Ok(None);
        }

        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let path = &self.frames[self.cursor];
        let decoded = image::open(path).map_err(|e| {
            VideoError::CaptureFailed(format!("failed to decode {}: {e}", path.display()))
        })?;
        self.cursor += 1;

        let picture = match decoded {
            DynamicImage::ImageLuma8(gray) => Picture::Gray(gray),
            other => Picture::Rgb(other.to_rgb8()),
        };
        Ok(Some(picture))
    }

    fn stop(&mut self) {
        self.running = false;
        self.frames.clear();
        self.cursor = 0;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
