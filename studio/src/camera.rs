use std::time::{Duration, Instant};

use cvlab_core::Picture;
use cvlab_videoio::FrameSource;

use crate::throttle::Throttle;
use crate::Result;

/// Period of the display-refresh pull loop (~30 fps).
pub const FRAME_PULL_INTERVAL: Duration = Duration::from_millis(30);

/// Exclusive owner of one running frame source. Construction starts the
/// device; dropping or `stop` releases it, so a session can never be left
/// half-open.
#[derive(Debug)]
pub struct CameraSession {
    source: Box<dyn FrameSource>,
    pull_gate: Throttle,
    last_frame: Option<Picture>,
}

impl CameraSession {
    /// Starts the source. On failure the source is returned to its idle
    /// state and no session exists.
    pub fn start(mut source: Box<dyn FrameSource>) -> Result<Self> {
        source.start()?;
        Ok(Self {
            source,
            pull_gate: Throttle::new(FRAME_PULL_INTERVAL),
            last_frame: None,
        })
    }

    /// Rate-gated pull: at most one frame per pull interval, `None` inside
    /// the window or when the device has nothing ready.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Picture>> {
        if !self.pull_gate.try_fire(now) {
            return Ok(None);
        }

        let frame = self.source.poll_frame()?;
        if let Some(frame) = &frame {
            self.last_frame = Some(frame.clone());
        }
        Ok(frame)
    }

    /// Most recent frame delivered by this session; panels opened during
    /// streaming snapshot this.
    pub fn last_frame(&self) -> Option<&Picture> {
        self.last_frame.as_ref()
    }

    /// Depth reading at column `x`, row `y`, when the source is
    /// depth-capable and has produced a frame.
    pub fn probe_distance(&self, x: u32, y: u32) -> Option<f32> {
        self.source.depth_probe()?.distance_at(x, y)
    }

    pub fn stop(mut self) {
        self.source.stop();
    }
}
