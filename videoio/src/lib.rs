//! Pull-based frame acquisition.
//!
//! Every device behind this crate speaks the same protocol: configure,
//! `start`, poll frames without blocking, `stop`. Depth-capable sources
//! additionally expose a per-pixel distance probe.

use std::fmt::Debug;

use cvlab_core::Picture;

pub mod backends;
pub mod depth;
pub mod stereo;

pub use backends::PngSequenceSource;
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub use backends::{WebcamConfig, WebcamSource};
pub use depth::{DepthFrame, DepthProbe, SensorResolution, StereoGeometry};
pub use stereo::{BlockMatcher, DisparityMap, StereoConfig, StereoDepthSource};

pub type Result<T> = std::result::Result<T, VideoError>;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("source is already running")]
    AlreadyRunning,
}

/// Generic pull interface over heterogeneous capture devices.
///
/// Lifecycle is `Idle -> Running -> Idle`. `start` on a running source is
/// rejected with [`VideoError::AlreadyRunning`] and leaves the open stream
/// untouched; a failed `start` releases everything it opened before
/// returning. `stop` is idempotent, including before the first `start`.
pub trait FrameSource: Send + Debug {
    fn start(&mut self) -> Result<()>;

    /// Non-blocking poll: the latest available frame, or `None` when no
    /// frame is ready (or the source is idle / exhausted).
    fn poll_frame(&mut self) -> Result<Option<Picture>>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Per-pixel distance lookup for depth-capable sources.
    fn depth_probe(&self) -> Option<&dyn DepthProbe> {
        None
    }
}
