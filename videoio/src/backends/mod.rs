//! Capture backends

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub mod v4l2;

pub mod png_sequence;

pub use png_sequence::PngSequenceSource;

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub use v4l2::{WebcamConfig, WebcamSource};
