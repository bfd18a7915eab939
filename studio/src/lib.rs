//! The live-preview parameter-editing protocol and the application shell
//! that owns the current image, the active camera and the open panels.

use std::path::PathBuf;

pub mod camera;
pub mod controls;
pub mod ops;
pub mod panel;
pub mod shell;
pub mod state;
pub mod throttle;

pub use camera::{CameraSession, FRAME_PULL_INTERVAL};
pub use controls::{ControlKind, ControlSpec, ParamSet, ParamValue, RawValue};
pub use ops::{builtin_operators, operator, OperatorSpec};
pub use panel::{ChangeOutcome, PanelSession};
pub use shell::Shell;
pub use state::{DisplaySurface, EditorState, NullDisplay};
pub use throttle::{Throttle, PREVIEW_THROTTLE};

pub type Result<T> = std::result::Result<T, StudioError>;

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("no image loaded and no camera frame available")]
    NoSourceImage,

    #[error("panel '{0}' is already open")]
    PanelOpen(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("panel '{panel}' has no control '{control}'")]
    UnknownControl { panel: String, control: String },

    #[error("failed to decode image {}: {}", path.display(), source)]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to write image {}: {}", path.display(), source)]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("nothing to save yet")]
    NothingToSave,

    #[error("no save path set")]
    NoSavePath,

    #[error(transparent)]
    Device(#[from] cvlab_videoio::VideoError),

    #[error(transparent)]
    Operator(#[from] cvlab_imgproc::ImgprocError),
}
