use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use cvlab_core::Picture;
use cvlab_videoio::FrameSource;
use image::DynamicImage;

use crate::camera::CameraSession;
use crate::ops::{self, OperatorSpec};
use crate::panel::PanelSession;
use crate::state::{DisplaySurface, EditorState, NullDisplay};
use crate::{Result, StudioError};

/// Dispatcher between menu actions, panels and cameras, and the sole writer
/// of the editor state. Errors cross this boundary as values; a UI turns
/// them into modal notices and the shell stays usable either way.
pub struct Shell {
    state: EditorState,
    display: Box<dyn DisplaySurface>,
    panels: BTreeSet<String>,
    camera: Option<CameraSession>,
}

impl Shell {
    pub fn new(display: Box<dyn DisplaySurface>) -> Self {
        Self {
            state: EditorState::default(),
            display,
            panels: BTreeSet::new(),
            camera: None,
        }
    }

    /// Shell without a visible display surface.
    pub fn headless() -> Self {
        Self::new(Box::new(NullDisplay))
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Commit path: the picture is presented *and* becomes current output.
    pub fn display_image(&mut self, picture: Picture) {
        self.display.present(&picture);
        self.state.commit(picture);
    }

    /// Preview path: presented, visually indistinguishable from a commit,
    /// but the editor state keeps its previous output.
    pub fn preview_image(&mut self, picture: &Picture) {
        self.display.present(picture);
    }

    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        let decoded = image::open(path).map_err(|e| StudioError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;

        let picture = match decoded {
            DynamicImage::ImageLuma8(gray) => Picture::Gray(gray),
            other => Picture::Rgb(other.to_rgb8()),
        };

        tracing::info!(
            path = %path.display(),
            width = picture.width(),
            height = picture.height(),
            "image loaded"
        );

        self.display.present(&picture);
        self.state.set_loaded(picture, path.to_path_buf());
        Ok(())
    }

    /// Writes the current output to `path`, or to the remembered path when
    /// omitted. The path used becomes the new remembered path.
    pub fn save_image(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self
                .state
                .output_path()
                .map(Path::to_path_buf)
                .ok_or(StudioError::NoSavePath)?,
        };

        let output = self.state.output().ok_or(StudioError::NothingToSave)?;
        let written = match output {
            Picture::Gray(img) => img.save(&target),
            Picture::Rgb(img) => img.save(&target),
        };
        written.map_err(|e| StudioError::Write {
            path: target.clone(),
            source: e,
        })?;

        tracing::info!(path = %target.display(), "image saved");
        self.state.set_output_path(target.clone());
        Ok(target)
    }

    /// Stops any active camera, then starts the new source. On failure no
    /// camera is active and the attempt has fully unwound.
    pub fn switch_camera(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        self.stop_camera();

        match CameraSession::start(source) {
            Ok(session) => {
                tracing::info!("camera started");
                self.camera = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "camera start failed");
                Err(e)
            }
        }
    }

    pub fn stop_camera(&mut self) {
        if let Some(session) = self.camera.take() {
            session.stop();
            tracing::info!("camera stopped");
        }
    }

    pub fn camera_running(&self) -> bool {
        self.camera.is_some()
    }

    /// Periodic driver of the camera loop: pulls at most one frame per pull
    /// interval and displays it with commit semantics, exactly like the
    /// original timer-driven preview.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        let frame = match self.camera.as_mut() {
            Some(session) => session.poll(now)?,
            None => None,
        };

        if let Some(frame) = frame {
            self.display_image(frame);
        }
        Ok(())
    }

    /// Opens the named operator's panel. The revert target is the loaded
    /// image, or the latest camera frame when nothing is loaded; with
    /// neither, the open fails as a user-visible warning and nothing is
    /// registered.
    pub fn open_panel(&mut self, name: &str) -> Result<PanelSession> {
        let op = ops::operator(name).ok_or_else(|| StudioError::UnknownOperator(name.into()))?;
        self.open_panel_for(op)
    }

    pub fn open_panel_for(&mut self, op: &'static OperatorSpec) -> Result<PanelSession> {
        if self.panels.contains(op.name) {
            return Err(StudioError::PanelOpen(op.name.to_string()));
        }

        let snapshot = self
            .state
            .base()
            .cloned()
            .or_else(|| self.camera.as_ref().and_then(|c| c.last_frame().cloned()));

        let Some(snapshot) = snapshot else {
            tracing::warn!(panel = op.name, "no image loaded; panel not opened");
            return Err(StudioError::NoSourceImage);
        };

        self.panels.insert(op.name.to_string());
        tracing::debug!(panel = op.name, "panel opened");
        Ok(PanelSession::new(op, snapshot))
    }

    pub(crate) fn release_panel(&mut self, title: &str) {
        self.panels.remove(title);
        tracing::debug!(panel = title, "panel closed");
    }

    pub fn open_panels(&self) -> impl Iterator<Item = &str> {
        self.panels.iter().map(String::as_str)
    }

    /// Interactive probe: distance reading at column `x`, row `y` of the
    /// active depth source, formatted for transient display.
    pub fn probe_depth(&self, x: u32, y: u32) -> Option<String> {
        let distance = self.camera.as_ref()?.probe_distance(x, y)?;
        let message = format!("Depth at ({x}, {y}): {distance:.2} meters");
        tracing::info!(x, y, distance, "depth probe");
        Some(message)
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::headless()
    }
}
