use std::path::{Path, PathBuf};

use cvlab_core::Picture;

/// Render sink for the most recent image. Presenting is the same call for
/// previews and commits; only [`EditorState`] knows the difference.
pub trait DisplaySurface {
    fn present(&mut self, picture: &Picture);
}

/// Headless sink, for tests and non-interactive use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySurface for NullDisplay {
    fn present(&mut self, _picture: &Picture) {}
}

/// The single owner of "what image is loaded and what is its current
/// output". Previews deliberately have no way in here: only `set_loaded`
/// (file load / camera frame adoption) and `commit` change the output.
#[derive(Debug, Default)]
pub struct EditorState {
    base: Option<Picture>,
    output: Option<Picture>,
    output_path: Option<PathBuf>,
}

impl EditorState {
    /// The unprocessed image panels snapshot when they open.
    pub fn base(&self) -> Option<&Picture> {
        self.base.as_ref()
    }

    pub fn output(&self) -> Option<&Picture> {
        self.output.as_ref()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// A freshly loaded file replaces both the base and the current output,
    /// and re-targets saving at the loaded path.
    pub fn set_loaded(&mut self, picture: Picture, path: PathBuf) {
        self.base = Some(picture.clone());
        self.output = Some(picture);
        self.output_path = Some(path);
    }

    /// Commit semantics: the picture becomes the current output.
    pub fn commit(&mut self, picture: Picture) {
        self.output = Some(picture);
    }

    pub fn set_output_path(&mut self, path: PathBuf) {
        self.output_path = Some(path);
    }
}
