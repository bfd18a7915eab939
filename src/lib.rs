pub use cvlab_core as core;
pub use cvlab_imgproc as imgproc;
pub use cvlab_studio as studio;
pub use cvlab_videoio as videoio;
