pub mod color;
pub mod convolve;
pub mod denoise;
pub mod edges;
pub mod histogram;
pub mod morph;
pub mod threshold;

pub use color::*;
pub use convolve::*;
pub use denoise::*;
pub use edges::*;
pub use histogram::*;
pub use morph::*;
pub use threshold::*;

pub type Result<T> = std::result::Result<T, ImgprocError>;

#[derive(Debug, thiserror::Error)]
pub enum ImgprocError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
}

pub(crate) fn ensure_odd(name: &str, value: u32, floor: u32) -> Result<()> {
    if value < floor || value % 2 == 0 {
        return Err(ImgprocError::InvalidParameters(format!(
            "{name} must be an odd value >= {floor}, got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_same_dimensions(a: (u32, u32), b: (u32, u32)) -> Result<()> {
    if a != b {
        return Err(ImgprocError::DimensionMismatch(format!(
            "{}x{} vs {}x{}",
            a.0, a.1, b.0, b.1
        )));
    }
    Ok(())
}
