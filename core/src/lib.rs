pub mod picture;

pub use picture::*;
