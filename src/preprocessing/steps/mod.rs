//! Individual preprocessing steps

pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod normalize;
pub mod threshold;
