use crate::error::PreprocessError;
use image::DynamicImage;

/// Convert image to 8-bit grayscale, the canonical pixel format for the
/// remaining steps
pub fn apply(image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::step("grayscale", "image has no pixels"));
    }
    Ok(DynamicImage::ImageLuma8(image.to_luma8()))
}
