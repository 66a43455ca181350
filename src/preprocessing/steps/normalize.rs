use crate::error::PreprocessError;
use image::{DynamicImage, Luma};

/// Stretch contrast so pixel values span the full 0-255 range
pub fn apply(image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
    let mut gray = image.to_luma8();

    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    // Uniform image: nothing to stretch
    if max <= min {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    let range = (max - min) as f32;
    let lut: Vec<u8> = (0..=255u16)
        .map(|v| {
            let v = (v as u8).clamp(min, max);
            ((v - min) as f32 / range * 255.0).round() as u8
        })
        .collect();

    for pixel in gray.pixels_mut() {
        *pixel = Luma([lut[pixel.0[0] as usize]]);
    }

    Ok(DynamicImage::ImageLuma8(gray))
}
