use crate::error::PreprocessError;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Largest rotation this step will correct, in degrees
pub const MAX_SKEW_DEGREES: f32 = 15.0;
/// Coarse search increment in degrees
const COARSE_STEP: f32 = 0.5;
/// Fine search increment around the coarse optimum
const FINE_STEP: f32 = 0.1;
/// Angles below this are not worth resampling the image for
const MIN_CORRECTION_DEGREES: f32 = 0.1;
/// Skew detection runs on a copy no larger than this on either side
const DETECTION_MAX_DIMENSION: u32 = 1000;
/// Pixels darker than this count as ink
const INK_LEVEL: u8 = 128;

/// Deskew image by detecting and correcting rotation within ±15°.
/// Larger rotations are left uncorrected.
pub fn apply(image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
    let gray = image.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(PreprocessError::step("deskew", "image has no pixels"));
    }

    let Some(angle) = detect_skew_angle(&gray) else {
        return Ok(DynamicImage::ImageLuma8(gray));
    };

    if angle.to_degrees().abs() < MIN_CORRECTION_DEGREES {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    tracing::debug!("Correcting skew of {:.2}°", angle.to_degrees());

    // Nearest keeps binarized input binary; fill with white background
    let rotated = rotate_about_center(&gray, angle, Interpolation::Nearest, Luma([255u8]));
    Ok(DynamicImage::ImageLuma8(rotated))
}

/// Detect the rotation (radians, clockwise as `rotate_about_center` applies
/// it) that best aligns text lines with rows.
///
/// Returns `None` when there is no ink or when the best angle sits at the
/// edge of the search range, meaning the real skew is probably larger than
/// this step is allowed to correct.
fn detect_skew_angle(img: &GrayImage) -> Option<f32> {
    let sample = detection_sample(img);
    let ink = ink_offsets(&sample);
    if ink.is_empty() {
        return None;
    }
    // Enough rows for any rotation of the sample
    let rows = (sample.width() + sample.height()) as usize * 2;

    let mut best_angle = 0.0_f32;
    let mut best_score = projection_score(&ink, 0.0, rows);

    let steps = (MAX_SKEW_DEGREES / COARSE_STEP).round() as i32;
    for i in -steps..=steps {
        let angle = i as f32 * COARSE_STEP;
        let score = projection_score(&ink, angle.to_radians(), rows);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    if best_angle.abs() >= MAX_SKEW_DEGREES {
        tracing::debug!("Skew at or beyond ±{}°, leaving image uncorrected", MAX_SKEW_DEGREES);
        return None;
    }

    let coarse = best_angle;
    let fine_steps = (COARSE_STEP / FINE_STEP).round() as i32;
    for i in -fine_steps..=fine_steps {
        let angle = coarse + i as f32 * FINE_STEP;
        let score = projection_score(&ink, angle.to_radians(), rows);
        if score > best_score {
            best_score = score;
            best_angle = angle;
        }
    }

    Some(best_angle.to_radians())
}

/// Downscaled copy for detection; angles are scale-invariant
fn detection_sample(img: &GrayImage) -> GrayImage {
    let longest = img.width().max(img.height());
    if longest <= DETECTION_MAX_DIMENSION {
        return img.clone();
    }
    let scale = DETECTION_MAX_DIMENSION as f32 / longest as f32;
    let width = ((img.width() as f32 * scale) as u32).max(1);
    let height = ((img.height() as f32 * scale) as u32).max(1);
    image::imageops::resize(img, width, height, FilterType::Triangle)
}

/// Ink pixel positions relative to the image center
fn ink_offsets(img: &GrayImage) -> Vec<(f32, f32)> {
    let cx = img.width() as f32 / 2.0;
    let cy = img.height() as f32 / 2.0;
    img.enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] < INK_LEVEL)
        .map(|(x, y, _)| (x as f32 - cx, y as f32 - cy))
        .collect()
}

/// Variance of the horizontal projection profile after rotating ink by
/// `angle`. Aligned text concentrates ink into few rows, raising variance.
fn projection_score(ink: &[(f32, f32)], angle: f32, rows: usize) -> f32 {
    let (sin_a, cos_a) = angle.sin_cos();
    let offset = rows as f32 / 2.0;
    let mut counts = vec![0u32; rows];

    for &(dx, dy) in ink {
        let row = (dx * sin_a + dy * cos_a + offset).floor();
        if row >= 0.0 && (row as usize) < rows {
            counts[row as usize] += 1;
        }
    }

    let mean = ink.len() as f32 / rows as f32;
    counts
        .iter()
        .map(|&c| (c as f32 - mean).powi(2))
        .sum::<f32>()
        / rows as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White canvas with a one-pixel line through the center at `degrees`
    fn skewed_line(degrees: f32) -> GrayImage {
        let mut img = GrayImage::from_pixel(200, 200, Luma([255]));
        let slope = degrees.to_radians().tan();
        for x in 30..170u32 {
            let y = (100.0 + (x as f32 - 100.0) * slope).round() as u32;
            img.put_pixel(x, y, Luma([0]));
        }
        img
    }

    fn inked_rows(img: &GrayImage) -> usize {
        (0..img.height())
            .filter(|&y| (0..img.width()).any(|x| img.get_pixel(x, y).0[0] < INK_LEVEL))
            .count()
    }

    #[test]
    fn test_deskew_detects_zero_angle_for_straight_image() {
        let angle = detect_skew_angle(&skewed_line(0.0)).unwrap();
        assert!(
            angle.abs() < 0.5_f32.to_radians(),
            "Expected near-zero angle, got {} radians",
            angle
        );
    }

    #[test]
    fn test_deskew_detects_small_skew() {
        let angle = detect_skew_angle(&skewed_line(5.0)).unwrap();
        let degrees = angle.to_degrees().abs();
        assert!((degrees - 5.0).abs() < 1.0, "Expected ~5°, got {}°", degrees);
    }

    #[test]
    fn test_deskew_leaves_large_rotation_uncorrected() {
        assert_eq!(detect_skew_angle(&skewed_line(30.0)), None);

        let img = skewed_line(30.0);
        let result = apply(&DynamicImage::ImageLuma8(img.clone()))
            .unwrap()
            .to_luma8();
        assert_eq!(result, img);
    }

    #[test]
    fn test_deskew_straightens_skewed_line() {
        let img = skewed_line(5.0);
        let before = inked_rows(&img);

        let result = apply(&DynamicImage::ImageLuma8(img)).unwrap().to_luma8();
        let after = inked_rows(&result);

        assert!(after * 2 < before, "rows with ink: {} -> {}", before, after);
    }

    #[test]
    fn test_deskew_blank_image_is_unchanged() {
        let img = GrayImage::from_pixel(100, 50, Luma([255]));
        let result = apply(&DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(result.width(), 100);
        assert_eq!(result.height(), 50);
    }
}
