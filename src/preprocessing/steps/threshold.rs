use crate::error::PreprocessError;
use image::{DynamicImage, GrayImage, Luma};

/// Sauvola threshold parameters
const WINDOW_SIZE: u32 = 15;
const K: f64 = 0.2;
/// Dynamic range of the standard deviation for 8-bit images
const R: f64 = 128.0;

/// Apply Sauvola adaptive thresholding
/// Tolerates uneven lighting where a single global threshold would not
pub fn apply(image: &DynamicImage) -> Result<DynamicImage, PreprocessError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(sauvola(&gray, WINDOW_SIZE, K)))
}

/// Summed-area tables of pixel values and squared pixel values,
/// `(width + 1) * (height + 1)` entries each, row-major.
struct IntegralImages {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImages {
    fn new(img: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sum_sq = vec![0.0; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width {
                let v = img.get_pixel(x as u32, y as u32).0[0] as f64;
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }

        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// Mean and standard deviation over the inclusive window [x1..=x2, y1..=y2]
    fn window_stats(&self, x1: usize, y1: usize, x2: usize, y2: usize) -> (f64, f64) {
        let (x2, y2) = (x2 + 1, y2 + 1);
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        let at = |table: &[f64], x: usize, y: usize| table[y * self.stride + x];
        let rect = |table: &[f64]| {
            at(table, x2, y2) - at(table, x2, y1) - at(table, x1, y2) + at(table, x1, y1)
        };

        let mean = rect(&self.sum) / area;
        let variance = rect(&self.sum_sq) / area - mean * mean;
        (mean, variance.max(0.0).sqrt())
    }
}

/// threshold = mean * (1 + k * (std_dev / R - 1)) over a local window
fn sauvola(img: &GrayImage, window_size: u32, k: f64) -> GrayImage {
    let (width, height) = img.dimensions();
    let half = (window_size / 2) as usize;
    let integrals = IntegralImages::new(img);

    GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let x1 = x.saturating_sub(half);
        let y1 = y.saturating_sub(half);
        let x2 = (x + half).min(width as usize - 1);
        let y2 = (y + half).min(height as usize - 1);

        let (mean, std_dev) = integrals.window_stats(x1, y1, x2, y2);
        let threshold = mean * (1.0 + k * (std_dev / R - 1.0));

        let pixel = img.get_pixel(x as u32, y as u32).0[0] as f64;
        if pixel > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_binarizes_image() {
        let img = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));

        let result = apply(&DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        for pixel in result.pixels() {
            assert!(
                pixel.0[0] == 0 || pixel.0[0] == 255,
                "Expected binary pixel, got {}",
                pixel.0[0]
            );
        }
    }

    #[test]
    fn test_threshold_handles_text_pattern() {
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20]));
        }

        let result = apply(&DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        assert_eq!(result.get_pixel(25, 10).0[0], 0);
        assert_eq!(result.get_pixel(25, 5).0[0], 255);
    }

    #[test]
    fn test_threshold_tolerates_uneven_lighting() {
        // Background brightens left to right; dark strokes sit on both halves
        let mut img = GrayImage::from_fn(80, 30, |x, _| Luma([90 + (x as u8 * 2)]));
        for x in [10u32, 70] {
            for y in 10..20 {
                img.put_pixel(x, y, Luma([(90 + x as u8 * 2) / 3]));
            }
        }

        let result = apply(&DynamicImage::ImageLuma8(img)).unwrap().to_luma8();

        assert_eq!(result.get_pixel(10, 15).0[0], 0);
        assert_eq!(result.get_pixel(70, 15).0[0], 0);
        assert_eq!(result.get_pixel(40, 3).0[0], 255);
    }

    #[test]
    fn test_window_stats_uniform() {
        let img = GrayImage::from_pixel(5, 5, Luma([100]));
        let integrals = IntegralImages::new(&img);
        let (mean, std_dev) = integrals.window_stats(1, 1, 3, 3);
        assert!((mean - 100.0).abs() < 1e-9);
        assert!(std_dev.abs() < 1e-6);
    }
}
