use image::{GrayImage, Luma};
use log::debug;
use ndarray::{Array2, Zip, s};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    SsimResult,
    error::{Result, TamperError},
    image_utils::{gray_to_array, reflect_index},
};

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Windowed structural similarity between two same-size grayscale images.
///
/// Local statistics come from a uniform `window_size` x `window_size` filter with
/// mirrored borders. The scalar score is the mean of the similarity map with a
/// border of `(window_size - 1) / 2` pixels left out, clamped to `[0, 1]`.
pub struct SsimComparator {
    window_size: u32,
    parallel: bool,
}

impl SsimComparator {
    pub fn new(window_size: u32) -> Result<Self> {
        if window_size < 3 || window_size % 2 == 0 {
            return Err(TamperError::InvalidParameter(format!(
                "SSIM window must be odd and at least 3, got {}",
                window_size
            )));
        }

        Ok(Self {
            window_size,
            parallel: true,
        })
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn compare(&self, original: &GrayImage, tampered: &GrayImage) -> Result<SsimResult> {
        let (width, height) = original.dimensions();
        let (other_width, other_height) = tampered.dimensions();

        if (width, height) != (other_width, other_height) {
            return Err(TamperError::DimensionMismatch(
                width,
                height,
                other_width,
                other_height,
            ));
        }

        if width < self.window_size || height < self.window_size {
            return Err(TamperError::ImageTooSmall(self.window_size));
        }

        let a = gray_to_array(original);
        let b = gray_to_array(tampered);

        let similarity_map = self.similarity_map(&a, &b);

        let pad = ((self.window_size - 1) / 2) as usize;
        let (rows, cols) = similarity_map.dim();
        let score = similarity_map
            .slice(s![pad..rows - pad, pad..cols - pad])
            .mean()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);

        let difference_map = Self::difference_map(&similarity_map);

        debug!("SSIM window {} over {}x{}: {:.6}", self.window_size, width, height, score);

        Ok(SsimResult {
            score,
            similarity_map,
            difference_map,
        })
    }

    fn similarity_map(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let c1 = (K1 * DATA_RANGE).powi(2);
        let c2 = (K2 * DATA_RANGE).powi(2);
        let np = (self.window_size * self.window_size) as f64;
        let cov_norm = np / (np - 1.0);

        let ux = self.uniform_filter(a);
        let uy = self.uniform_filter(b);
        let uxx = self.uniform_filter(&(a * a));
        let uyy = self.uniform_filter(&(b * b));
        let uxy = self.uniform_filter(&(a * b));

        let mut map = Array2::<f64>::zeros(a.dim());

        Zip::from(&mut map)
            .and(&ux)
            .and(&uy)
            .and(&uxx)
            .and(&uyy)
            .and(&uxy)
            .for_each(|s, &mx, &my, &mxx, &myy, &mxy| {
                let vx = cov_norm * (mxx - mx * mx);
                let vy = cov_norm * (myy - my * my);
                let vxy = cov_norm * (mxy - mx * my);

                let numerator = (2.0 * mx * my + c1) * (2.0 * vxy + c2);
                let denominator = (mx * mx + my * my + c1) * (vx + vy + c2);

                *s = numerator / denominator;
            });

        map
    }

    /// 8-bit dissimilarity: `round(clamp(1 - s, 0, 1) * 255)`.
    fn difference_map(similarity: &Array2<f64>) -> GrayImage {
        let (height, width) = similarity.dim();

        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let s = similarity[[y as usize, x as usize]];
            let d = (1.0 - s).clamp(0.0, 1.0);
            Luma([(d * 255.0).round() as u8])
        })
    }

    /// Separable box mean, horizontal pass then vertical pass.
    fn uniform_filter(&self, input: &Array2<f64>) -> Array2<f64> {
        let (height, width) = input.dim();
        let radius = (self.window_size / 2) as isize;
        let norm = self.window_size as f64;

        let rows = self.map_rows(height, |y| {
            (0..width)
                .map(|x| {
                    let mut sum = 0.0;
                    for k in -radius..=radius {
                        sum += input[[y, reflect_index(x as isize + k, width)]];
                    }
                    sum / norm
                })
                .collect()
        });
        let horizontal = Array2::from_shape_fn((height, width), |(y, x)| rows[y][x]);

        let rows = self.map_rows(height, |y| {
            (0..width)
                .map(|x| {
                    let mut sum = 0.0;
                    for k in -radius..=radius {
                        sum += horizontal[[reflect_index(y as isize + k, height), x]];
                    }
                    sum / norm
                })
                .collect()
        });

        Array2::from_shape_fn((height, width), |(y, x)| rows[y][x])
    }

    fn map_rows<F>(&self, height: usize, row: F) -> Vec<Vec<f64>>
    where
        F: Fn(usize) -> Vec<f64> + Sync + Send,
    {
        if self.parallel {
            (0..height).into_par_iter().map(row).collect()
        } else {
            (0..height).map(row).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]))
    }

    #[test]
    fn test_window_validation() {
        assert!(SsimComparator::new(7).is_ok());
        assert!(SsimComparator::new(8).is_err());
        assert!(SsimComparator::new(1).is_err());
    }

    #[test]
    fn test_identical_images_score_one() {
        let image = gradient(64, 48);
        let result = SsimComparator::new(7).unwrap().compare(&image, &image).unwrap();

        assert!((result.score - 1.0).abs() < 1e-12);
        assert!(result.difference_map.pixels().all(|p| p[0] == 0));
        assert_eq!(result.difference_map.dimensions(), (64, 48));
    }

    #[test]
    fn test_flat_identical_images_score_one() {
        let image = GrayImage::from_pixel(20, 20, Luma([0]));
        let result = SsimComparator::new(7).unwrap().compare(&image, &image).unwrap();

        assert!((result.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_painted_region_lowers_score() {
        let original = gradient(80, 60);
        let mut tampered = original.clone();
        for y in 20..35 {
            for x in 30..50 {
                tampered.put_pixel(x, y, Luma([255]));
            }
        }

        let result = SsimComparator::new(7).unwrap().compare(&original, &tampered).unwrap();

        assert!(result.score < 1.0);
        assert!(result.score >= 0.0);
        assert!(result.difference_map.get_pixel(40, 27)[0] > 0);
        assert_eq!(result.difference_map.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn test_parallel_and_serial_agree() {
        let original = gradient(40, 30);
        let tampered = GrayImage::from_fn(40, 30, |x, y| Luma([((x * 5 + y * 11) % 256) as u8]));

        let parallel = SsimComparator::new(7).unwrap().compare(&original, &tampered).unwrap();
        let serial = SsimComparator::new(7)
            .unwrap()
            .with_parallel(false)
            .compare(&original, &tampered)
            .unwrap();

        assert_eq!(parallel.score.to_bits(), serial.score.to_bits());
        assert_eq!(parallel.difference_map, serial.difference_map);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let result = SsimComparator::new(7)
            .unwrap()
            .compare(&gradient(10, 10), &gradient(11, 10));
        assert!(matches!(result, Err(TamperError::DimensionMismatch(10, 10, 11, 10))));
    }

    #[test]
    fn test_too_small_is_rejected() {
        let result = SsimComparator::new(7)
            .unwrap()
            .compare(&gradient(5, 20), &gradient(5, 20));
        assert!(matches!(result, Err(TamperError::ImageTooSmall(7))));
    }
}
