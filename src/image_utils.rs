use image::{DynamicImage, GrayImage, Luma, RgbImage, imageops::FilterType};
use ndarray::Array2;

/// Resizes to exactly `width` x `height`, ignoring the source aspect ratio.
/// Any alpha channel is dropped.
pub fn resize_exact(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if image.width() == width && image.height() == height {
        return image.to_rgb8();
    }

    image.resize_exact(width, height, filter).to_rgb8()
}

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum = (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64)
            .round()
            .clamp(0.0, 255.0) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

/// Mirrors an out-of-range index back into `0..len` the way a half-sample
/// symmetric border does: `d c b a | a b c d | d c b a`.
pub fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }

    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }

    i as usize
}
