use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::otsu_level;
use log::debug;

use crate::{Region, Segmentation};

/// Splits a difference map into "changed" and "unchanged" pixels with an Otsu
/// cutoff and reduces each external contour of the changed pixels to its
/// bounding box.
pub struct RegionSegmenter {
    min_area: u32,
}

impl RegionSegmenter {
    pub fn new() -> Self {
        Self { min_area: 0 }
    }

    /// Boxes smaller than `area` pixels are dropped. Zero keeps everything.
    pub fn with_min_area(mut self, area: u32) -> Self {
        self.min_area = area;
        self
    }

    pub fn segment(&self, difference_map: &GrayImage) -> Segmentation {
        let (threshold, mask) = threshold_mask(difference_map);
        let regions = bounding_regions(&mask, self.min_area);

        debug!("Otsu level {}, {} region(s)", threshold, regions.len());

        Segmentation {
            threshold,
            mask,
            regions,
        }
    }
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixels strictly above the Otsu level become 255, everything else 0.
pub fn threshold_mask(image: &GrayImage) -> (u8, GrayImage) {
    let level = otsu_level(image);

    let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    (level, mask)
}

/// Bounding boxes of the outermost contours of the non-zero pixels in `mask`,
/// ordered top-to-bottom then left-to-right.
///
/// The mask is traced inside a one-pixel zero frame so components touching the
/// image edge are still outer borders.
pub fn bounding_regions(mask: &GrayImage, min_area: u32) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let contours: Vec<Contour<u32>> = find_contours(&pad_with_background(mask));

    let mut regions = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| contour_bounds(c, width, height))
        .filter(|r| r.area() >= min_area as u64)
        .collect::<Vec<_>>();

    regions.sort_by_key(|r| (r.y, r.x, r.height, r.width));

    regions
}

fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);

    for (x, y, pixel) in mask.enumerate_pixels() {
        padded.put_pixel(x + 1, y + 1, *pixel);
    }

    padded
}

/// Bounds of a contour traced on the padded mask, mapped back to `mask`
/// coordinates.
fn contour_bounds(contour: &Contour<u32>, width: u32, height: u32) -> Option<Region> {
    let first = contour.points.first()?;

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let (min_x, min_y) = (min_x.saturating_sub(1), min_y.saturating_sub(1));
    let (max_x, max_y) = (max_x.saturating_sub(1), max_y.saturating_sub(1));

    if min_x >= width || min_y >= height {
        return None;
    }

    let max_x = max_x.min(width - 1);
    let max_y = max_y.min(height - 1);

    Some(Region {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
