use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use log::debug;

use crate::{Region, error::Result};

/// Outlines regions on a copy of an image.
#[derive(Debug, Clone, Copy)]
pub struct Annotator {
    color: Rgb<u8>,
    thickness: u32,
}

impl Annotator {
    pub fn new(color: Rgb<u8>, thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.max(1),
        }
    }

    pub fn annotate(&self, image: &RgbImage, regions: &[Region]) -> RgbImage {
        let mut vis = image.clone();

        for region in regions {
            self.draw_region_border(&mut vis, region);
        }

        vis
    }

    /// The innermost ring traces the region's own edge pixels; further rings grow
    /// outward. Anything outside the canvas is clipped.
    fn draw_region_border(&self, image: &mut RgbImage, region: &Region) {
        if region.width == 0 || region.height == 0 {
            return;
        }

        for t in 0..self.thickness {
            let rect = Rect::at(region.x as i32 - t as i32, region.y as i32 - t as i32)
                .of_size(region.width + 2 * t, region.height + 2 * t);
            draw_hollow_rect_mut(image, rect, self.color);
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(Rgb([255, 0, 0]), 2)
    }
}

/// Every image a comparison produces, at the target resolution.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub original: RgbImage,
    pub tampered: RgbImage,
    pub annotated_original: RgbImage,
    pub annotated_tampered: RgbImage,
    pub difference_map: GrayImage,
    pub threshold_mask: GrayImage,
}

impl ArtifactSet {
    pub const NAMES: [&'static str; 6] = [
        "original",
        "tampered",
        "annotated_original",
        "annotated_tampered",
        "difference",
        "threshold",
    ];

    /// Artifacts in presentation order.
    pub fn ordered(&self) -> [(&'static str, DynamicImage); 6] {
        [
            (Self::NAMES[0], DynamicImage::ImageRgb8(self.original.clone())),
            (Self::NAMES[1], DynamicImage::ImageRgb8(self.tampered.clone())),
            (Self::NAMES[2], DynamicImage::ImageRgb8(self.annotated_original.clone())),
            (Self::NAMES[3], DynamicImage::ImageRgb8(self.annotated_tampered.clone())),
            (Self::NAMES[4], DynamicImage::ImageLuma8(self.difference_map.clone())),
            (Self::NAMES[5], DynamicImage::ImageLuma8(self.threshold_mask.clone())),
        ]
    }

    /// Writes `original.png` and `tampered.png` into `directory`, replacing
    /// whatever a previous run left there.
    pub fn save_resized<P: AsRef<Path>>(&self, directory: P) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let original_path = directory.join("original.png");
        let tampered_path = directory.join("tampered.png");

        self.original.save(&original_path)?;
        self.tampered.save(&tampered_path)?;

        debug!("Saved resized inputs to {}", directory.display());

        Ok(vec![original_path, tampered_path])
    }

    pub fn save_all<P: AsRef<Path>>(&self, directory: P) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let mut paths = Vec::with_capacity(Self::NAMES.len());
        for (name, image) in self.ordered() {
            let path = directory.join(format!("{}.png", name));
            image.save(&path)?;
            paths.push(path);
        }

        Ok(paths)
    }

    /// All six artifacts on one canvas, three per row, in presentation order.
    pub fn comparison_sheet(&self) -> RgbImage {
        let padding = 10u32;
        let columns = 3u32;

        let tiles = self
            .ordered()
            .into_iter()
            .map(|(_, image)| image.to_rgb8())
            .collect::<Vec<_>>();

        let tile_width = tiles.iter().map(|t| t.width()).max().unwrap_or(0);
        let tile_height = tiles.iter().map(|t| t.height()).max().unwrap_or(0);
        let rows = (tiles.len() as u32).div_ceil(columns);

        let total_width = tile_width * columns + padding * (columns + 1);
        let total_height = tile_height * rows + padding * (rows + 1);

        let mut sheet = RgbImage::from_pixel(total_width, total_height, Rgb([40, 40, 40]));

        for (i, tile) in tiles.iter().enumerate() {
            let col = i as u32 % columns;
            let row = i as u32 / columns;
            let offset_x = padding + col * (tile_width + padding);
            let offset_y = padding + row * (tile_height + padding);
            copy_image_to(&mut sheet, tile, offset_x, offset_y);
        }

        sheet
    }
}

fn copy_image_to(dest: &mut RgbImage, src: &RgbImage, offset_x: u32, offset_y: u32) {
    let (dest_w, dest_h) = dest.dimensions();

    for (x, y, pixel) in src.enumerate_pixels() {
        let dx = offset_x + x;
        let dy = offset_y + y;
        if dx < dest_w && dy < dest_h {
            dest.put_pixel(dx, dy, *pixel);
        }
    }
}
