use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use image::{DynamicImage, GrayImage, Rgb, imageops::FilterType};
use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{segmentation::RegionSegmenter, ssim::SsimComparator},
    error::{Result, TamperError},
    image_utils::{resize_exact, rgb_to_gray},
    report::visualization::{Annotator, ArtifactSet},
    source::LoadedImage,
};

pub mod error;
pub mod image_utils;
pub mod analysis;
pub mod metadata;
pub mod report;
pub mod source;

pub const MISSING_INPUT_WARNING: &str = "Please upload both the original and tampered images.";

/// Relative difference in width/height ratio above which the two inputs are
/// reported as differently framed.
const ASPECT_RATIO_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TamperConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub resize_filter: ResizeFilter,
    pub window_size: u32,
    pub box_color: [u8; 3],
    pub box_thickness: u32,
    pub min_region_area: u32,
    pub parallel: bool,
    pub output_dir: PathBuf,
    pub persist_resized: bool,
    pub fetch_timeout_secs: u64,
}

impl Default for TamperConfig {
    fn default() -> Self {
        Self {
            target_width: 250,
            target_height: 160,
            resize_filter: ResizeFilter::CatmullRom,
            window_size: 7,
            box_color: [255, 0, 0],
            box_thickness: 2,
            min_region_area: 0,
            parallel: true,
            output_dir: PathBuf::from("pan_card_tampering/image"),
            persist_resized: true,
            fetch_timeout_secs: 30,
        }
    }
}

impl TamperConfig {
    /// Reads a JSON file; keys that are absent keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(TamperError::InvalidParameter(
                "Target size must be non-zero".into(),
            ));
        }

        if self.window_size < 3 || self.window_size % 2 == 0 {
            return Err(TamperError::InvalidParameter(format!(
                "SSIM window must be odd and at least 3, got {}",
                self.window_size
            )));
        }

        if self.target_width < self.window_size || self.target_height < self.window_size {
            return Err(TamperError::ImageTooSmall(self.window_size));
        }

        if self.box_thickness == 0 {
            return Err(TamperError::InvalidParameter(
                "Box thickness must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Compares a purported original document scan against a purported tampered
/// copy and locates the regions that differ.
pub struct TamperDetector {
    config: TamperConfig,
}

impl TamperDetector {
    pub fn new() -> Self {
        Self {
            config: TamperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TamperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TamperConfig {
        &self.config
    }

    /// Full pass over two decoded images: resize, grayscale, SSIM, threshold,
    /// contour boxes, annotation. Nothing is written to disk.
    pub fn compare_images(&self, original: &DynamicImage, tampered: &DynamicImage) -> Result<ComparisonResult> {
        self.config.validate()?;

        let (width, height) = (self.config.target_width, self.config.target_height);
        let filter = FilterType::from(self.config.resize_filter);

        let aspect_ratio_mismatch = aspect_ratios_differ(original, tampered);
        if aspect_ratio_mismatch {
            warn!(
                "Inputs are framed differently ({}x{} vs {}x{}); forced resize will distort the comparison",
                original.width(),
                original.height(),
                tampered.width(),
                tampered.height()
            );
        }

        let original_resized = resize_exact(original, width, height, filter);
        let tampered_resized = resize_exact(tampered, width, height, filter);

        let original_gray = rgb_to_gray(&original_resized);
        let tampered_gray = rgb_to_gray(&tampered_resized);

        let ssim = SsimComparator::new(self.config.window_size)?
            .with_parallel(self.config.parallel)
            .compare(&original_gray, &tampered_gray)?;

        let segmentation = RegionSegmenter::new()
            .with_min_area(self.config.min_region_area)
            .segment(&ssim.difference_map);

        let annotator = Annotator::new(Rgb(self.config.box_color), self.config.box_thickness);
        let annotated_original = annotator.annotate(&original_resized, &segmentation.regions);
        let annotated_tampered = annotator.annotate(&tampered_resized, &segmentation.regions);

        info!(
            "SSIM {:.6}, Otsu level {}, {} differing region(s)",
            ssim.score,
            segmentation.threshold,
            segmentation.regions.len()
        );

        Ok(ComparisonResult {
            score: ssim.score,
            threshold: segmentation.threshold,
            regions: segmentation.regions,
            aspect_ratio_mismatch,
            artifacts: ArtifactSet {
                original: original_resized,
                tampered: tampered_resized,
                annotated_original,
                annotated_tampered,
                difference_map: ssim.difference_map,
                threshold_mask: segmentation.mask,
            },
            saved_files: Vec::new(),
        })
    }

    /// Runs the comparison when both inputs are present; otherwise reports which
    /// ones are missing and computes nothing.
    pub fn run(&self, original: Option<&LoadedImage>, tampered: Option<&LoadedImage>) -> Result<ComparisonOutcome> {
        let (original, tampered) = match (original, tampered) {
            (Some(o), Some(t)) => (o, t),
            (o, t) => {
                warn!("{}", MISSING_INPUT_WARNING);
                return Ok(ComparisonOutcome::MissingInput {
                    original_missing: o.is_none(),
                    tampered_missing: t.is_none(),
                });
            }
        };

        let mut result = self.compare_images(&original.image, &tampered.image)?;

        if self.config.persist_resized {
            result.saved_files = result.artifacts.save_resized(&self.config.output_dir)?;
        }

        Ok(ComparisonOutcome::Completed(Box::new(result)))
    }
}

impl Default for TamperDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn aspect_ratios_differ(a: &DynamicImage, b: &DynamicImage) -> bool {
    let ratio = |img: &DynamicImage| img.width() as f64 / img.height().max(1) as f64;
    let (ra, rb) = (ratio(a), ratio(b));

    (ra - rb).abs() / ra.max(rb) > ASPECT_RATIO_TOLERANCE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

#[derive(Debug, Clone)]
pub struct SsimResult {
    pub score: f64,
    pub similarity_map: Array2<f64>,
    pub difference_map: GrayImage,
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub threshold: u8,
    pub mask: GrayImage,
    pub regions: Vec<Region>,
}

#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub score: f64,
    pub threshold: u8,
    pub regions: Vec<Region>,
    pub aspect_ratio_mismatch: bool,
    pub artifacts: ArtifactSet,
    pub saved_files: Vec<PathBuf>,
}

impl ComparisonResult {
    pub fn is_identical(&self) -> bool {
        (self.score - 1.0).abs() < 1e-9 && self.regions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ComparisonOutcome {
    MissingInput {
        original_missing: bool,
        tampered_missing: bool,
    },
    Completed(Box<ComparisonResult>),
}

impl ComparisonOutcome {
    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            ComparisonOutcome::Completed(result) => Some(result.as_ref()),
            ComparisonOutcome::MissingInput { .. } => None,
        }
    }
}
