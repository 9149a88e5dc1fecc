pub mod visualization;

use std::path::PathBuf;

use serde::Serialize;

use crate::{
    ComparisonOutcome, MISSING_INPUT_WARNING, Region, metadata::exif::ExifSummary,
    source::LoadedImage,
};

#[derive(Serialize)]
pub struct JsonReport {
    pub status: ReportStatus,
    pub original: Option<InputSection>,
    pub tampered: Option<InputSection>,
    pub comparison: Option<ComparisonSection>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    MissingInput,
}

#[derive(Serialize)]
pub struct InputSection {
    pub origin: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
    pub exif: Option<ExifSummary>,
}

#[derive(Serialize)]
pub struct ComparisonSection {
    pub ssim: f64,
    pub otsu_threshold: u8,
    pub region_count: usize,
    pub regions: Vec<Region>,
    pub aspect_ratio_mismatch: bool,
    pub saved_files: Vec<PathBuf>,
}

impl From<&LoadedImage> for InputSection {
    fn from(image: &LoadedImage) -> Self {
        Self {
            origin: image.origin.clone(),
            format: image.format_name().to_string(),
            width: image.width,
            height: image.height,
            byte_len: image.byte_len,
            exif: image.exif.clone(),
        }
    }
}

impl JsonReport {
    pub fn from_outcome(
        original: Option<&LoadedImage>,
        tampered: Option<&LoadedImage>,
        outcome: &ComparisonOutcome,
    ) -> Self {
        match outcome {
            ComparisonOutcome::MissingInput { .. } => Self {
                status: ReportStatus::MissingInput,
                original: original.map(InputSection::from),
                tampered: tampered.map(InputSection::from),
                comparison: None,
                warning: Some(MISSING_INPUT_WARNING.to_string()),
            },
            ComparisonOutcome::Completed(result) => Self {
                status: ReportStatus::Completed,
                original: original.map(InputSection::from),
                tampered: tampered.map(InputSection::from),
                comparison: Some(ComparisonSection {
                    ssim: result.score,
                    otsu_threshold: result.threshold,
                    region_count: result.regions.len(),
                    regions: result.regions.clone(),
                    aspect_ratio_mismatch: result.aspect_ratio_mismatch,
                    saved_files: result.saved_files.clone(),
                }),
                warning: None,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Console rendering: raw input details, then the score, then the regions and
/// every written artifact. A missing input renders as the warning alone.
pub fn render_text(
    original: Option<&LoadedImage>,
    tampered: Option<&LoadedImage>,
    outcome: &ComparisonOutcome,
    artifact_paths: &[PathBuf],
) -> String {
    let result = match outcome {
        ComparisonOutcome::MissingInput { .. } => return format!("WARNING: {}\n", MISSING_INPUT_WARNING),
        ComparisonOutcome::Completed(result) => result,
    };

    let mut lines = Vec::new();

    for (label, image) in [("Original", original), ("Tampered", tampered)] {
        if let Some(image) = image {
            lines.push(format!("{} image: {}", label, image.origin));
            lines.push(format!("{} image format: {}", label, image.format_name()));
            lines.push(format!("{} image size: ({}, {})", label, image.width, image.height));
            if let Some(exif) = &image.exif {
                lines.extend(
                    exif.suspicious_indicators
                        .iter()
                        .map(|indicator| format!("{} EXIF: {}", label, indicator)),
                );
            }
        }
    }

    lines.push(format!("SSIM: {}", result.score));

    if result.aspect_ratio_mismatch {
        lines.push("Note: inputs have different aspect ratios; both were stretched to the same size".to_string());
    }

    if result.regions.is_empty() {
        lines.push("No differing regions found".to_string());
    } else {
        lines.push(format!("Differing regions ({}):", result.regions.len()));
        lines.extend(
            result.regions
                .iter()
                .map(|r| format!("  x={} y={} w={} h={}", r.x, r.y, r.width, r.height)),
        );
    }

    lines.extend(
        result.saved_files
            .iter()
            .chain(artifact_paths)
            .map(|path| format!("Wrote {}", path.display())),
    );

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TamperConfig, TamperDetector};
    use image::{DynamicImage, Rgb, RgbImage};

    fn loaded(name: &str) -> LoadedImage {
        LoadedImage::from_image(
            DynamicImage::ImageRgb8(RgbImage::from_fn(250, 160, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, 90])
            })),
            name,
        )
    }

    fn detector() -> TamperDetector {
        TamperDetector::new().with_config(TamperConfig {
            persist_resized: false,
            ..TamperConfig::default()
        })
    }

    #[test]
    fn test_missing_input_renders_warning_only() {
        let original = loaded("a.png");
        let outcome = detector().run(Some(&original), None).unwrap();

        let text = render_text(Some(&original), None, &outcome, &[]);
        assert_eq!(text, format!("WARNING: {}\n", MISSING_INPUT_WARNING));

        let report = JsonReport::from_outcome(Some(&original), None, &outcome);
        assert_eq!(report.status, ReportStatus::MissingInput);
        assert!(report.comparison.is_none());
        assert!(report.to_json().unwrap().contains("missing_input"));
    }

    #[test]
    fn test_completed_report_order() {
        let original = loaded("a.png");
        let tampered = loaded("b.png");
        let outcome = detector().run(Some(&original), Some(&tampered)).unwrap();

        let text = render_text(Some(&original), Some(&tampered), &outcome, &[]);
        let original_at = text.find("Original image format").unwrap();
        let tampered_at = text.find("Tampered image format").unwrap();
        let ssim_at = text.find("SSIM: 1").unwrap();
        assert!(original_at < tampered_at && tampered_at < ssim_at);
        assert!(text.contains("Original image size: (250, 160)"));
        assert!(text.contains("No differing regions found"));
    }

    #[test]
    fn test_region_list_and_written_files() {
        let original = loaded("a.png");
        let mut tampered = loaded("b.png");
        if let DynamicImage::ImageRgb8(img) = &mut tampered.image {
            for y in 50..80 {
                for x in 100..140 {
                    img.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        tampered.exif = Some(ExifSummary {
            suspicious_indicators: vec!["Edited with: GIMP 2.10".to_string()],
            ..ExifSummary::default()
        });
        let outcome = detector().run(Some(&original), Some(&tampered)).unwrap();
        let regions = outcome.result().unwrap().regions.len();
        assert!(regions > 0);

        let text = render_text(
            Some(&original),
            Some(&tampered),
            &outcome,
            &[PathBuf::from("sheet.png")],
        );
        let lines: Vec<&str> = text.lines().collect();

        assert!(text.ends_with("Wrote sheet.png\n"));
        assert!(!text.contains("\n\n"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("  x=")).count(), regions);
        assert!(lines.contains(&format!("Differing regions ({}):", regions).as_str()));

        let size_at = lines.iter().position(|l| l.starts_with("Tampered image size")).unwrap();
        assert_eq!(lines[size_at + 1], "Tampered EXIF: Edited with: GIMP 2.10");
    }

    #[test]
    fn test_json_report_fields() {
        let original = loaded("a.png");
        let tampered = loaded("b.png");
        let outcome = detector().run(Some(&original), Some(&tampered)).unwrap();

        let json = JsonReport::from_outcome(Some(&original), Some(&tampered), &outcome)
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["status"], "completed");
        assert_eq!(value["comparison"]["ssim"], 1.0);
        assert_eq!(value["comparison"]["region_count"], 0);
        assert_eq!(value["original"]["width"], 250);
        assert_eq!(value["original"]["format"], "unknown");
    }
}
