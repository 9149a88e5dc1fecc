use std::io::Cursor;

use serde::Serialize;

/// EXIF fields relevant when judging whether a scan was edited.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExifSummary {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub software: Option<String>,
    pub date_time: Option<String>,
    pub tag_count: usize,
    pub suspicious_indicators: Vec<String>,
}

pub struct ExifExtractor;

impl ExifExtractor {
    /// Returns `None` when the container carries no EXIF block, which is the
    /// normal case for PNG exports.
    pub fn extract_from_bytes(bytes: &[u8]) -> Option<ExifSummary> {
        let mut cursor = Cursor::new(bytes);
        let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;

        Some(Self::summarize(&exif))
    }

    fn summarize(exif: &exif::Exif) -> ExifSummary {
        let field = |tag: exif::Tag| {
            exif.get_field(tag, exif::In::PRIMARY)
                .map(|f| f.display_value().to_string().trim_matches('"').to_string())
        };

        let camera_make = field(exif::Tag::Make);
        let camera_model = field(exif::Tag::Model);
        let software = field(exif::Tag::Software);
        let date_time = field(exif::Tag::DateTime);

        let mut suspicious_indicators = Vec::new();

        if let Some(ref sw) = software {
            let sw_lower = sw.to_lowercase();
            if sw_lower.contains("photoshop") || sw_lower.contains("paint") || sw_lower.contains("gimp") {
                suspicious_indicators.push(format!("Edited with: {}", sw));
            }
        }

        if field(exif::Tag::DateTimeOriginal).is_none() && date_time.is_some() {
            suspicious_indicators.push("Original datetime missing (may be stripped)".into());
        }

        if let (Some(original), Some(modified)) = (field(exif::Tag::DateTimeOriginal), date_time.as_ref()) {
            if &original != modified {
                suspicious_indicators.push(format!(
                    "Modification time {} differs from capture time {}",
                    modified, original
                ));
            }
        }

        ExifSummary {
            camera_make,
            camera_model,
            software,
            date_time,
            tag_count: exif.fields().count(),
            suspicious_indicators,
        }
    }
}
