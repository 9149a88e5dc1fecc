use std::{
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
    time::Duration,
};

use image::{DynamicImage, ImageFormat, ImageReader};
use log::{debug, info};

use crate::{
    error::{Result, TamperError},
    metadata::exif::{ExifExtractor, ExifSummary},
};

pub const DEFAULT_ORIGINAL_URL: &str =
    "https://www.thestatesman.com/wp-content/uploads/2019/07/pan-card.jpg";
pub const DEFAULT_TAMPERED_URL: &str =
    "https://assets1.cleartax-cdn.com/s/img/20170526124335/Pan4.png";

/// Where an input image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
    Bytes { label: String, data: Vec<u8> },
}

impl ImageSource {
    pub fn load(&self, timeout: Duration) -> Result<LoadedImage> {
        let bytes = match self {
            ImageSource::Path(path) => std::fs::read(path)?,
            ImageSource::Url(url) => fetch(url, timeout)?,
            ImageSource::Bytes { data, .. } => data.clone(),
        };

        LoadedImage::decode(&bytes, self.to_string())
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(path) => write!(f, "{}", path.display()),
            ImageSource::Url(url) => write!(f, "{}", url),
            ImageSource::Bytes { label, .. } => write!(f, "{}", label),
        }
    }
}

/// An uploaded file takes precedence over the fallback URL.
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    pub upload: Option<PathBuf>,
    pub fallback_url: Option<String>,
}

impl InputSpec {
    pub fn new(upload: Option<PathBuf>, fallback_url: Option<String>) -> Self {
        Self { upload, fallback_url }
    }

    pub fn resolve(&self) -> Option<ImageSource> {
        if let Some(path) = &self.upload {
            return Some(ImageSource::Path(path.clone()));
        }

        self.fallback_url.clone().map(ImageSource::Url)
    }

    /// Resolves and loads. `Ok(None)` means the input is absent.
    pub fn load(&self, timeout: Duration) -> Result<Option<LoadedImage>> {
        self.resolve().map(|source| source.load(timeout)).transpose()
    }
}

/// A decoded input together with what was learned while decoding it.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
    pub width: u32,
    pub height: u32,
    pub origin: String,
    pub byte_len: usize,
    pub exif: Option<ExifSummary>,
}

impl LoadedImage {
    pub fn decode(bytes: &[u8], origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let image = reader.decode()?;

        info!(
            "Loaded {} ({:?}, {}x{}, {} bytes)",
            origin,
            format,
            image.width(),
            image.height(),
            bytes.len()
        );

        Ok(Self {
            width: image.width(),
            height: image.height(),
            image,
            format,
            origin,
            byte_len: bytes.len(),
            exif: ExifExtractor::extract_from_bytes(bytes),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ImageSource::Path(path.as_ref().to_path_buf()).load(Duration::ZERO)
    }

    pub fn from_image(image: DynamicImage, origin: impl Into<String>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            image,
            format: None,
            origin: origin.into(),
            byte_len: 0,
            exif: None,
        }
    }

    pub fn format_name(&self) -> &'static str {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("unknown")
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

fn fetch(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    debug!("Fetching {} (timeout {:?})", url, timeout);

    let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(TamperError::FetchStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response.bytes()?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_upload_wins_over_url() {
        let spec = InputSpec::new(Some(PathBuf::from("scan.png")), Some("https://example.com/a.png".into()));
        assert_eq!(spec.resolve(), Some(ImageSource::Path(PathBuf::from("scan.png"))));
    }

    #[test]
    fn test_url_used_without_upload() {
        let spec = InputSpec::new(None, Some(DEFAULT_TAMPERED_URL.into()));
        assert_eq!(spec.resolve(), Some(ImageSource::Url(DEFAULT_TAMPERED_URL.into())));
    }

    #[test]
    fn test_absent_input_loads_as_none() {
        let spec = InputSpec::default();
        assert!(spec.resolve().is_none());
        assert!(spec.load(Duration::from_secs(1)).unwrap().is_none());
    }

    #[test]
    fn test_decode_guesses_format_from_content() {
        let source = ImageSource::Bytes {
            label: "upload.jpg".into(),
            data: png_bytes(12, 7),
        };
        let loaded = source.load(Duration::ZERO).unwrap();

        assert_eq!(loaded.format, Some(ImageFormat::Png));
        assert_eq!(loaded.format_name(), "png");
        assert_eq!((loaded.width, loaded.height), (12, 7));
        assert_eq!(loaded.origin, "upload.jpg");
        assert!(loaded.exif.is_none());
    }

    #[test]
    fn test_corrupt_upload_is_an_error() {
        let source = ImageSource::Bytes {
            label: "broken".into(),
            data: b"\x89PNG\r\n\x1a\nnot really".to_vec(),
        };
        assert!(source.load(Duration::ZERO).is_err());
    }

    #[test]
    fn test_open_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, png_bytes(9, 5)).unwrap();

        let loaded = LoadedImage::open(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (9, 5));
        assert_eq!(loaded.byte_len, std::fs::metadata(&path).unwrap().len() as usize);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LoadedImage::open("/definitely/not/here.png");
        assert!(matches!(result, Err(TamperError::Io(_))));
    }
}
