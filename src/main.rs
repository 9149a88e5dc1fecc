use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use card_tamper::{
    ComparisonOutcome, TamperConfig, TamperDetector,
    error::Result,
    report::{JsonReport, render_text},
    source::{DEFAULT_ORIGINAL_URL, DEFAULT_TAMPERED_URL, InputSpec},
};
use clap::Parser;
use log::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Highlight the regions where a document scan differs from its original")]
struct Args {
    /// Original document image (png/jpg)
    #[arg(long)]
    original: Option<PathBuf>,

    /// Possibly tampered document image (png/jpg)
    #[arg(long)]
    tampered: Option<PathBuf>,

    /// Fetched when --original is not given
    #[arg(long, default_value = DEFAULT_ORIGINAL_URL)]
    original_url: String,

    /// Fetched when --tampered is not given
    #[arg(long, default_value = DEFAULT_TAMPERED_URL)]
    tampered_url: String,

    /// Never fall back to the URLs; a missing file is a missing input
    #[arg(long)]
    offline: bool,

    /// JSON file with comparison settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the resized original.png / tampered.png are written
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also write every artifact (annotated, difference, threshold) here
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Write all artifacts side by side into one image
    #[arg(long)]
    sheet: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// SSIM window size (odd)
    #[arg(long)]
    window: Option<u32>,

    /// Ignore differing regions smaller than this many pixels
    #[arg(long)]
    min_area: Option<u32>,

    /// Print a JSON report instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn build_config(&self) -> Result<TamperConfig> {
        let mut config = match &self.config {
            Some(path) => TamperConfig::from_json_file(path)?,
            None => TamperConfig::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(width) = self.width {
            config.target_width = width;
        }
        if let Some(height) = self.height {
            config.target_height = height;
        }
        if let Some(window) = self.window {
            config.window_size = window;
        }
        if let Some(area) = self.min_area {
            config.min_region_area = area;
        }

        config.validate()?;
        Ok(config)
    }

    fn input(&self, upload: Option<&Path>, url: &str) -> InputSpec {
        let fallback = (!self.offline).then(|| url.to_string());
        InputSpec::new(upload.map(Path::to_path_buf), fallback)
    }
}

/// `Ok(false)` when an input was missing and nothing was compared.
fn run(args: &Args) -> Result<bool> {
    let config = args.build_config()?;
    let timeout = config.fetch_timeout();

    let original = args.input(args.original.as_deref(), &args.original_url).load(timeout)?;
    let tampered = args.input(args.tampered.as_deref(), &args.tampered_url).load(timeout)?;

    let detector = TamperDetector::new().with_config(config);
    let outcome = detector.run(original.as_ref(), tampered.as_ref())?;

    let mut artifact_paths = Vec::new();
    if let Some(result) = outcome.result() {
        if let Some(dir) = &args.artifacts_dir {
            artifact_paths.extend(result.artifacts.save_all(dir)?);
        }
        if let Some(path) = &args.sheet {
            result.artifacts.comparison_sheet().save(path)?;
            artifact_paths.push(path.clone());
        }
    }

    if args.json {
        let report = JsonReport::from_outcome(original.as_ref(), tampered.as_ref(), &outcome);
        println!("{}", report.to_json()?);
    } else {
        print!(
            "{}",
            render_text(original.as_ref(), tampered.as_ref(), &outcome, &artifact_paths)
        );
    }

    Ok(matches!(outcome, ComparisonOutcome::Completed(_)))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_drops_fallback_urls() {
        let args = Args::parse_from(["card-tamper", "--offline", "--original", "a.png"]);

        assert!(args.input(args.original.as_deref(), &args.original_url).resolve().is_some());
        assert!(args.input(args.tampered.as_deref(), &args.tampered_url).resolve().is_none());
    }

    #[test]
    fn test_upload_wins_over_fallback_url() {
        let args = Args::parse_from(["card-tamper", "--tampered", "scan.jpg"]);

        let spec = args.input(args.tampered.as_deref(), &args.tampered_url);
        assert_eq!(spec.upload.as_deref(), Some(Path::new("scan.jpg")));
        assert_eq!(spec.fallback_url.as_deref(), Some(DEFAULT_TAMPERED_URL));

        let spec = args.input(args.original.as_deref(), &args.original_url);
        assert!(spec.upload.is_none());
        assert_eq!(spec.fallback_url.as_deref(), Some(DEFAULT_ORIGINAL_URL));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from(["card-tamper", "--width", "500", "--window", "11", "--min-area", "9"]);
        let config = args.build_config().unwrap();

        assert_eq!(config.target_width, 500);
        assert_eq!(config.target_height, 160);
        assert_eq!(config.window_size, 11);
        assert_eq!(config.min_region_area, 9);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        let args = Args::parse_from(["card-tamper", "--window", "4"]);
        assert!(args.build_config().is_err());
    }

    #[test]
    fn test_missing_input_is_not_compared() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "card-tamper".to_string(),
            "--offline".to_string(),
            "--output-dir".to_string(),
            dir.path().join("out").display().to_string(),
        ]);

        assert!(!run(&args).unwrap());
        assert!(!dir.path().join("out").exists());
    }
}
