//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod assess;
mod check;
mod extract;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use pagetext::{ConfigOverrides, ExtractConfig};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "pagetext.toml";

#[derive(Parser)]
#[command(name = "pagetext")]
#[command(about = "Layout-faithful PDF text extraction with batch OCR fallback")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML, defaults to ./pagetext.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from one or more PDFs
    Extract {
        /// PDF files to extract
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print JSON (pages, decision, OCR outcome, warnings) instead of text
        #[arg(long)]
        json: bool,
        /// Write raw and normalized OCR results to this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Show embedded-text quality and the OCR decision without calling the service
    Assess {
        /// PDF file to assess
        file: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Check external tools and recognition credentials
    Check,
}

/// Per-invocation overrides; each flag wins over the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct OverrideArgs {
    /// Minimum non-blank lines before a page is considered for OCR
    #[arg(long)]
    min_lines: Option<usize>,
    /// Fraction of flagged pages required to trigger OCR (0.0 - 1.0)
    #[arg(long)]
    ocr_ratio: Option<f64>,
    /// Embedded characters per page above which a page is treated as corrupted
    #[arg(long)]
    max_chars: Option<usize>,
    /// Never run OCR
    #[arg(long)]
    disable_ocr: bool,
    /// Ignore embedded text and OCR every page
    #[arg(long, conflicts_with = "disable_ocr")]
    suppress_embedded: bool,
    /// OCR request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Handwriting confidence needed for a character to count as handwritten
    #[arg(long)]
    handwritten_limit: Option<f32>,
    /// Skew (degrees) below which recognized coordinates are not unrotated
    #[arg(long)]
    min_rotation: Option<f64>,
    /// Width scale weight for OCR layout
    #[arg(long)]
    scale_weight: Option<f64>,
    /// Font height weight for OCR line grouping
    #[arg(long)]
    font_height_weight: Option<f64>,
    /// Keep blank lines between distant OCR lines
    #[arg(long)]
    preserve_vertical_whitespace: bool,
    /// Documents processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,
    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,
}

impl OverrideArgs {
    fn to_overrides(&self) -> ConfigOverrides {
        let flag = |set: bool| set.then_some(true);
        ConfigOverrides {
            min_lines_ocr_trigger: self.min_lines,
            trigger_ocr_page_ratio: self.ocr_ratio,
            max_chars_per_page: self.max_chars,
            disable_ocr: flag(self.disable_ocr),
            suppress_embedded: flag(self.suppress_embedded),
            timeout_secs: self.timeout,
            handwritten_confidence_limit: self.handwritten_limit,
            min_ocr_rotation_degrees: self.min_rotation,
            scale_weight: self.scale_weight,
            font_height_weight: self.font_height_weight,
            preserve_vertical_whitespace: flag(self.preserve_vertical_whitespace),
            max_workers: self.workers,
            disable_progress_bar: flag(self.no_progress),
            ..ConfigOverrides::default()
        }
    }
}

/// Load the config file (explicit or default location) and apply CLI overrides.
pub(crate) fn load_config(
    path: Option<&Path>,
    overrides: &OverrideArgs,
) -> anyhow::Result<ExtractConfig> {
    let base = match path {
        Some(path) => Some(ExtractConfig::load_from_path(path)?),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                Some(ExtractConfig::load_from_path(default)?)
            } else {
                None
            }
        }
    };
    Ok(ExtractConfig::resolve(base.as_ref(), &overrides.to_overrides())?)
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Extract {
            files,
            json,
            debug_dir,
            overrides,
        } => {
            let config = load_config(config_path, &overrides)?;
            extract::cmd_extract(config, &files, json, debug_dir).await
        }
        Commands::Assess {
            file,
            json,
            overrides,
        } => {
            let config = load_config(config_path, &overrides)?;
            assess::cmd_assess(config, &file, json).await
        }
        Commands::Check => {
            let config = load_config(config_path, &OverrideArgs::default())?;
            check::cmd_check(&config).await
        }
    }
}
