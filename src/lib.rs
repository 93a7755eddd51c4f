//! pagetext - layout-faithful PDF text extraction with batch OCR fallback.
//!
//! Embedded text is taken from the PDF where it is usable. When enough pages
//! have too little (or garbled) embedded text, those pages are sent to Azure
//! Document Intelligence in a single request and the recognized lines are
//! laid back out on a fixed-width grid that follows the page.

pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;

use std::path::Path;

pub use config::{ConfigError, ConfigOverrides, ExtractConfig};
pub use error::{Error, Result};
pub use extract::{
    Assessment, DocumentExtractor, EmbeddedTextSource, ExtractedDocument, ExtractionError,
    PdfDocument, PdfToText,
};
pub use models::{ExtractedPage, OcrDecision, PageQuality, PageSource};
pub use ocr::{RecognitionClient, RecognitionOutcome};

/// Extract one PDF using `base` (or defaults) with `overrides` applied on top.
pub async fn extract_file(
    path: impl AsRef<Path>,
    base: Option<&ExtractConfig>,
    overrides: &ConfigOverrides,
) -> Result<ExtractedDocument> {
    let config = ExtractConfig::resolve(base, overrides)?;
    let extractor = DocumentExtractor::new(config)?;
    Ok(extractor.extract_path(path).await?)
}
