//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::extract::ExtractionError;
use crate::ocr::RecognitionError;

/// Any error surfaced by the public API.
///
/// Recognition errors only appear here from explicit client calls; during
/// extraction they are folded into the document's recognition outcome.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

pub type Result<T> = std::result::Result<T, Error>;
