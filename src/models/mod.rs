//! Data models for page extraction.

mod fragment;
mod page;

pub use fragment::{BoundingRegion, RecognizedPage, TextFragment};
pub use page::{ExtractedPage, OcrDecision, PageQuality, PageSource};
