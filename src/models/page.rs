//! Per-page quality signals, the document OCR decision, and final page output.

use serde::{Deserialize, Serialize};

/// Quality signals derived from a page's embedded (machine-encoded) text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuality {
    pub page_index: usize,
    pub line_count: usize,
    pub char_count: usize,
    /// Fewer non-blank lines than the configured minimum.
    pub low_text: bool,
    /// More characters than any real page could hold.
    pub corrupted: bool,
}

impl PageQuality {
    /// Whether this page individually qualifies for recognition.
    pub fn is_flagged(&self) -> bool {
        self.low_text || self.corrupted
    }
}

/// Document-level decision on whether to run batch recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDecision {
    /// Fraction of pages that were flagged (0.0 for an empty document).
    pub flagged_ratio: f64,
    pub should_ocr: bool,
    /// Zero-based indices submitted for recognition, ascending.
    /// Always empty when `should_ocr` is false.
    pub selected: Vec<usize>,
}

impl OcrDecision {
    pub fn none(flagged_ratio: f64) -> Self {
        Self {
            flagged_ratio,
            should_ocr: false,
            selected: Vec::new(),
        }
    }

    pub fn is_selected(&self, page_index: usize) -> bool {
        self.selected.binary_search(&page_index).is_ok()
    }
}

/// Where a page's final text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageSource {
    #[serde(rename = "embedded")]
    Embedded,
    #[serde(rename = "OCR")]
    Ocr,
}

impl PageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::Ocr => "OCR",
        }
    }
}

impl std::fmt::Display for PageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final, externally visible result for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub index: usize,
    pub source: PageSource,
    pub text: String,
    /// Fraction of handwritten characters. Always 0.0 for embedded pages.
    pub handwritten_ratio: f64,
}

impl ExtractedPage {
    pub fn embedded(index: usize, text: String) -> Self {
        Self {
            index,
            source: PageSource::Embedded,
            text,
            handwritten_ratio: 0.0,
        }
    }

    pub fn ocr(index: usize, text: String, handwritten_ratio: f64) -> Self {
        Self {
            index,
            source: PageSource::Ocr,
            text,
            handwritten_ratio,
        }
    }
}
