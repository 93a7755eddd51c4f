//! Quality assessment of embedded (machine-encoded) page text.
//!
//! A page is low-text when it has too few non-blank lines to be useful and
//! corrupted when its extraction is longer than any real page could be. Both
//! are signals that recognition may produce better text.

use tracing::warn;

use crate::models::PageQuality;

/// Thresholds applied to embedded text.
#[derive(Debug, Clone, Copy)]
pub struct QualityAssessor {
    min_lines: usize,
    max_chars: usize,
}

impl QualityAssessor {
    pub fn new(min_lines: usize, max_chars: usize) -> Self {
        Self {
            min_lines,
            max_chars,
        }
    }

    pub fn from_config(config: &crate::config::ExtractConfig) -> Self {
        Self::new(config.min_lines_ocr_trigger, config.max_chars_per_page)
    }

    /// Assess one page's embedded text.
    pub fn assess(&self, page_index: usize, text: &str) -> PageQuality {
        let line_count = line_count(text);
        let char_count = text.chars().count();
        let corrupted = char_count > self.max_chars;
        if corrupted {
            warn!(
                "Page {} embedded text has {} characters (ceiling {}), treating as corrupted",
                page_index, char_count, self.max_chars
            );
        }
        PageQuality {
            page_index,
            line_count,
            char_count,
            low_text: line_count < self.min_lines,
            corrupted,
        }
    }

    /// Assess every page, in order.
    pub fn assess_all<S: AsRef<str>>(&self, pages: &[S]) -> Vec<PageQuality> {
        pages
            .iter()
            .enumerate()
            .map(|(idx, text)| self.assess(idx, text.as_ref()))
            .collect()
    }
}

/// Number of lines containing at least one non-whitespace character.
pub fn line_count(text: &str) -> usize {
    text.lines().filter(|line| !line.trim().is_empty()).count()
}
