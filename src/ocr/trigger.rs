//! Document-level OCR trigger policy.
//!
//! Flagged pages only go to recognition when enough of the document is
//! flagged; a handful of chart-only pages does not justify paying for a
//! batch submission.

use tracing::{debug, info};

use crate::config::ExtractConfig;
use crate::models::{OcrDecision, PageQuality};

#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    ratio_threshold: f64,
    suppress_embedded: bool,
    disable_ocr: bool,
}

impl TriggerPolicy {
    pub fn new(ratio_threshold: f64) -> Self {
        Self {
            ratio_threshold,
            suppress_embedded: false,
            disable_ocr: false,
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            ratio_threshold: config.trigger_ocr_page_ratio,
            suppress_embedded: config.suppress_embedded,
            disable_ocr: config.disable_ocr,
        }
    }

    /// Force recognition on every page.
    pub fn suppress_embedded(mut self, suppress: bool) -> Self {
        self.suppress_embedded = suppress;
        self
    }

    /// Force recognition off everywhere, overriding corruption.
    pub fn disable_ocr(mut self, disable: bool) -> Self {
        self.disable_ocr = disable;
        self
    }

    /// Decide whether and which pages go to recognition.
    pub fn decide(&self, pages: &[PageQuality]) -> OcrDecision {
        let total = pages.len();
        let flagged: Vec<usize> = pages
            .iter()
            .filter(|q| q.is_flagged())
            .map(|q| q.page_index)
            .collect();
        let flagged_ratio = if total == 0 {
            0.0
        } else {
            flagged.len() as f64 / total as f64
        };

        if self.disable_ocr {
            debug!("OCR disabled, skipping recognition for all {} pages", total);
            return OcrDecision::none(flagged_ratio);
        }

        if self.suppress_embedded {
            return OcrDecision {
                flagged_ratio,
                should_ocr: total > 0,
                selected: (0..total).collect(),
            };
        }

        let should_ocr = !flagged.is_empty() && flagged_ratio >= self.ratio_threshold;
        info!(
            "OCR decision: {}/{} pages flagged (ratio {:.3}, threshold {:.3}) -> {}",
            flagged.len(),
            total,
            flagged_ratio,
            self.ratio_threshold,
            if should_ocr { "submit" } else { "skip" }
        );

        if should_ocr {
            let mut selected = flagged;
            selected.sort_unstable();
            OcrDecision {
                flagged_ratio,
                should_ocr,
                selected,
            }
        } else {
            OcrDecision::none(flagged_ratio)
        }
    }
}
