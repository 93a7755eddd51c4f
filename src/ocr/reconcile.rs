//! Maps a batch recognition result back onto original page positions.

use tracing::warn;

use crate::models::RecognizedPage;

/// Recognition state of one original page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRecognition {
    /// The page was not part of the submission.
    NotSubmitted,
    /// The page was submitted but no result came back for it.
    Missing,
    Recognized(RecognizedPage),
}

impl PageRecognition {
    pub fn page(&self) -> Option<&RecognizedPage> {
        match self {
            PageRecognition::Recognized(page) => Some(page),
            _ => None,
        }
    }
}

/// One entry per original page, in page order.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub pages: Vec<PageRecognition>,
    pub warnings: Vec<String>,
}

impl Reconciliation {
    pub fn recognized_count(&self) -> usize {
        self.pages.iter().filter(|p| p.page().is_some()).count()
    }
}

/// Place recognized pages at their original indices.
///
/// Each returned page is matched by the index the service reported when that
/// index was submitted, otherwise by its position in the submission. `result`
/// is `None` when the batch failed outright; every submitted page is then
/// `Missing`.
pub fn reconcile(
    page_count: usize,
    submitted: &[usize],
    result: Option<&[RecognizedPage]>,
) -> Reconciliation {
    let mut pages = vec![PageRecognition::NotSubmitted; page_count];
    let mut warnings = Vec::new();

    for &idx in submitted {
        if let Some(slot) = pages.get_mut(idx) {
            *slot = PageRecognition::Missing;
        }
    }

    let Some(result) = result else {
        return Reconciliation { pages, warnings };
    };

    for (position, page) in result.iter().enumerate() {
        let target = if submitted.contains(&page.page_index) {
            Some(page.page_index)
        } else {
            submitted.get(position).copied()
        };
        let Some(idx) = target.filter(|&i| i < page_count) else {
            let message = format!(
                "Discarding recognition result for unrequested page {}",
                page.page_index + 1
            );
            warn!("{}", message);
            warnings.push(message);
            continue;
        };
        if matches!(pages[idx], PageRecognition::Recognized(_)) {
            let message = format!("Duplicate recognition result for page {}", idx + 1);
            warn!("{}", message);
            warnings.push(message);
            continue;
        }
        pages[idx] = PageRecognition::Recognized(restamp(page, idx));
    }

    for (idx, state) in pages.iter().enumerate() {
        if *state == PageRecognition::Missing {
            let message = format!("No recognition result for page {}, using empty text", idx + 1);
            warn!("{}", message);
            warnings.push(message);
        }
    }

    Reconciliation { pages, warnings }
}

fn restamp(page: &RecognizedPage, idx: usize) -> RecognizedPage {
    let mut page = page.clone();
    page.page_index = idx;
    for fragment in &mut page.fragments {
        fragment.page_index = idx;
    }
    page
}
