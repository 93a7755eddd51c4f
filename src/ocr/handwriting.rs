//! Handwritten-content ratio per page.

use crate::models::TextFragment;

/// Fraction of a page's characters that are confidently handwritten.
///
/// A fragment counts as handwritten when it is flagged and its handwriting
/// confidence is at least `threshold` (inclusive). Whitespace is not counted.
/// Pages with no characters yield 0.0.
pub fn handwritten_ratio(fragments: &[TextFragment], threshold: f32) -> f64 {
    let (handwritten, total) = fragments.iter().fold((0usize, 0usize), |(hw, total), f| {
        let chars = f.char_count();
        let counted = f.handwritten && f.handwritten_confidence >= threshold;
        (hw + if counted { chars } else { 0 }, total + chars)
    });
    if total == 0 {
        0.0
    } else {
        handwritten as f64 / total as f64
    }
}
