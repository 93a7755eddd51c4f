//! Recognized text fragments as returned by the optical-recognition service.
//!
//! Fragments are immutable once produced; layout and handwriting passes
//! derive new values from them instead of mutating in place.

use serde::{Deserialize, Serialize};

/// Oriented bounding box of a fragment.
///
/// `(x, y)` is the fragment's top-left anchor in page units (inches for the
/// Azure Read model). `width` and `height` are measured along the text
/// direction, so they survive rotation unchanged. `rotation` is the detected
/// skew of the page in degrees, clockwise positive as the service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl BoundingRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Build a region from an 8-value quadrilateral `[x0, y0, x1, y1, x2, y2, x3, y3]`
    /// listed clockwise from the top-left corner.
    pub fn from_polygon(polygon: &[f64], rotation: f64) -> Option<Self> {
        if polygon.len() < 8 {
            return None;
        }
        let (x0, y0) = (polygon[0], polygon[1]);
        let width = (polygon[2] - x0).hypot(polygon[3] - y0);
        let height = (polygon[6] - x0).hypot(polygon[7] - y0);
        Some(Self {
            x: x0,
            y: y0,
            width,
            height,
            rotation,
        })
    }

    /// X coordinate of the right edge along the text baseline.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// A single recognized unit of text (a line, for the Read model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub region: BoundingRegion,
    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
    pub handwritten: bool,
    /// Confidence (0.0 - 1.0) that the fragment is handwritten.
    pub handwritten_confidence: f32,
    /// Zero-based index of the page that owns this fragment.
    pub page_index: usize,
}

impl TextFragment {
    /// Create a printed-text fragment with full confidence.
    pub fn new(page_index: usize, text: impl Into<String>, region: BoundingRegion) -> Self {
        Self {
            text: text.into(),
            region,
            confidence: 1.0,
            handwritten: false,
            handwritten_confidence: 0.0,
            page_index,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_handwriting(mut self, confidence: f32) -> Self {
        self.handwritten = true;
        self.handwritten_confidence = confidence;
        self
    }

    /// Number of non-whitespace characters in the fragment.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Everything the service reported for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedPage {
    /// Zero-based index into the original document.
    pub page_index: usize,
    /// Page-level rotation angle in degrees.
    pub angle: f64,
    pub width: f64,
    pub height: f64,
    pub fragments: Vec<TextFragment>,
}

impl RecognizedPage {
    /// Letter-size page in inches, the Read model's unit for PDFs.
    pub const DEFAULT_WIDTH: f64 = 8.5;
    pub const DEFAULT_HEIGHT: f64 = 11.0;

    pub fn new(page_index: usize, fragments: Vec<TextFragment>) -> Self {
        Self {
            page_index,
            angle: 0.0,
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            fragments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.iter().all(|f| f.text.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_axis_aligned_polygon() {
        let region =
            BoundingRegion::from_polygon(&[1.0, 2.0, 4.0, 2.0, 4.0, 2.5, 1.0, 2.5], 0.0).unwrap();
        assert_eq!(region.x, 1.0);
        assert_eq!(region.y, 2.0);
        assert!((region.width - 3.0).abs() < 1e-9);
        assert!((region.height - 0.5).abs() < 1e-9);
        assert!((region.right() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_from_short_polygon() {
        assert!(BoundingRegion::from_polygon(&[1.0, 2.0, 3.0], 0.0).is_none());
    }

    #[test]
    fn test_char_count_ignores_whitespace() {
        let frag = TextFragment::new(0, " a b\tc ", BoundingRegion::new(0.0, 0.0, 1.0, 0.2));
        assert_eq!(frag.char_count(), 3);
    }

    #[test]
    fn test_blank_page_is_empty() {
        let page = RecognizedPage::new(
            3,
            vec![TextFragment::new(
                3,
                "   ",
                BoundingRegion::new(0.0, 0.0, 1.0, 0.2),
            )],
        );
        assert!(page.is_empty());
        assert_eq!(page.width, RecognizedPage::DEFAULT_WIDTH);
    }
}
