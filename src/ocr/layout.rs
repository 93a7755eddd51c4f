//! Fixed-width layout reconstruction from recognized fragments.
//!
//! The service returns an unordered set of boxes. To keep tables, columns
//! and form fields usable for downstream parsing, boxes are placed on a
//! character grid: vertical positions become line indices, horizontal
//! positions become column indices.
//!
//! Recognition reports box height, not glyph advance, so the character width
//! is inferred from height and the width-scale weight. That inference and the
//! line-grouping threshold are heuristics; both are exposed as tunables.

use crate::config::ExtractConfig;
use crate::models::{RecognizedPage, TextFragment};

/// Assumed advance width of an average glyph as a fraction of box height.
const GLYPH_ASPECT: f64 = 0.5;

/// Tunables for grid construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Larger values shrink the inferred character width, spreading columns.
    pub width_scale_weight: f64,
    /// Larger values merge more vertically-close fragments into one line.
    pub font_height_weight: f64,
    /// Grid units per page unit. Positions closer than one unit coincide.
    pub positioning_scale: f64,
    /// Percentage of the nominal line height that separates two lines.
    pub line_height_scale: f64,
    /// Page rotations at or below this magnitude are ignored.
    pub min_rotation_degrees: f64,
    pub preserve_vertical_whitespace: bool,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            width_scale_weight: 1.25,
            font_height_weight: 1.0,
            positioning_scale: 100.0,
            line_height_scale: 50.0,
            min_rotation_degrees: 1e-5,
            preserve_vertical_whitespace: false,
        }
    }
}

impl LayoutParams {
    pub fn from_config(config: &ExtractConfig) -> Self {
        Self {
            width_scale_weight: config.scale_weight,
            font_height_weight: config.font_height_weight,
            positioning_scale: config.ocr_positioning_scale,
            line_height_scale: config.ocr_line_height_scale,
            min_rotation_degrees: config.min_ocr_rotation_degrees,
            preserve_vertical_whitespace: config.preserve_vertical_whitespace,
        }
    }
}

/// A fragment in normalized, scaled page coordinates.
#[derive(Debug, Clone)]
struct Placed {
    order: usize,
    text: String,
    x: f64,
    y: f64,
    height: f64,
}

/// One output line: its discrete index and fragments sorted left to right.
#[derive(Debug)]
struct GridLine {
    index: usize,
    cells: Vec<Placed>,
}

/// Builds a fixed-width string from one page's fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutGridBuilder {
    params: LayoutParams,
}

impl LayoutGridBuilder {
    pub fn new(params: LayoutParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Render a recognized page, undoing its page-level rotation.
    pub fn build(&self, page: &RecognizedPage) -> String {
        self.layout(&page.fragments, page.angle, page.width, page.height)
    }

    /// Render fragments belonging to a page of the given size. Rotation is
    /// taken from the fragments' own regions.
    pub fn build_fragments(
        &self,
        fragments: &[TextFragment],
        page_width: f64,
        page_height: f64,
    ) -> String {
        self.layout(fragments, 0.0, page_width, page_height)
    }

    fn layout(
        &self,
        fragments: &[TextFragment],
        page_angle: f64,
        page_width: f64,
        page_height: f64,
    ) -> String {
        let rotation = page_rotation(fragments, page_angle, self.params.min_rotation_degrees);
        let placed = self.place(fragments, rotation, page_width, page_height);
        if placed.is_empty() {
            return String::new();
        }

        let line_pitch = median_height(&placed) * self.params.font_height_weight;
        let lines = self.group_lines(placed, line_pitch);
        let char_width = self.char_width(&lines);
        self.render(&lines, char_width)
    }

    /// Normalize rotation, then snap to whole grid units and left-align.
    ///
    /// `positioning_scale` is the number of grid units per page unit, so it
    /// sets the resolution at which positions and heights are compared.
    fn place(
        &self,
        fragments: &[TextFragment],
        rotation: Option<f64>,
        page_width: f64,
        page_height: f64,
    ) -> Vec<Placed> {
        let scale = self.params.positioning_scale;
        let (cx, cy) = (page_width / 2.0, page_height / 2.0);

        let mut placed: Vec<Placed> = fragments
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.text.trim().is_empty())
            .map(|(order, f)| {
                let (x, y) = match rotation {
                    Some(angle) => unrotate(f.region.x, f.region.y, angle, cx, cy),
                    None => (f.region.x, f.region.y),
                };
                Placed {
                    order,
                    text: sanitize(&f.text),
                    x: (x * scale).round(),
                    y: (y * scale).round(),
                    height: (f.region.height.abs() * scale).round().max(1.0),
                }
            })
            .collect();

        let min_x = placed.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        if min_x.is_finite() {
            for p in &mut placed {
                p.x -= min_x;
            }
        }
        placed
    }

    /// Cluster fragments into lines by vertical position.
    fn group_lines(&self, mut placed: Vec<Placed>, line_pitch: f64) -> Vec<GridLine> {
        placed.sort_by(|a, b| {
            a.y.total_cmp(&b.y)
                .then(a.x.total_cmp(&b.x))
                .then(a.order.cmp(&b.order))
        });

        let merge_threshold = line_pitch * self.params.line_height_scale / 100.0;
        let mut lines: Vec<GridLine> = Vec::new();
        let mut anchor_y = 0.0;

        for p in placed {
            if let Some(line) = lines.last_mut() {
                if p.y - anchor_y < merge_threshold {
                    line.cells.push(p);
                    continue;
                }
            }
            let index = lines.last().map_or(0, |line| {
                line.index + ((p.y - anchor_y) / line_pitch).floor().max(1.0) as usize
            });
            anchor_y = p.y;
            lines.push(GridLine {
                index,
                cells: vec![p],
            });
        }

        for line in &mut lines {
            line.cells
                .sort_by(|a, b| a.x.total_cmp(&b.x).then(a.order.cmp(&b.order)));
        }
        lines
    }

    /// Character-weighted mean glyph width.
    fn char_width(&self, lines: &[GridLine]) -> f64 {
        let (weighted, chars) = lines
            .iter()
            .flat_map(|l| l.cells.iter())
            .fold((0.0, 0.0), |(w, n), p| {
                let len = p.text.chars().count() as f64;
                (w + p.height * GLYPH_ASPECT * len, n + len)
            });
        let width = if chars > 0.0 {
            weighted / chars / self.params.width_scale_weight
        } else {
            0.0
        };
        if width > 0.0 && width.is_finite() {
            width
        } else {
            1.0
        }
    }

    fn render(&self, lines: &[GridLine], char_width: f64) -> String {
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut last_index: Option<usize> = None;

        for line in lines {
            let text = render_line(&line.cells, char_width);
            if text.is_empty() {
                continue;
            }
            if self.params.preserve_vertical_whitespace {
                if let Some(prev) = last_index {
                    let gap = line.index.saturating_sub(prev + 1);
                    out.extend(std::iter::repeat(String::new()).take(gap));
                }
            }
            out.push(text);
            last_index = Some(line.index);
        }
        out.join("\n")
    }
}

/// Lay out one line's cells, padding to each cell's column. A cell whose
/// column is already covered is appended after a single space so earlier
/// text is never overwritten.
fn render_line(cells: &[Placed], char_width: f64) -> String {
    let mut line = String::new();
    let mut len = 0usize;
    for cell in cells {
        let column = (cell.x / char_width).floor().max(0.0) as usize;
        if column > len {
            line.extend(std::iter::repeat(' ').take(column - len));
            len = column;
        } else if len > 0 && !line.ends_with(' ') {
            line.push(' ');
            len += 1;
        }
        line.push_str(&cell.text);
        len += cell.text.chars().count();
    }
    line.trim_end().to_string()
}

/// Page rotation to undo. A page-level angle past the threshold wins;
/// without one, the first fragment skewed past the threshold is used.
fn page_rotation(fragments: &[TextFragment], page_angle: f64, min_degrees: f64) -> Option<f64> {
    if page_angle.abs() > min_degrees {
        return Some(page_angle);
    }
    if page_angle != 0.0 {
        return None;
    }
    detected_rotation(fragments, min_degrees)
}

/// Skew carried on the fragments themselves, if any exceeds the threshold.
fn detected_rotation(fragments: &[TextFragment], min_degrees: f64) -> Option<f64> {
    fragments
        .iter()
        .map(|f| f.region.rotation)
        .find(|r| r.abs() > min_degrees)
}

/// Rotate a point counter-clockwise by `angle` degrees around `(cx, cy)`,
/// undoing a clockwise skew in y-down page coordinates.
fn unrotate(x: f64, y: f64, angle: f64, cx: f64, cy: f64) -> (f64, f64) {
    let (sin, cos) = angle.to_radians().sin_cos();
    let (dx, dy) = (x - cx, y - cy);
    (cos * dx + sin * dy + cx, -sin * dx + cos * dy + cy)
}

fn median_height(placed: &[Placed]) -> f64 {
    let mut heights: Vec<f64> = placed.iter().map(|p| p.height).collect();
    heights.sort_by(f64::total_cmp);
    let mid = heights.len() / 2;
    let median = if heights.len() % 2 == 0 {
        (heights[mid - 1] + heights[mid]) / 2.0
    } else {
        heights[mid]
    };
    if median > 0.0 && median.is_finite() {
        median
    } else {
        1.0
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingRegion;

    fn frag(text: &str, x: f64, y: f64) -> TextFragment {
        let width = text.len() as f64 * 0.1;
        TextFragment::new(0, text, BoundingRegion::new(x, y, width, 0.2))
    }

    fn builder() -> LayoutGridBuilder {
        LayoutGridBuilder::new(LayoutParams::default())
    }

    #[test]
    fn test_empty_page() {
        assert_eq!(builder().build_fragments(&[], 8.5, 11.0), "");
        let blank = vec![frag("   ", 1.0, 1.0)];
        assert_eq!(builder().build_fragments(&blank, 8.5, 11.0), "");
    }

    #[test]
    fn test_two_lines() {
        let frags = vec![frag("First line", 1.0, 1.0), frag("Second line", 1.0, 1.3)];
        let text = builder().build_fragments(&frags, 8.5, 11.0);
        assert_eq!(text, "First line\nSecond line");
    }

    #[test]
    fn test_unordered_input_sorted_top_to_bottom() {
        let frags = vec![frag("bottom", 1.0, 5.0), frag("top", 1.0, 1.0)];
        let text = builder().build_fragments(&frags, 8.5, 11.0);
        assert_eq!(text, "top\nbottom");
    }

    #[test]
    fn test_columns_preserved() {
        let frags = vec![
            frag("Name:", 1.0, 1.0),
            frag("John", 3.0, 1.02),
            frag("Age:", 1.0, 1.3),
            frag("42", 3.0, 1.3),
        ];
        let text = builder().build_fragments(&frags, 8.5, 11.0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Name:"));
        assert!(lines[1].starts_with("Age:"));
        assert_eq!(lines[0].find("John"), lines[1].find("42"));
        assert!(lines[0].find("John").unwrap() > "Name:".len());
    }

    #[test]
    fn test_left_aligned_to_leftmost_fragment() {
        let frags = vec![frag("indented", 4.0, 1.0)];
        assert_eq!(builder().build_fragments(&frags, 8.5, 11.0), "indented");
    }

    #[test]
    fn test_overlap_keeps_both_in_order() {
        let frags = vec![frag("AAAAAAAAAA", 1.0, 1.0), frag("BB", 1.05, 1.0)];
        let text = builder().build_fragments(&frags, 8.5, 11.0);
        assert_eq!(text, "AAAAAAAAAA BB");
    }

    #[test]
    fn test_vertical_whitespace() {
        let frags = vec![frag("top", 1.0, 1.0), frag("bottom", 1.0, 1.8)];
        let collapsed = builder().build_fragments(&frags, 8.5, 11.0);
        assert_eq!(collapsed, "top\nbottom");

        let preserving = LayoutGridBuilder::new(LayoutParams {
            preserve_vertical_whitespace: true,
            ..Default::default()
        });
        let spaced = preserving.build_fragments(&frags, 8.5, 11.0);
        assert_eq!(spaced, "top\n\n\n\nbottom");
    }

    #[test]
    fn test_font_height_weight_merges_lines() {
        let frags = vec![frag("left", 1.0, 1.0), frag("right", 4.0, 1.15)];
        assert_eq!(builder().build_fragments(&frags, 8.5, 11.0).lines().count(), 2);

        let merging = LayoutGridBuilder::new(LayoutParams {
            font_height_weight: 2.0,
            ..Default::default()
        });
        assert_eq!(merging.build_fragments(&frags, 8.5, 11.0).lines().count(), 1);
    }

    #[test]
    fn test_rotation_normalized_above_threshold() {
        let params = LayoutParams {
            min_rotation_degrees: 5.0,
            ..Default::default()
        };
        let (cx, cy) = (4.25, 5.5);
        let (sin, cos) = 10f64.to_radians().sin_cos();
        // Two fragments on one visual line, skewed clockwise by 10 degrees.
        let skew = |x: f64, y: f64| {
            let (dx, dy) = (x - cx, y - cy);
            (cos * dx - sin * dy + cx, sin * dx + cos * dy + cy)
        };
        let (ax, ay) = skew(1.0, 2.0);
        let (bx, by) = skew(5.0, 2.0);
        let frags = vec![
            TextFragment::new(0, "left", BoundingRegion::new(ax, ay, 0.4, 0.2).with_rotation(10.0)),
            TextFragment::new(0, "right", BoundingRegion::new(bx, by, 0.5, 0.2).with_rotation(10.0)),
        ];
        let text = LayoutGridBuilder::new(params).build_fragments(&frags, 8.5, 11.0);
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("left"));
        assert!(text.trim_end().ends_with("right"));
    }

    #[test]
    fn test_page_angle_normalized() {
        let (cx, cy) = (4.25, 5.5);
        let (sin, cos) = 10f64.to_radians().sin_cos();
        let skew = |x: f64, y: f64| {
            let (dx, dy) = (x - cx, y - cy);
            (cos * dx - sin * dy + cx, sin * dx + cos * dy + cy)
        };
        let (ax, ay) = skew(1.0, 2.0);
        let (bx, by) = skew(5.0, 2.0);
        // Only the page carries the angle.
        let mut page = RecognizedPage::new(
            0,
            vec![
                TextFragment::new(0, "left", BoundingRegion::new(ax, ay, 0.4, 0.2)),
                TextFragment::new(0, "right", BoundingRegion::new(bx, by, 0.5, 0.2)),
            ],
        );
        page.angle = 10.0;
        let params = LayoutParams {
            min_rotation_degrees: 5.0,
            ..Default::default()
        };
        let text = LayoutGridBuilder::new(params).build(&page);
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("left"));
        assert!(text.trim_end().ends_with("right"));
    }

    #[test]
    fn test_page_rotation_precedence() {
        let skewed = vec![
            TextFragment::new(0, "a", BoundingRegion::new(1.0, 1.0, 0.1, 0.2).with_rotation(8.0)),
        ];
        assert_eq!(page_rotation(&skewed, 10.0, 5.0), Some(10.0));
        assert_eq!(page_rotation(&skewed, 0.0, 5.0), Some(8.0));
        // A small page angle is authoritative even when fragments disagree.
        assert_eq!(page_rotation(&skewed, 0.0001, 5.0), None);
    }

    #[test]
    fn test_positioning_scale_sets_resolution() {
        let frags = vec![frag("upper", 1.0, 1.0), frag("lower", 1.0, 1.3)];
        assert_eq!(builder().build_fragments(&frags, 8.5, 11.0), "upper\nlower");

        let coarse = LayoutGridBuilder::new(LayoutParams {
            positioning_scale: 1.0,
            ..Default::default()
        });
        assert_eq!(coarse.build_fragments(&frags, 8.5, 11.0), "upper lower");
    }

    #[test]
    fn test_tiny_rotation_ignored() {
        let frags = vec![
            TextFragment::new(0, "a", BoundingRegion::new(1.0, 1.0, 0.1, 0.2).with_rotation(0.0001)),
        ];
        assert_eq!(detected_rotation(&frags, 5.0), None);
        assert_eq!(detected_rotation(&frags, 0.00001), Some(0.0001));
    }

    #[test]
    fn test_unrotate_inverts_clockwise_skew() {
        let (sin, cos) = 30f64.to_radians().sin_cos();
        let (x, y) = (cos * 2.0 + 1.0, sin * 2.0 + 1.0);
        let (ux, uy) = unrotate(x, y, 30.0, 1.0, 1.0);
        assert!((ux - 3.0).abs() < 1e-9);
        assert!((uy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_control_characters_replaced() {
        let frags = vec![frag("a\u{7}b", 1.0, 1.0)];
        assert_eq!(builder().build_fragments(&frags, 8.5, 11.0), "a b");
    }

    #[test]
    fn test_deterministic_output() {
        let frags = vec![
            frag("gamma", 5.0, 3.0),
            frag("alpha", 1.0, 1.0),
            frag("beta", 3.0, 1.01),
            frag("delta", 1.0, 3.0),
            frag("twin", 3.0, 1.01),
        ];
        let first = builder().build_fragments(&frags, 8.5, 11.0);
        let second = builder().build_fragments(&frags, 8.5, 11.0);
        assert_eq!(first, second);
        assert!(first.lines().next().unwrap().contains("beta twin"));
    }
}
