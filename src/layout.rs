use std::cmp::Ordering;

use crate::geo::Rect;
use crate::parse::CharElement;

/// A run of chars sharing a baseline, sorted left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    pub chars: Vec<CharElement>,
    /// A bounding box for the entire line.
    pub bbox: Rect,
}

impl TextLine {
    pub fn from_chars(mut chars: Vec<CharElement>) -> Self {
        chars.sort_by(|a, b| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal));
        let bbox = chars
            .iter()
            .map(|c| c.bbox)
            .reduce(|acc, b| acc.union(&b))
            .unwrap_or_default();
        TextLine { chars, bbox }
    }

    /// The line's text, with a space wherever the gap between two glyphs
    /// exceeds `x_tolerance` and no space glyph is already there.
    pub fn text(&self, x_tolerance: f32) -> String {
        let mut out = String::new();
        let mut prev: Option<&CharElement> = None;
        for c in &self.chars {
            if let Some(p) = prev {
                let gap = c.bbox.x0 - p.bbox.x1;
                if gap > x_tolerance && !out.ends_with(' ') && !c.text.starts_with(' ') {
                    out.push(' ');
                }
            }
            out.push_str(&c.text);
            prev = Some(c);
        }
        out.trim_end().to_string()
    }
}

/// Group chars into lines: sort top to bottom, then join chars whose tops
/// are within `y_tolerance` of the line's first char.
pub fn group_chars_into_lines(chars: &[CharElement], y_tolerance: f32) -> Vec<TextLine> {
    let mut sorted: Vec<&CharElement> = chars.iter().collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.bbox.x0.partial_cmp(&b.bbox.x0).unwrap_or(Ordering::Equal))
    });

    let mut lines = Vec::new();
    let mut current: Vec<CharElement> = Vec::new();
    let mut line_top = f32::MIN;

    for c in sorted {
        if current.is_empty() || (c.bbox.y0 - line_top).abs() <= y_tolerance {
            if current.is_empty() {
                line_top = c.bbox.y0;
            }
            current.push(c.clone());
        } else {
            lines.push(TextLine::from_chars(std::mem::take(&mut current)));
            line_top = c.bbox.y0;
            current.push(c.clone());
        }
    }

    if !current.is_empty() {
        lines.push(TextLine::from_chars(current));
    }

    lines
}

pub fn lines_to_text(lines: &[TextLine], x_tolerance: f32) -> String {
    lines
        .iter()
        .map(|l| l.text(x_tolerance))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the chars whose centre falls inside `area`, laid out as lines.
pub fn text_within(chars: &[CharElement], area: &Rect, x_tolerance: f32, y_tolerance: f32) -> String {
    let inside: Vec<CharElement> = chars
        .iter()
        .filter(|c| {
            let (cx, cy) = c.bbox.center();
            area.contains_point(cx, cy)
        })
        .cloned()
        .collect();
    lines_to_text(&group_chars_into_lines(&inside, y_tolerance), x_tolerance)
}
