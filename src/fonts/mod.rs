use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::warn;

use crate::logging::PDF_PARSING;
use crate::parse::operand_as_float;

/// Width used when a simple font carries no `/Widths` (standard 14 fonts).
const FALLBACK_WIDTH: f32 = 500.0;
const DEFAULT_ASCENT: f32 = 750.0;
const DEFAULT_DESCENT: f32 = -250.0;

/// What the content interpreter needs to know about a font resource.
/// Widths and vertical metrics are in glyph space (1/1000 em).
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_font: String,
    /// Type0 (composite) fonts use two-byte character codes.
    pub two_byte: bool,
    pub ascent: f32,
    pub descent: f32,
    widths: HashMap<u32, f32>,
    default_width: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        FontInfo {
            base_font: "unknown".to_string(),
            two_byte: false,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            widths: HashMap::new(),
            default_width: FALLBACK_WIDTH,
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
}

fn get_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    dict.get(key)
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
}

fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict.get(key).ok().map(|o| resolve(doc, o)).and_then(|o| match o {
        Object::Integer(_) | Object::Real(_) => Some(operand_as_float(o)),
        _ => None,
    })
}

/// The `/BaseFont` name as written in the file, subset prefix included.
pub fn base_font_name(dict: &Dictionary) -> String {
    dict.get(b"BaseFont")
        .and_then(Object::as_name)
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Highest CID a `/W` entry may name.
const MAX_CID: u32 = 0xFFFF;

fn cid(obj: &Object) -> Option<u32> {
    obj.as_i64()
        .ok()
        .and_then(|c| u32::try_from(c).ok())
        .filter(|c| *c <= MAX_CID)
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` runs.
/// Parsing stops at the first malformed entry; runs with `c_last < c_first`
/// are skipped.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = cid(resolve(doc, &w[i])) else {
            break;
        };
        match w.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(run)) => {
                for (code, width) in (first..=MAX_CID).zip(run) {
                    widths.insert(code, operand_as_float(resolve(doc, width)));
                }
                i += 2;
            }
            Some(last) => {
                let Some(width) = w.get(i + 2).map(|o| operand_as_float(resolve(doc, o))) else {
                    break;
                };
                let Ok(last) = last.as_i64() else { break };
                match u32::try_from(last) {
                    Ok(last) if last >= first => {
                        for code in first..=last.min(MAX_CID) {
                            widths.insert(code, width);
                        }
                    }
                    _ => warn!(target: PDF_PARSING, first, last, "skipping reversed /W run"),
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

impl FontInfo {
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = base_font_name(dict);
        let two_byte = dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|s| s == b"Type0")
            .unwrap_or(false);

        let mut info = FontInfo {
            base_font,
            two_byte,
            ..FontInfo::default()
        };

        let descriptor_owner = if two_byte {
            let descendant = get_array(doc, dict, b"DescendantFonts")
                .and_then(|arr| arr.first())
                .map(|o| resolve(doc, o))
                .and_then(|o| o.as_dict().ok());
            if let Some(cid_font) = descendant {
                info.default_width = get_number(doc, cid_font, b"DW").unwrap_or(1000.0);
                if let Some(w) = get_array(doc, cid_font, b"W") {
                    info.widths = parse_cid_widths(doc, w);
                }
            }
            descendant
        } else {
            let first_char = get_number(doc, dict, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(widths) = get_array(doc, dict, b"Widths") {
                info.widths = widths
                    .iter()
                    .enumerate()
                    .filter_map(|(i, w)| {
                        let code = first_char.checked_add(u32::try_from(i).ok()?)?;
                        Some((code, operand_as_float(resolve(doc, w))))
                    })
                    .collect();
            }
            Some(dict)
        };

        if let Some(descriptor) = descriptor_owner.and_then(|d| get_dict(doc, d, b"FontDescriptor")) {
            if let Some(ascent) = get_number(doc, descriptor, b"Ascent").filter(|a| *a > 0.0) {
                info.ascent = ascent;
            }
            if let Some(descent) = get_number(doc, descriptor, b"Descent").filter(|d| *d < 0.0) {
                info.descent = descent;
            }
            if !two_byte {
                if let Some(missing) = get_number(doc, descriptor, b"MissingWidth") {
                    info.default_width = missing;
                }
            }
        }

        info
    }

    /// Split a string operand into character codes.
    pub fn codes<'b>(&self, bytes: &'b [u8]) -> Vec<(u32, &'b [u8])> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| {
                    let code = c.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    (code, c)
                })
                .collect()
        } else {
            bytes.chunks(1).map(|c| (c[0] as u32, c)).collect()
        }
    }

    pub fn glyph_width(&self, code: u32) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn simple_font_widths_offset_by_first_char() {
        let doc = Document::with_version("1.5");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Mangal",
            "FirstChar" => Object::Integer(65),
            "Widths" => vec![Object::Integer(600), Object::Integer(700)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        assert_eq!(info.base_font, "ABCDEF+Mangal");
        assert!(!info.two_byte);
        assert_eq!(info.glyph_width(65), 600.0);
        assert_eq!(info.glyph_width(66), 700.0);
        assert_eq!(info.glyph_width(67), FALLBACK_WIDTH);
    }

    #[test]
    fn cid_width_runs() {
        let doc = Document::with_version("1.5");
        let w = vec![
            Object::Integer(1),
            Object::Array(vec![Object::Integer(400), Object::Integer(410)]),
            Object::Integer(10),
            Object::Integer(12),
            Object::Integer(900),
        ];
        let widths = parse_cid_widths(&doc, &w);
        assert_eq!(widths.get(&1), Some(&400.0));
        assert_eq!(widths.get(&2), Some(&410.0));
        assert_eq!(widths.get(&11), Some(&900.0));
        assert_eq!(widths.get(&13), None);
    }

    #[test]
    fn malformed_cid_width_runs_are_bounded() {
        let doc = Document::with_version("1.5");
        let ints = |v: &[i64]| v.iter().map(|i| Object::Integer(*i)).collect::<Vec<_>>();

        // Reversed and negative ranges are skipped; later runs still parse.
        let widths = parse_cid_widths(&doc, &ints(&[3, -1, 500, 9, 2, 600, 20, 21, 700]));
        assert_eq!(widths.len(), 2);
        assert_eq!(widths.get(&20), Some(&700.0));

        // A range past CID space is clipped to it.
        let widths = parse_cid_widths(&doc, &ints(&[0xFFFE, i64::from(u32::MAX), 300]));
        assert_eq!(widths.len(), 2);
        assert_eq!(widths.get(&0xFFFF), Some(&300.0));

        // A negative or oversized start code ends parsing.
        assert!(parse_cid_widths(&doc, &ints(&[-4, 10, 500])).is_empty());
        assert!(parse_cid_widths(&doc, &ints(&[0x1_0000, 0x1_0001, 500])).is_empty());
    }

    #[test]
    fn two_byte_codes() {
        let info = FontInfo {
            two_byte: true,
            ..FontInfo::default()
        };
        let codes: Vec<u32> = info.codes(&[0x00, 0x41, 0x01, 0x02]).iter().map(|c| c.0).collect();
        assert_eq!(codes, vec![0x41, 0x0102]);
    }
}
