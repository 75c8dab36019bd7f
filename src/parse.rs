use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Encoding, Object, ObjectId};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{ProbeError, Result};
use crate::fonts::FontInfo;
use crate::geo::{multiply_matrices, transform_point, translate_matrix, Matrix, Rect, IDENTITY};
use crate::layout;
use crate::logging::{PDF_OPERATIONS, PDF_PARSING};
use crate::tables::{self, Cell, TableSettings};

/// US Letter, used when no MediaBox can be found.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// A single glyph placed on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharElement {
    pub text: String,
    pub font_name: String,
    pub size: f32,
    pub bbox: Rect,
}

impl fmt::Display for CharElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {}pt {} ({:.1}, {:.1})",
            self.text, self.size, self.font_name, self.bbox.x0, self.bbox.y0
        )
    }
}

/// A stroked straight segment, in top-down page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineElement {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// A painted `re` rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectElement {
    pub bbox: Rect,
}

/// Everything extracted from one page: the per-page bundle the field
/// heuristic consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub tables: Vec<Vec<Vec<Cell>>>,
    pub chars: Vec<CharElement>,
    pub lines: Vec<LineElement>,
    pub rects: Vec<RectElement>,
}

impl PageContent {
    pub fn new(page_number: u32) -> Self {
        PageContent {
            page_number,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Add a table given as rows of cell strings; empty strings become `None`.
    pub fn with_table(mut self, rows: &[&[&str]]) -> Self {
        self.tables.push(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|c| (!c.is_empty()).then(|| c.to_string()))
                        .collect()
                })
                .collect(),
        );
        self
    }

    pub fn with_chars(mut self, chars: Vec<CharElement>) -> Self {
        self.chars = chars;
        self
    }

    pub fn extract_text(&self) -> Option<&str> {
        (!self.text.trim().is_empty()).then_some(self.text.as_str())
    }

    pub fn extract_tables(&self) -> &[Vec<Vec<Cell>>] {
        &self.tables
    }
}

#[derive(Clone, Debug)]
struct GraphicsState {
    ctm: Matrix,
    text_state: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: IDENTITY,
            text_state: TextState::default(),
        }
    }
}

#[derive(Clone, Debug)]
struct TextState {
    text_matrix: Matrix,      // Tm
    text_line_matrix: Matrix, // Tlm
    font_resource: Option<Vec<u8>>,
    font_size: f32,
    character_spacing: f32,  // Tc
    word_spacing: f32,       // Tw
    horizontal_scaling: f32, // Tz, as a fraction
    leading: f32,            // TL
    rise: f32,               // Ts
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            text_matrix: IDENTITY,
            text_line_matrix: IDENTITY,
            font_resource: None,
            font_size: 0.0,
            character_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn begin_text(&mut self) {
        self.text_matrix = IDENTITY;
        self.text_line_matrix = IDENTITY;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text_matrix = multiply_matrices(&translate_matrix(tx, ty), &self.text_line_matrix);
        self.text_line_matrix = self.text_matrix;
    }
}

/// A subpath under construction, in device space with PDF's y-up axis.
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<((f32, f32), (f32, f32))>,
    rects: Vec<Rect>,
    start: Option<(f32, f32)>,
    current: Option<(f32, f32)>,
}

impl PathBuilder {
    fn move_to(&mut self, p: (f32, f32)) {
        self.start = Some(p);
        self.current = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(from) = self.current {
            self.segments.push((from, p));
        }
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.start) {
            if from != start {
                self.segments.push((from, start));
            }
            self.current = Some(start);
        }
    }

    fn clear(&mut self) {
        *self = PathBuilder::default();
    }
}

pub fn operand_as_float(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

fn matrix_from_operands(op: &Operation) -> Matrix {
    op.operands
        .iter()
        .map(operand_as_float)
        .collect::<Vec<f32>>()
        .try_into()
        .unwrap_or(IDENTITY)
}

fn operand_pair(op: &Operation) -> Option<(f32, f32)> {
    match (op.operands.first(), op.operands.get(1)) {
        (Some(a), Some(b)) => Some((operand_as_float(a), operand_as_float(b))),
        _ => None,
    }
}

/// Text for a code the font's encoding cannot map. Two-byte codes are CIDs
/// with no Unicode meaning of their own, so they are shown as `(cid:N)`.
fn undecoded(font: &FontInfo, code: u32, raw: &[u8]) -> String {
    if font.two_byte {
        format!("(cid:{code})")
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Per-page font resources resolved once before interpretation.
struct PageFonts<'a> {
    info: BTreeMap<Vec<u8>, FontInfo>,
    encodings: BTreeMap<Vec<u8>, Encoding<'a>>,
}

/// Interprets one page's content stream into chars, lines and rects.
struct PageInterpreter<'a> {
    fonts: &'a PageFonts<'a>,
    page_height: f32,
    origin: (f32, f32),
    gs_stack: Vec<GraphicsState>,
    path: PathBuilder,
    chars: Vec<CharElement>,
    lines: Vec<LineElement>,
    rects: Vec<RectElement>,
}

impl<'a> PageInterpreter<'a> {
    fn new(fonts: &'a PageFonts<'a>, media_box: [f32; 4]) -> Self {
        PageInterpreter {
            fonts,
            page_height: media_box[3] - media_box[1],
            origin: (media_box[0], media_box[1]),
            gs_stack: vec![GraphicsState::default()],
            path: PathBuilder::default(),
            chars: Vec::new(),
            lines: Vec::new(),
            rects: Vec::new(),
        }
    }

    fn gs(&mut self) -> &mut GraphicsState {
        if self.gs_stack.is_empty() {
            self.gs_stack.push(GraphicsState::default());
        }
        let last = self.gs_stack.len() - 1;
        &mut self.gs_stack[last]
    }

    /// Device point (y-up) to top-down page coordinates.
    fn to_page(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x - self.origin.0, self.page_height - (y - self.origin.1))
    }

    fn device_point(&mut self, x: f32, y: f32) -> (f32, f32) {
        let ctm = self.gs().ctm;
        transform_point(&ctm, x, y)
    }

    fn handle(&mut self, op: &Operation) {
        trace!(target: PDF_OPERATIONS, operator = %op.operator, operands = op.operands.len());
        match op.operator.as_ref() {
            "q" => {
                let top = self.gs().clone();
                self.gs_stack.push(top);
            }
            "Q" => {
                if self.gs_stack.len() > 1 {
                    self.gs_stack.pop();
                }
            }
            "cm" => {
                let m = matrix_from_operands(op);
                let gs = self.gs();
                gs.ctm = multiply_matrices(&m, &gs.ctm);
            }
            "BT" => self.gs().text_state.begin_text(),
            "ET" => {}
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) = (op.operands.first(), op.operands.get(1)) {
                    let ts = &mut self.gs().text_state;
                    ts.font_resource = Some(name.clone());
                    ts.font_size = operand_as_float(size);
                }
            }
            "Tc" => {
                if let Some(v) = op.operands.first() {
                    self.gs().text_state.character_spacing = operand_as_float(v);
                }
            }
            "Tw" => {
                if let Some(v) = op.operands.first() {
                    self.gs().text_state.word_spacing = operand_as_float(v);
                }
            }
            "Tz" => {
                if let Some(v) = op.operands.first() {
                    self.gs().text_state.horizontal_scaling = operand_as_float(v) / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = op.operands.first() {
                    self.gs().text_state.leading = operand_as_float(v);
                }
            }
            "Ts" => {
                if let Some(v) = op.operands.first() {
                    self.gs().text_state.rise = operand_as_float(v);
                }
            }
            "Tm" => {
                let m = matrix_from_operands(op);
                let ts = &mut self.gs().text_state;
                ts.text_matrix = m;
                ts.text_line_matrix = m;
            }
            "Td" => {
                if let Some((tx, ty)) = operand_pair(op) {
                    self.gs().text_state.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = operand_pair(op) {
                    let ts = &mut self.gs().text_state;
                    ts.leading = -ty;
                    ts.move_line(tx, ty);
                }
            }
            "T*" => {
                let ts = &mut self.gs().text_state;
                let leading = ts.leading;
                ts.move_line(0.0, -leading);
            }
            "Tj" | "TJ" => self.show_text(&op.operands),
            "'" => {
                let ts = &mut self.gs().text_state;
                let leading = ts.leading;
                ts.move_line(0.0, -leading);
                self.show_text(&op.operands);
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (op.operands.first(), op.operands.get(1)) {
                    let ts = &mut self.gs().text_state;
                    ts.word_spacing = operand_as_float(aw);
                    ts.character_spacing = operand_as_float(ac);
                    let leading = ts.leading;
                    ts.move_line(0.0, -leading);
                }
                self.show_text(op.operands.get(2..).unwrap_or(&[]));
            }
            "m" => {
                if let Some((x, y)) = operand_pair(op) {
                    let p = self.device_point(x, y);
                    self.path.move_to(p);
                }
            }
            "l" => {
                if let Some((x, y)) = operand_pair(op) {
                    let p = self.device_point(x, y);
                    self.path.line_to(p);
                }
            }
            "h" => self.path.close(),
            "re" => {
                let v: Vec<f32> = op.operands.iter().map(operand_as_float).collect();
                if let &[x, y, w, h] = v.as_slice() {
                    let a = self.device_point(x, y);
                    let b = self.device_point(x + w, y + h);
                    self.path.rects.push(Rect::new(a.0, a.1, b.0, b.1));
                    self.path.move_to(a);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if matches!(op.operator.as_ref(), "s" | "b" | "b*") {
                    self.path.close();
                }
                self.paint_path();
            }
            "n" => self.path.clear(),
            _ => {}
        }
    }

    fn paint_path(&mut self) {
        let path = std::mem::take(&mut self.path);
        for (a, b) in path.segments {
            let (x0, y0) = self.to_page(a);
            let (x1, y1) = self.to_page(b);
            self.lines.push(LineElement { x0, y0, x1, y1 });
        }
        for r in path.rects {
            let (x0, y0) = self.to_page((r.x0, r.y0));
            let (x1, y1) = self.to_page((r.x1, r.y1));
            self.rects.push(RectElement {
                bbox: Rect::new(x0, y0, x1, y1),
            });
        }
    }

    fn show_text(&mut self, operands: &[Object]) {
        for operand in operands {
            match operand {
                Object::String(bytes, _) => self.show_string(bytes),
                Object::Array(items) => self.show_text(items),
                Object::Integer(_) | Object::Real(_) => {
                    let ts = &mut self.gs().text_state;
                    let tx = -operand_as_float(operand) / 1000.0 * ts.font_size * ts.horizontal_scaling;
                    ts.text_matrix = multiply_matrices(&translate_matrix(tx, 0.0), &ts.text_matrix);
                }
                _ => {}
            }
        }
    }

    fn show_string(&mut self, bytes: &[u8]) {
        let state = self.gs().clone();
        let ts = state.text_state;
        let Some(resource) = ts.font_resource.as_ref() else {
            warn!(target: PDF_PARSING, "text shown before any Tf; skipped");
            return;
        };
        let fonts = self.fonts;
        let fallback = FontInfo::default();
        let font = fonts.info.get(resource).unwrap_or(&fallback);
        let encoding = fonts.encodings.get(resource);

        let mut text_matrix = ts.text_matrix;
        for (code, raw) in font.codes(bytes) {
            let text = match encoding {
                Some(enc) => Document::decode_text(enc, raw).unwrap_or_else(|_| undecoded(font, code, raw)),
                None => undecoded(font, code, raw),
            };

            let w0 = font.glyph_width(code) / 1000.0;
            // Text rendering matrix: font size and scaling, then Tm, then CTM.
            let trm = multiply_matrices(
                &multiply_matrices(
                    &[
                        ts.font_size * ts.horizontal_scaling,
                        0.0,
                        0.0,
                        ts.font_size,
                        0.0,
                        ts.rise,
                    ],
                    &text_matrix,
                ),
                &state.ctm,
            );

            let size = (trm[2] * trm[2] + trm[3] * trm[3]).sqrt();
            let (ox, oy) = transform_point(&trm, 0.0, 0.0);
            let (ex, _) = transform_point(&trm, w0, 0.0);
            let top = oy + font.ascent / 1000.0 * size;
            let bottom = oy + font.descent / 1000.0 * size;
            let (x0, y0) = self.to_page((ox, top));
            let (x1, y1) = self.to_page((ex, bottom));

            if !text.is_empty() {
                self.chars.push(CharElement {
                    text: text.clone(),
                    font_name: font.base_font.clone(),
                    size,
                    bbox: Rect::new(x0, y0, x1, y1),
                });
            }

            let word_spacing = if !font.two_byte && code == 32 {
                ts.word_spacing
            } else {
                0.0
            };
            let tx = (w0 * ts.font_size + ts.character_spacing + word_spacing) * ts.horizontal_scaling;
            text_matrix = multiply_matrices(&translate_matrix(tx, 0.0), &text_matrix);
        }

        self.gs().text_state.text_matrix = text_matrix;
    }
}

/// Walk up the page tree for an inheritable attribute such as `MediaBox`.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(match value {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            });
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box(doc: &Document, page: &Dictionary) -> [f32; 4] {
    inherited(doc, page, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .filter(|arr| arr.len() >= 4)
        .map(|arr| {
            let mut media_box = [0.0; 4];
            for (i, obj) in arr.iter().take(4).enumerate() {
                media_box[i] = operand_as_float(obj);
            }
            media_box
        })
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// An opened PDF, ready for per-page extraction.
pub struct PdfDocument {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    settings: TableSettings,
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("pages", &self.pages.len())
            .finish()
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::full(&raw).map(|p| p.into_owned()).unwrap_or_else(|_| raw.into_owned()))
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_path(path.as_ref());
        if !path.exists() {
            return Err(ProbeError::FileNotFound(path));
        }
        debug!(target: PDF_PARSING, path = %path.display(), "loading PDF");
        let doc = Document::load(&path)?;
        Ok(Self::from_document(doc))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_document(Document::load_mem(bytes)?))
    }

    fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages();
        PdfDocument {
            doc,
            pages,
            settings: TableSettings::default(),
        }
    }

    pub fn with_table_settings(mut self, settings: TableSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Extract one page by its 1-based number.
    pub fn extract_page(&self, page_number: u32) -> Result<PageContent> {
        let page_id = *self.pages.get(&page_number).ok_or_else(|| ProbeError::PageContent {
            page: page_number,
            message: "no such page".to_string(),
        })?;
        self.page_content(page_number, page_id)
            .map_err(|e| ProbeError::PageContent {
                page: page_number,
                message: e.to_string(),
            })
    }

    fn page_content(&self, page_number: u32, page_id: ObjectId) -> Result<PageContent> {
        let doc = &self.doc;
        let page_dict = doc.get_dictionary(page_id)?;
        let media_box = media_box(doc, page_dict);

        let font_dicts = doc.get_page_fonts(page_id)?;
        let mut fonts = PageFonts {
            info: BTreeMap::new(),
            encodings: BTreeMap::new(),
        };
        for (name, dict) in &font_dicts {
            fonts.info.insert(name.clone(), FontInfo::from_dict(doc, dict));
            match dict.get_font_encoding(doc) {
                Ok(encoding) => {
                    fonts.encodings.insert(name.clone(), encoding);
                }
                Err(e) => warn!(
                    target: PDF_PARSING,
                    page = page_number,
                    font = %String::from_utf8_lossy(name),
                    "no usable encoding: {e}"
                ),
            }
        }

        // A page without a content stream is blank, not broken.
        let operations = match doc.get_and_decode_page_content(page_id) {
            Ok(content) => content.operations,
            Err(e) if doc.get_page_contents(page_id).is_empty() => {
                debug!(target: PDF_PARSING, page = page_number, "no content stream: {e}");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut interpreter = PageInterpreter::new(&fonts, media_box);
        for op in &operations {
            interpreter.handle(op);
        }

        let PageInterpreter {
            chars, lines, rects, ..
        } = interpreter;

        let text_lines = layout::group_chars_into_lines(&chars, self.settings.y_tolerance);
        let text = layout::lines_to_text(&text_lines, self.settings.x_tolerance);
        let tables = tables::find_tables(&lines, &rects, &chars, &self.settings)
            .into_iter()
            .map(|t| t.rows)
            .collect();

        debug!(
            target: PDF_PARSING,
            page = page_number,
            chars = chars.len(),
            lines = lines.len(),
            rects = rects.len(),
            "page interpreted"
        );

        Ok(PageContent {
            page_number,
            width: media_box[2] - media_box[0],
            height: media_box[3] - media_box[1],
            text,
            tables,
            chars,
            lines,
            rects,
        })
    }

    /// 1-based page numbers in document order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Extract every page in order. Sequential extraction is lazy; with
    /// `parallel` all pages are extracted up front on rayon workers and
    /// yielded in order.
    pub fn pages(&self, parallel: bool) -> Box<dyn Iterator<Item = Result<PageContent>> + '_> {
        let numbers = self.page_numbers();
        if parallel {
            let extracted: Vec<_> = numbers.par_iter().map(|n| self.extract_page(*n)).collect();
            Box::new(extracted.into_iter())
        } else {
            Box::new(numbers.into_iter().map(move |n| self.extract_page(n)))
        }
    }
}
