//! The field-presence heuristic: feeds extracted pages through the catalog
//! patterns and accumulates what was found.

use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, error, info};
use unicode_normalization::UnicodeNormalization;

use crate::catalog::CompiledCatalog;
use crate::error::{ProbeError, Result};
use crate::logging::FIELD_MATCH;
use crate::parse::PageContent;
use crate::tables::Cell;

const EXCERPT_CHARS: usize = 500;
const FULL_TEXT_SAMPLE_CHARS: usize = 1000;
const SAMPLE_ROWS: usize = 3;
/// Font groups with this many chars or fewer are not searched.
const MIN_FONT_GROUP_CHARS: usize = 10;

/// One pattern match on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldHit {
    pub page: u32,
    pub concept: String,
    pub matched: String,
}

/// A keyword found inside a run of same-font characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontHit {
    pub page: u32,
    pub keyword: String,
    pub font: String,
    pub size: f32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub page: u32,
    /// 1-based index of the table on its page.
    pub table: usize,
    /// Non-empty rows below the header.
    pub rows: usize,
    pub columns: usize,
    pub header: Vec<String>,
    pub sample_data: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualElements {
    pub page: u32,
    pub lines: usize,
    pub rects: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageExcerpt {
    pub page: u32,
    pub text: String,
}

/// Everything one run accumulates.
///
/// `matched_labels` is the de-duplicated view of matched substrings;
/// `field_hits` keeps every hit, so the same label matched on two pages
/// appears twice there.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub pages_analyzed: usize,
    pub matched_labels: IndexSet<String>,
    pub field_hits: Vec<FieldHit>,
    pub font_hits: Vec<FontHit>,
    pub table_headers: IndexSet<String>,
    pub table_structure: Vec<TableSummary>,
    pub text_excerpts: Vec<PageExcerpt>,
    pub full_text_sample: String,
    pub text_diagnostics: Vec<String>,
    pub visual_elements: Vec<VisualElements>,
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Matched labels followed by font-group labels, without repeats.
    pub fn detected_fields(&self) -> IndexSet<&str> {
        self.matched_labels
            .iter()
            .map(String::as_str)
            .chain(self.font_hits.iter().map(|h| h.label.as_str()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Complete,
    Partial,
    Failed,
}

/// How a run ended. Every variant carries a structurally valid result.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Complete(ExtractionResult),
    /// Some pages were processed before a page failed.
    Partial { result: ExtractionResult, error: String },
    /// The document or catalog could not be used at all.
    Failed { result: ExtractionResult, error: String },
}

impl AnalysisOutcome {
    /// A failed run with an empty result that still records the error.
    pub fn failed(err: &ProbeError) -> Self {
        let error = err.to_string();
        error!(target: FIELD_MATCH, "analysis failed: {error}");
        AnalysisOutcome::Failed {
            result: ExtractionResult {
                error: Some(error.clone()),
                ..Default::default()
            },
            error,
        }
    }

    pub fn result(&self) -> &ExtractionResult {
        match self {
            AnalysisOutcome::Complete(result)
            | AnalysisOutcome::Partial { result, .. }
            | AnalysisOutcome::Failed { result, .. } => result,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Complete(_) => None,
            AnalysisOutcome::Partial { error, .. } | AnalysisOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            AnalysisOutcome::Complete(_) => OutcomeStatus::Complete,
            AnalysisOutcome::Partial { .. } => OutcomeStatus::Partial,
            AnalysisOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }
}

fn is_blank(cell: &Cell) -> bool {
    cell.as_deref().map_or(true, |c| c.trim().is_empty())
}

fn is_empty_row(row: &[Cell]) -> bool {
    row.iter().all(is_blank)
}

/// Summarise one extracted table, or `None` when every row is empty.
///
/// The first raw row is the header. Row and column counts both come from the
/// non-empty rows below it; with no such rows the header width is used.
pub fn summarize_table(page: u32, index: usize, table: &[Vec<Cell>]) -> Option<TableSummary> {
    if table.iter().all(|row| is_empty_row(row)) {
        return None;
    }
    let header_row = table.first().map(Vec::as_slice).unwrap_or_default();
    let header: Vec<String> = header_row
        .iter()
        .filter_map(|c| c.as_deref().map(str::trim))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let body: Vec<&Vec<Cell>> = table.iter().skip(1).filter(|row| !is_empty_row(row)).collect();
    let columns = body
        .iter()
        .map(|row| row.len())
        .max()
        .unwrap_or(header_row.len());

    Some(TableSummary {
        page,
        table: index,
        rows: body.len(),
        columns,
        header,
        sample_data: body.into_iter().take(SAMPLE_ROWS).cloned().collect(),
    })
}

fn first_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Incremental form of the heuristic: feed pages in order, then finish.
pub struct FieldHeuristic<'c> {
    catalog: &'c CompiledCatalog,
    font_analysis: bool,
    result: ExtractionResult,
}

impl<'c> FieldHeuristic<'c> {
    pub fn new(catalog: &'c CompiledCatalog, font_analysis: bool, page_count: usize) -> Self {
        FieldHeuristic {
            catalog,
            font_analysis,
            result: ExtractionResult {
                pages_analyzed: page_count,
                ..Default::default()
            },
        }
    }

    pub fn observe_page(&mut self, page: &PageContent) {
        let n = page.page_number;
        self.observe_text(n, page.extract_text());
        for (i, table) in page.extract_tables().iter().enumerate() {
            self.observe_table(n, i + 1, table);
        }
        if !page.lines.is_empty() || !page.rects.is_empty() {
            self.result.visual_elements.push(VisualElements {
                page: n,
                lines: page.lines.len(),
                rects: page.rects.len(),
            });
        }
        if self.font_analysis {
            self.observe_fonts(page);
        }
    }

    fn observe_text(&mut self, page: u32, text: Option<&str>) {
        let Some(text) = text else {
            self.result
                .text_diagnostics
                .push(format!("Page {page}: No direct text found"));
            return;
        };
        let text: String = text.nfc().collect();
        self.result
            .text_diagnostics
            .push(format!("Page {page}: Direct text extraction successful"));
        if self.result.full_text_sample.is_empty() {
            self.result.full_text_sample = first_chars(&text, FULL_TEXT_SAMPLE_CHARS);
        }
        self.result.text_excerpts.push(PageExcerpt {
            page,
            text: first_chars(&text, EXCERPT_CHARS),
        });

        for (concept, matched) in self.catalog.find_all(&text) {
            debug!(target: FIELD_MATCH, page, concept, matched, "pattern matched");
            self.result.matched_labels.insert(matched.to_string());
            self.result.field_hits.push(FieldHit {
                page,
                concept: concept.to_string(),
                matched: matched.to_string(),
            });
        }
    }

    fn observe_table(&mut self, page: u32, index: usize, table: &[Vec<Cell>]) {
        let Some(summary) = summarize_table(page, index, table) else {
            debug!(target: FIELD_MATCH, page, table = index, "skipping empty table");
            return;
        };
        self.result.table_headers.extend(summary.header.iter().cloned());
        self.result.table_structure.push(summary);
    }

    fn observe_fonts(&mut self, page: &PageContent) {
        let mut groups: IndexMap<(&str, OrderedFloat<f32>), String> = IndexMap::new();
        for c in &page.chars {
            groups
                .entry((c.font_name.as_str(), OrderedFloat(c.size)))
                .or_default()
                .push_str(&c.text);
        }

        for ((font, size), text) in groups {
            let text: String = text.nfc().collect();
            if text.chars().count() <= MIN_FONT_GROUP_CHARS {
                continue;
            }
            for keyword in &self.catalog.catalog.font_keywords {
                if text.contains(keyword.as_str()) {
                    self.result.font_hits.push(FontHit {
                        page: page.page_number,
                        keyword: keyword.clone(),
                        font: font.to_string(),
                        size: size.0,
                        label: format!("{keyword} (Font: {font}_{})", size.0),
                    });
                }
            }
        }
    }

    pub fn finish(self) -> AnalysisOutcome {
        info!(
            target: FIELD_MATCH,
            labels = self.result.matched_labels.len(),
            tables = self.result.table_structure.len(),
            "analysis complete"
        );
        AnalysisOutcome::Complete(self.result)
    }

    /// Stop at a page failure, keeping what earlier pages contributed.
    pub fn abort(mut self, err: &ProbeError) -> AnalysisOutcome {
        let error = err.to_string();
        error!(target: FIELD_MATCH, "stopping after page failure: {error}");
        self.result.error = Some(error.clone());
        AnalysisOutcome::Partial {
            result: self.result,
            error,
        }
    }
}

/// Run the heuristic over pages in order. The first page error ends the run
/// with a partial outcome.
pub fn analyze_pages<I>(page_count: usize, pages: I, catalog: &CompiledCatalog, font_analysis: bool) -> AnalysisOutcome
where
    I: IntoIterator<Item = Result<PageContent>>,
{
    let mut heuristic = FieldHeuristic::new(catalog, font_analysis, page_count);
    for page in pages {
        match page {
            Ok(page) => heuristic.observe_page(&page),
            Err(e) => return heuristic.abort(&e),
        }
    }
    heuristic.finish()
}
