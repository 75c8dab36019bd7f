//! Console transcripts. Each mode prints per-page progress while the run is
//! going and a summary at the end; all output goes through a `Write` so the
//! transcript can be captured.

use std::io::{self, Write};
use std::path::Path;

use crate::config::ReportMode;
use crate::parse::PageContent;
use crate::report::AnalysisReport;
use crate::tables::Cell;

const TEXT_PREVIEW_CHARS: usize = 500;
const PREVIEW_ROWS: usize = 5;
const SUGGESTED_FIELDS_SHOWN: usize = 15;

fn format_cell(cell: &Cell) -> String {
    match cell {
        Some(text) => format!("{text:?}"),
        None => "None".to_string(),
    }
}

/// `["Survey No", "Owner", None]`
pub fn format_row(row: &[Cell]) -> String {
    let cells: Vec<String> = row.iter().map(format_cell).collect();
    format!("[{}]", cells.join(", "))
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TEXT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn rule(out: &mut impl Write, width: usize) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(width))
}

fn bullets<'a, I>(out: &mut impl Write, items: I) -> io::Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for item in items {
        writeln!(out, "  - {item}")?;
    }
    Ok(())
}

pub fn banner(mode: ReportMode, out: &mut impl Write) -> io::Result<()> {
    match mode {
        ReportMode::Fields => writeln!(out, "Analyzing PDF structure..."),
        ReportMode::Advanced => writeln!(out, "Performing advanced PDF analysis..."),
        ReportMode::Dump => writeln!(out, "Extracting PDF content..."),
    }
}

/// Printed once the document is open, before the first page.
pub fn page_count(mode: ReportMode, pages: usize, out: &mut impl Write) -> io::Result<()> {
    match mode {
        ReportMode::Fields | ReportMode::Dump => writeln!(out, "PDF has {pages} pages"),
        ReportMode::Advanced => writeln!(out, "Analyzing {pages} pages..."),
    }
}

fn print_tables(page: &PageContent, out: &mut impl Write) -> io::Result<()> {
    for (i, table) in page.extract_tables().iter().enumerate() {
        writeln!(out, "\nTable {}:", i + 1)?;
        if let Some(header) = table.first() {
            writeln!(out, "Headers: {}", format_row(header))?;
        }
        for (r, row) in table.iter().take(PREVIEW_ROWS).enumerate() {
            writeln!(out, "Row {}: {}", r + 1, format_row(row))?;
        }
    }
    Ok(())
}

/// Progress lines for one extracted page.
pub fn page(mode: ReportMode, page: &PageContent, out: &mut impl Write) -> io::Result<()> {
    let n = page.page_number;
    let tables = page.extract_tables().len();
    match mode {
        ReportMode::Fields => {
            writeln!(out, "\n--- Page {n} ---")?;
            if let Some(text) = page.extract_text() {
                writeln!(out, "Text content:")?;
                writeln!(out, "{}", preview(text))?;
            }
            if tables > 0 {
                writeln!(out, "\nFound {tables} tables on page {n}")?;
                print_tables(page, out)?;
            }
        }
        ReportMode::Advanced => {
            writeln!(out, "\n--- Analyzing Page {n} ---")?;
            if let Some(text) = page.extract_text() {
                writeln!(out, "Direct text found: {} characters", text.chars().count())?;
            }
            if tables > 0 {
                writeln!(out, "Found {tables} tables")?;
            }
        }
        ReportMode::Dump => {
            writeln!(out, "\n=== Page {n} ({:.0} x {:.0}) ===", page.width, page.height)?;
            match page.extract_text() {
                Some(text) => writeln!(out, "{text}")?,
                None => writeln!(out, "(no text)")?,
            }
            if tables > 0 {
                writeln!(out, "\n{tables} table(s)")?;
                print_tables(page, out)?;
            }
        }
    }
    Ok(())
}

/// The diagnostic line for a run that ended in error.
pub fn failure(mode: ReportMode, error: &str, out: &mut impl Write) -> io::Result<()> {
    match mode {
        ReportMode::Fields => writeln!(out, "Error processing PDF: {error}"),
        ReportMode::Advanced => writeln!(out, "Error during advanced analysis: {error}"),
        ReportMode::Dump => writeln!(out, "Error extracting PDF: {error}"),
    }
}

pub fn analysis_failed(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Failed to analyze PDF")
}

fn fields_summary(report: &AnalysisReport, out: &mut impl Write) -> io::Result<()> {
    let result = &report.extraction;
    writeln!(out)?;
    rule(out, 50)?;
    writeln!(out, "ANALYSIS RESULTS")?;
    rule(out, 50)?;

    writeln!(out, "\nTotal Pages: {}", result.pages_analyzed)?;

    writeln!(out, "\nTable Headers Found: {}", result.table_headers.len())?;
    bullets(out, result.table_headers.iter().map(String::as_str))?;

    writeln!(out, "\nIdentified Field Patterns: {}", result.matched_labels.len())?;
    bullets(out, result.matched_labels.iter().map(String::as_str))?;

    writeln!(out, "\nPDF Suggested Additional Fields: {}", report.pdf_suggested_fields.len())?;
    bullets(out, report.pdf_suggested_fields.iter().map(String::as_str))?;

    writeln!(out, "\nCurrent JMR Fields: {}", report.current_fields.len())?;
    bullets(out, report.current_fields.iter().map(String::as_str))
}

fn advanced_summary(report: &AnalysisReport, out: &mut impl Write) -> io::Result<()> {
    let result = &report.extraction;
    writeln!(out)?;
    rule(out, 60)?;
    writeln!(out, "ADVANCED ANALYSIS RESULTS")?;
    rule(out, 60)?;

    writeln!(out, "\nPages Analyzed: {}", result.pages_analyzed)?;

    writeln!(out, "\nText Extraction Results:")?;
    bullets(out, result.text_diagnostics.iter().map(String::as_str))?;

    let detected = result.detected_fields();
    writeln!(out, "\nForm Fields Detected: {}", result.field_hits.len() + result.font_hits.len())?;
    bullets(out, detected)?;

    writeln!(out, "\nTable Structure:")?;
    for t in &result.table_structure {
        writeln!(
            out,
            "  - Page {}, Table {}: {} rows x {} columns",
            t.page, t.table, t.rows, t.columns
        )?;
    }

    writeln!(out, "\nVisual Elements:")?;
    for v in &result.visual_elements {
        if v.lines > 0 {
            writeln!(out, "  - Page {}: {} lines detected", v.page, v.lines)?;
        }
        if v.rects > 0 {
            writeln!(out, "  - Page {}: {} rectangles detected", v.page, v.rects)?;
        }
    }

    writeln!(out, "\nRecommendations:")?;
    bullets(out, report.recommendations.iter().map(String::as_str))?;

    writeln!(
        out,
        "\nSuggested Additional Fields ({}):",
        report.suggested_additional_fields.len()
    )?;
    bullets(
        out,
        report
            .suggested_additional_fields
            .iter()
            .take(SUGGESTED_FIELDS_SHOWN)
            .map(String::as_str),
    )
}

fn dump_summary(report: &AnalysisReport, out: &mut impl Write) -> io::Result<()> {
    let result = &report.extraction;
    writeln!(out)?;
    rule(out, 40)?;
    writeln!(
        out,
        "{} pages, {} tables, {} matched labels",
        result.pages_analyzed,
        result.table_structure.len(),
        result.matched_labels.len()
    )
}

pub fn summary(mode: ReportMode, report: &AnalysisReport, out: &mut impl Write) -> io::Result<()> {
    match mode {
        ReportMode::Fields => fields_summary(report, out),
        ReportMode::Advanced => advanced_summary(report, out),
        ReportMode::Dump => dump_summary(report, out),
    }
}

pub fn saved(path: &Path, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nDetailed results saved to: {}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldCatalog;
    use crate::heuristic::{analyze_pages, AnalysisOutcome};

    fn transcript(mode: ReportMode, outcome: &AnalysisOutcome) -> String {
        let mut out = Vec::new();
        let report = AnalysisReport::new(outcome, &FieldCatalog::jmr());
        summary(mode, &report, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn sample_outcome() -> AnalysisOutcome {
        let catalog = FieldCatalog::jmr().compile().unwrap();
        let pages = vec![
            Ok(PageContent::new(1).with_text("सर्वे नं. 12, Tree count")),
            Ok(PageContent::new(2).with_table(&[&["Survey No", "Owner"], &["12", "Ramesh"]])),
        ];
        analyze_pages(2, pages, &catalog, true)
    }

    #[test]
    fn page_count_line_per_mode() {
        let line = |mode| {
            let mut out = Vec::new();
            page_count(mode, 3, &mut out).unwrap();
            String::from_utf8(out).unwrap()
        };
        assert_eq!(line(ReportMode::Fields), "PDF has 3 pages\n");
        assert_eq!(line(ReportMode::Advanced), "Analyzing 3 pages...\n");
        assert_eq!(line(ReportMode::Dump), "PDF has 3 pages\n");
    }

    #[test]
    fn row_formatting() {
        let row = vec![Some("Survey No".to_string()), None, Some(String::new())];
        assert_eq!(format_row(&row), r#"["Survey No", None, ""]"#);
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "अ".repeat(600);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), TEXT_PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn fields_summary_lists_headers_and_patterns() {
        let text = transcript(ReportMode::Fields, &sample_outcome());
        assert!(text.contains("ANALYSIS RESULTS"));
        assert!(text.contains("Total Pages: 2"));
        assert!(text.contains("Table Headers Found: 2\n  - Survey No\n  - Owner"));
        assert!(text.contains("  - सर्वे नं."));
        assert!(text.contains("PDF Suggested Additional Fields: 2\n  - tree_details"));
        assert!(text.contains("Current JMR Fields: 14"));
    }

    #[test]
    fn advanced_summary_shows_structure_and_first_fifteen() {
        let text = transcript(ReportMode::Advanced, &sample_outcome());
        assert!(text.contains("  - Page 1: Direct text extraction successful"));
        assert!(text.contains("  - Page 2: No direct text found"));
        assert!(text.contains("  - Page 2, Table 1: 1 rows x 2 columns"));
        assert!(text.contains("Suggested Additional Fields (33):"));
        assert!(text.contains("  - revenue_village"));
        assert!(!text.contains("  - survey_settlement"));
    }

    #[test]
    fn page_progress_per_mode() {
        let page = PageContent::new(3)
            .with_text("Village")
            .with_table(&[&["A", "B"], &["1", "2"]]);

        let mut out = Vec::new();
        super::page(ReportMode::Fields, &page, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("--- Page 3 ---\nText content:\nVillage"));
        assert!(text.contains("Found 1 tables on page 3"));
        assert!(text.contains("Headers: [\"A\", \"B\"]"));

        let mut out = Vec::new();
        super::page(ReportMode::Advanced, &page, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Direct text found: 7 characters"));
    }
}
