pub mod catalog;
pub mod config;
pub mod error;
pub mod fonts;
pub mod geo;
pub mod heuristic;
pub mod layout;
pub mod logging;
pub mod parse;
pub mod render;
pub mod report;
pub mod tables;

use tracing::info;

use crate::config::ProbeConfig;
use crate::heuristic::{analyze_pages, AnalysisOutcome};
use crate::logging::PDF_PARSING;
use crate::parse::{PageContent, PdfDocument};

pub use crate::catalog::FieldCatalog;
pub use crate::config::ReportMode;
pub use crate::error::{ProbeError, Result};
pub use crate::report::AnalysisReport;

/// Receives progress while a run extracts pages.
pub trait RunObserver {
    /// Called once the document is open, before any page is extracted.
    fn document_opened(&mut self, _page_count: usize) {}

    /// Called with each extracted page before the heuristic sees it.
    fn page_extracted(&mut self, page: &PageContent);
}

impl<F: FnMut(&PageContent)> RunObserver for F {
    fn page_extracted(&mut self, page: &PageContent) {
        self(page)
    }
}

/// Analyse the configured PDF.
pub fn run(config: &ProbeConfig) -> AnalysisOutcome {
    run_observed(config, |_: &PageContent| {})
}

/// Analyse the configured PDF, reporting progress to `observer`.
///
/// Never returns an error: a document that cannot be opened, or a catalog
/// that does not compile, yields `AnalysisOutcome::Failed`; a page that
/// cannot be extracted ends the run with `AnalysisOutcome::Partial`.
pub fn run_observed<O: RunObserver>(config: &ProbeConfig, mut observer: O) -> AnalysisOutcome {
    let catalog = match config.catalog.compile() {
        Ok(catalog) => catalog,
        Err(e) => return AnalysisOutcome::failed(&e),
    };

    let document = match PdfDocument::open(&config.input) {
        Ok(doc) => doc.with_table_settings(config.table_settings),
        Err(e) => return AnalysisOutcome::failed(&e),
    };
    let page_count = document.page_count();
    info!(
        target: PDF_PARSING,
        path = %config.input.display(),
        pages = page_count,
        mode = ?config.mode,
        "analysing document"
    );
    observer.document_opened(page_count);

    let pages = document.pages(config.parallel).inspect(|page| {
        if let Ok(page) = page {
            observer.page_extracted(page);
        }
    });
    analyze_pages(page_count, pages, &catalog, config.mode.font_analysis())
}
