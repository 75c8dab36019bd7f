use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::FieldCatalog;
use crate::parse::expand_path;
use crate::tables::TableSettings;

/// Which report a run produces. The modes share one heuristic and differ in
/// what they print and where they write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Labels, headers and suggested fields.
    Fields,
    /// Per-page diagnostics, font-group analysis and recommendations.
    Advanced,
    /// Raw page text and tables.
    Dump,
}

impl ReportMode {
    pub fn default_output(&self) -> Option<&'static str> {
        match self {
            ReportMode::Fields => Some("pdf_analysis_results.json"),
            ReportMode::Advanced => Some("pdf_advanced_analysis.json"),
            ReportMode::Dump => None,
        }
    }

    pub fn font_analysis(&self) -> bool {
        matches!(self, ReportMode::Advanced)
    }

    /// Whether a run that failed outright still prints a summary and writes
    /// its report file.
    pub fn reports_failures(&self) -> bool {
        !matches!(self, ReportMode::Fields)
    }
}

/// Everything one run needs, passed in at call time.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub catalog: FieldCatalog,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub mode: ReportMode,
    pub parallel: bool,
    pub table_settings: TableSettings,
}

impl ProbeConfig {
    pub fn new<P: AsRef<Path>>(input: P, mode: ReportMode) -> Self {
        ProbeConfig {
            catalog: FieldCatalog::jmr(),
            input: expand_path(input.as_ref()),
            output: None,
            mode,
            parallel: false,
            table_settings: TableSettings::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: FieldCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output.map(|p| expand_path(&p));
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_table_settings(mut self, settings: TableSettings) -> Self {
        self.table_settings = settings;
        self
    }

    /// The explicit output path, or the mode's default file name in the
    /// working directory.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output
            .clone()
            .or_else(|| self.mode.default_output().map(PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_per_mode() {
        let fields = ProbeConfig::new("form.pdf", ReportMode::Fields);
        assert_eq!(fields.output_path(), Some(PathBuf::from("pdf_analysis_results.json")));

        let advanced = ProbeConfig::new("form.pdf", ReportMode::Advanced);
        assert_eq!(advanced.output_path(), Some(PathBuf::from("pdf_advanced_analysis.json")));
        assert!(advanced.mode.font_analysis());

        let dump = ProbeConfig::new("form.pdf", ReportMode::Dump);
        assert_eq!(dump.output_path(), None);
    }

    #[test]
    fn explicit_output_wins() {
        let config = ProbeConfig::new("form.pdf", ReportMode::Dump).with_output(Some(PathBuf::from("out.json")));
        assert_eq!(config.output_path(), Some(PathBuf::from("out.json")));
    }
}
