use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use jmr_probe::config::ProbeConfig;
use jmr_probe::heuristic::OutcomeStatus;
use jmr_probe::logging::{init_logging, FIELD_MATCH};
use jmr_probe::parse::PageContent;
use jmr_probe::{render, AnalysisReport, FieldCatalog, ReportMode, RunObserver};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Probe a scanned JMR form PDF for the data-entry fields it contains.",
    arg_required_else_help = true
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Log debug events to stderr
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Also write debug logs to a file in this directory
    #[clap(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report matched field labels, table headers and suggested fields
    Fields(AnalyzeArgs),
    /// Per-page diagnostics, font-group analysis and recommendations
    Advanced(AnalyzeArgs),
    /// Print the text and tables of every page
    Dump(AnalyzeArgs),
    /// Print the built-in field catalog as JSON
    Catalog {
        /// Write the catalog to this file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the PDF file to analyse
    pub pdf_path: PathBuf,

    /// JSON catalog to use instead of the built-in one
    #[clap(short, long)]
    pub catalog: Option<PathBuf>,

    /// Where to write the JSON report
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Extract pages on a thread pool
    #[clap(long)]
    pub parallel: bool,
}

/// Prints progress lines as the run reaches each page.
struct Transcript<W: Write> {
    mode: ReportMode,
    out: W,
}

impl<W: Write> Transcript<W> {
    fn print(&mut self, result: io::Result<()>, what: &str) {
        if let Err(e) = result {
            warn!(target: FIELD_MATCH, "could not print {what}: {e}");
        }
    }
}

impl<W: Write> RunObserver for Transcript<W> {
    fn document_opened(&mut self, page_count: usize) {
        let printed = render::page_count(self.mode, page_count, &mut self.out);
        self.print(printed, "page count");
    }

    fn page_extracted(&mut self, page: &PageContent) {
        let printed = render::page(self.mode, page, &mut self.out);
        self.print(printed, &format!("page {}", page.page_number));
    }
}

fn analyze(args: AnalyzeArgs, mode: ReportMode) -> anyhow::Result<()> {
    let catalog = match &args.catalog {
        Some(path) => FieldCatalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => FieldCatalog::jmr(),
    };
    let config = ProbeConfig::new(&args.pdf_path, mode)
        .with_catalog(catalog)
        .with_output(args.output)
        .with_parallel(args.parallel);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    render::banner(mode, &mut out)?;

    let outcome = jmr_probe::run_observed(&config, Transcript { mode, out: &mut out });

    if let Some(error) = outcome.error() {
        render::failure(mode, error, &mut out)?;
    }
    if outcome.status() == OutcomeStatus::Failed && !mode.reports_failures() {
        render::analysis_failed(&mut out)?;
        return Ok(());
    }

    let report = AnalysisReport::new(&outcome, &config.catalog);
    render::summary(mode, &report, &mut out)?;

    if let Some(path) = config.output_path() {
        report
            .write_json(&path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        render::saved(&path, &mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn print_catalog(output: Option<PathBuf>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&FieldCatalog::jmr())?;
    match output {
        Some(path) => fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the guard alive so the file log is flushed on exit.
    let _guard = init_logging(args.verbose, args.log_dir.clone())?;

    match args.command {
        Command::Fields(a) => analyze(a, ReportMode::Fields),
        Command::Advanced(a) => analyze(a, ReportMode::Advanced),
        Command::Dump(a) => analyze(a, ReportMode::Dump),
        Command::Catalog { output } => print_catalog(output),
    }
}
