use std::path::PathBuf;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::error::Result;

// Log targets
pub const PDF_PARSING: &str = "pdf_parse";
pub const PDF_OPERATIONS: &str = "pdf_ops";
pub const PDF_TABLES: &str = "pdf_tables";
pub const FIELD_MATCH: &str = "field_match";

const LOG_FILE_NAME: &str = "jmr-probe.log";

fn console_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Debug level for the crate's own targets except `pdf_ops`.
fn file_filter() -> EnvFilter {
    [PDF_PARSING, PDF_TABLES, FIELD_MATCH]
        .iter()
        .fold(EnvFilter::new("warn"), |filter, target| {
            match format!("{target}=debug").parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => filter,
            }
        })
}

/// Install the global subscriber. Console output goes to stderr so the
/// transcript on stdout stays clean. With `log_dir`, debug events are also
/// written to `jmr-probe.log` there; keep the returned guard alive until
/// exit or buffered lines are lost.
///
/// Installing twice is not an error; the first subscriber wins.
pub fn init_logging(verbose: bool, log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_filter(verbose));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::new(Rotation::NEVER, dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(file_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
