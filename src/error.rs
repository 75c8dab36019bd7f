use std::path::PathBuf;

/// Everything that can stop or cut short an analysis run.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The input path does not exist.
    #[error("PDF not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// lopdf could not load or decode the document.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// A single page could not be interpreted.
    #[error("failed to extract page {page}: {message}")]
    PageContent { page: u32, message: String },

    /// A field pattern in the catalog is not a valid regex.
    #[error("invalid pattern for field '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// A catalog override file is not valid catalog JSON.
    #[error("invalid catalog file: {0}")]
    CatalogFormat(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
