use thiserror::Error;

/// Errors that can occur while processing fiscal archives.
///
/// Only operation-level failures surface here. A single document that fails
/// to parse, or a single nested archive that fails to extract, is absorbed
/// locally (logged, subtree skipped) and never becomes a `FiscalError`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FiscalError {
    /// Caller misconfiguration detected before any processing started.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The top-level container could not be opened or extracted.
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem failure outside any recoverable branch.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML generation error (splitting batches back into documents).
    #[error("XML error: {0}")]
    Xml(String),
}
