//! Error types for the testgate pipeline.
//!
//! Two disjoint error kinds exist:
//!
//! - **Processing errors** (`Io`, `Xml`, `MissingReport`, `ReportWrite`): an
//!   input was missing, unreadable, or malformed. These abort the run before
//!   the audit produces a verdict and never appear in the report.
//! - **`BuildFailed`**: raised exactly once by the aggregator after all
//!   verdicts are in, when at least one audit reported `FAIL`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the audit pipeline.
pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Error, Debug)]
pub enum GateError {
    /// An input file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A tool report existed but was not acceptable XML (malformed markup,
    /// a DOCTYPE declaration, or an undefined entity).
    #[error("malformed XML in {}: {message}", path.display())]
    Xml { path: PathBuf, message: String },

    /// A report or build file the audit depends on does not exist.
    #[error("missing input at {}: {detail}", path.display())]
    MissingReport { path: PathBuf, detail: String },

    /// The aggregator could not persist the final JSON report.
    #[error("failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// At least one audit failed. The message lists every failing
    /// `module:name` pair plus the local and online report locations.
    #[error("{0}")]
    BuildFailed(String),
}

impl GateError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        GateError::Xml {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing_report(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        GateError::MissingReport {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for the error kinds that halt the run before a verdict exists.
    pub fn is_processing_error(&self) -> bool {
        !matches!(self, GateError::BuildFailed(_))
    }
}
