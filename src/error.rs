//! Error taxonomy for the permitting pipeline
//!
//! Route-level failures (load, format, CRS) are fatal to a run. Layer-level
//! failures are caught at the adapter boundary and reported per layer.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PermitError> = std::result::Result<T, E>;

/// Boxed error returned by external collaborators (text summarizer)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum PermitError {
    /// Source missing, unreadable, or without a readable layer
    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("unrecognized CRS identifier '{0}'")]
    InvalidCrs(String),

    #[error("unsupported route format '{extension}' for {path} (expected .kmz or .shp)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Spatial predicate failed again after the revalidation retry
    #[error("spatial join against {layer} failed: {reason}")]
    Join { layer: String, reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("text summarizer failed: {0}")]
    Summarizer(String),

    #[error(transparent)]
    Table(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PermitError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PermitError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Malformed map-markup document
///
/// Non-fatal for the archive loader: it yields an empty collection and hands
/// this back to the caller next to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed map markup at byte {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: u64,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: u64) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_names_path() {
        let err = PermitError::load("/data/route.kmz", "archive has no doc.kml");
        let msg = err.to_string();
        assert!(msg.contains("/data/route.kmz"));
        assert!(msg.contains("doc.kml"));
    }

    #[test]
    fn test_parse_error_converts() {
        let err: PermitError = ParseError::new("unexpected end of document", 42).into();
        assert!(matches!(err, PermitError::Parse(ref p) if p.position == 42));
        assert!(err.to_string().contains("byte 42"));
    }
}
