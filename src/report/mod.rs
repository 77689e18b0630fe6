//! Permit report assembly
//!
//! [`PermitSummary`] is the stable shape handed to collaborators:
//! - [`MarkdownFormatter`] renders the report document
//! - [`JsonFormatter`] renders the summary for other tools
//! - a [`TextSummarizer`] turns a [`SummaryPrompt`] into the report body

pub mod formatters;
pub mod prompt;
pub mod summary;

pub use formatters::{JsonFormatter, MarkdownFormatter};
pub use prompt::{SummaryPrompt, TextSummarizer};
pub use summary::PermitSummary;

use crate::error::{PermitError, Result};
use crate::join::IntersectionResult;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Produce the report body and optionally write the Markdown document
///
/// # Arguments
/// * `summary` - Aggregated layer lists
/// * `summarizer` - Text collaborator; without one the body is empty
/// * `output_path` - Markdown destination; `None` only returns the body
///
/// # Returns
/// The free-text body (empty when no summarizer was given)
///
/// # Errors
/// `Summarizer` when the collaborator fails, `Io` when the file cannot be written
pub fn build_report(
    summary: &PermitSummary,
    summarizer: Option<&dyn TextSummarizer>,
    output_path: Option<&Path>,
) -> Result<String> {
    let body = match summarizer {
        Some(summarizer) => {
            let prompt = SummaryPrompt::new(summary);
            summarizer
                .summarize(summary, &prompt)
                .map_err(|e| PermitError::Summarizer(e.to_string()))?
        }
        None => String::new(),
    };

    if let Some(path) = output_path {
        write_report(path, summary, &body)?;
    }
    Ok(body)
}

/// Write the Markdown report, creating parent directories as needed
pub fn write_report(path: &Path, summary: &PermitSummary, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, MarkdownFormatter::format(summary, body))?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}

/// Write each result table to `<dir>/<layer>.csv`
///
/// # Returns
/// Paths written, in input order
pub fn export_tables(results: &[&IntersectionResult], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(results.len());
    for result in results {
        let path = dir.join(format!("{}.csv", result.layer().to_ascii_lowercase()));
        let mut table = result.table().clone();
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut table)?;
        tracing::debug!("Wrote {} rows to {}", table.height(), path.display());
        written.push(path);
    }
    Ok(written)
}
