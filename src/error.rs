use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a directory extraction.
///
/// Soft failures (no dilution factor or replicate group in a filename) are
/// not represented here: they degrade to defaults inside the classifier.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Malformed export {path}: {reason}")]
    MalformedExport { path: PathBuf, reason: String },

    #[error("Error: different bin sizes in {directory} ('{offending}' differs from '{reference}')")]
    InconsistentBinAxis {
        directory: PathBuf,
        reference: String,
        offending: String,
    },

    #[error("No export file ending with '{suffix}' in {directory}")]
    NoExportFiles { directory: PathBuf, suffix: String },

    #[error("Files {first} and {second} both map to the name '{key}'")]
    DuplicateFilename {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ExtractError::MalformedExport {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
