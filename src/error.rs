//! Error types for the cortisol tracker core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning exports or computing projections
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Folder not found: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Upstream fetch failed for {date}: {message}")]
    Upstream { date: String, message: String },
}

impl ComputeError {
    /// True when the request was rejected because of caller input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ComputeError::InvalidQuery(_) | ComputeError::DateParseError(_)
        )
    }
}
