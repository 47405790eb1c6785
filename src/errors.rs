//! Error types for the filing pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to EDGAR
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout { .. } => true,
            ClientError::Request(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Failures from the external HTML-to-PDF renderer
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PDF renderer '{0}' is not installed or not on PATH")]
    Unavailable(String),

    #[error("Failed to launch PDF renderer: {0}")]
    Launch(#[source] std::io::Error),

    #[error("PDF renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("PDF conversion failed - no output file or file is empty: {}", .0.display())]
    EmptyOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while turning a single filing into a PDF
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Could not create working area: {0}")]
    WorkingArea(#[source] std::io::Error),

    #[error("Timeout downloading main HTML {url}")]
    Timeout { url: String },

    #[error("Network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: ClientError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Invalid run parameters
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Fiscal year end month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("Unknown fiscal year basis '{0}'. Supported: same, previous")]
    InvalidBasis(String),

    #[error("CIK must be a non-empty number, got '{0}'")]
    InvalidCik(String),
}
