//! Error types for blog-migrate
//!
//! This module provides error handling for the migration pipeline, including:
//! - The fatal taxonomy (malformed entries, broken rewrites, failed writes)
//! - Per-image download failures, which are reported but never escalate
//! - Machine-readable error codes for structured logging

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blog-migrate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for blog-migrate
///
/// Every variant except [`Error::Download`] is fatal to a migration run: the
/// orchestrator stops at the first one instead of skipping the entry.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export_root")
        key: Option<String>,
    },

    /// A post entry is missing a required field or the field is unusable
    #[error("malformed entry #{index}: {field} {reason}")]
    MalformedEntry {
        /// Position of the entry among the selected post entries
        index: usize,
        /// The field that failed the structural lookup (e.g., "title")
        field: &'static str,
        /// What was wrong with the field
        reason: String,
    },

    /// Image rewriting left references to the legacy domain behind
    #[error("image rewrite left {} legacy reference(s): {}", remaining.len(), remaining.join(", "))]
    TransformInvariantViolation {
        /// The `src` values that still point at the legacy domain
        remaining: Vec<String>,
    },

    /// An output directory or file could not be written
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The path that could not be created or written
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A single image download failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// XML parse or serialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Download-related errors
///
/// These describe why one image fetch ended without a file on disk. The fetcher
/// logs and reports them; they never abort sibling downloads or the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    /// The image URL could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser error message
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("GET {url} returned HTTP {status}")]
    Status {
        /// The requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request hit the connect or read timeout
    #[error("GET {url} timed out")]
    Timeout {
        /// The requested URL
        url: String,
    },

    /// Any other transport failure (DNS, connection reset, body read)
    #[error("GET {url} failed: {reason}")]
    Request {
        /// The requested URL
        url: String,
        /// Transport error message
        reason: String,
    },

    /// The body was fetched but could not be saved
    #[error("failed to save {url} to {}: {reason}", path.display())]
    Write {
        /// The requested URL
        url: String,
        /// Destination file
        path: PathBuf,
        /// I/O error message
        reason: String,
    },

    /// The fetch was abandoned before it finished
    #[error("GET {url} cancelled")]
    Cancelled {
        /// The requested URL
        url: String,
    },
}

impl Error {
    /// Build a [`Error::Config`] for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error must stop a migration run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Download(_))
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MalformedEntry { .. } => "malformed_entry",
            Error::TransformInvariantViolation { .. } => "transform_invariant_violation",
            Error::Write { .. } => "write_failure",
            Error::Download(e) => match e {
                DownloadError::InvalidUrl { .. } => "invalid_url",
                DownloadError::Status { .. } => "http_status",
                DownloadError::Timeout { .. } => "timeout",
                DownloadError::Request { .. } => "request_failed",
                DownloadError::Write { .. } => "save_failed",
                DownloadError::Cancelled { .. } => "cancelled",
            },
            Error::Xml(_) => "xml_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl DownloadError {
    /// The URL whose fetch failed
    pub fn url(&self) -> &str {
        match self {
            DownloadError::InvalidUrl { url, .. }
            | DownloadError::Status { url, .. }
            | DownloadError::Timeout { url }
            | DownloadError::Request { url, .. }
            | DownloadError::Write { url, .. }
            | DownloadError::Cancelled { url } => url,
        }
    }

    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            DownloadError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
