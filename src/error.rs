//! Error types for the synchronization pipeline.
//!
//! Per-item and per-page failures are [`SyncError`]s: recoverable, logged,
//! and turned into a skip by the run controller. [`RunError`] is reserved for
//! the few conditions that abort a run before any record is processed.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Coarse classification used by the run controller to report failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, timeout, or non-2xx response.
    Transport,
    /// Malformed response body or unusable data.
    Parse,
    /// Local filesystem failure.
    Filesystem,
}

impl ErrorKind {
    /// Returns the stable label used in log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Parse => "parse",
            Self::Filesystem => "filesystem",
        }
    }
}

/// Recoverable errors raised by remote calls and local persistence.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response from {url}: {message}")]
    Parse {
        /// The URL whose response was malformed.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// File system error while writing a binary or metadata file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Creates a transport error from a reqwest error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classifies this error for skip reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUrl { .. } => ErrorKind::Transport,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io { .. } => ErrorKind::Filesystem,
        }
    }
}

/// Errors from reading or writing the checkpoint file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint file could not be written.
    #[error("IO error writing checkpoint {path}: {source}")]
    Io {
        /// Checkpoint path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors that abort a run before any record is processed.
#[derive(Debug, Error)]
pub enum RunError {
    /// The requested window is empty.
    #[error("start date {start} must not be after end date {end}")]
    InvalidRange {
        /// Resolved window start.
        start: NaiveDateTime,
        /// Resolved window end.
        end: NaiveDateTime,
    },

    /// Output directories could not be prepared.
    #[error("cannot prepare output directory {path}: {source}")]
    Setup {
        /// Directory that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An HTTP client could not be built.
    #[error("failed to build HTTP client for {endpoint}: {source}")]
    Client {
        /// Endpoint the client was meant for.
        endpoint: &'static str,
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl RunError {
    /// Returns true for errors caused by invalid user input.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::InvalidRange { .. })
    }
}
