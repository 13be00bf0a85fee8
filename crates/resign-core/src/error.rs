//! Error types for the resign core library.

use std::fmt;

use thiserror::Error;

/// Core error type for a resign run.
///
/// Every stage of the workflow returns one of these; the orchestrator maps
/// them onto a single terminal report.
#[derive(Error, Debug)]
pub enum ResignError {
    #[error("Release not found: {0}")]
    NotFound(String),

    #[error("No assets found in the latest release of {0}")]
    NoAssets(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Signing tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Cleanup error: {0}")]
    Cleanup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Discriminant of [`ResignError`], used for exhaustive outcome mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NoAssets,
    Network,
    Io,
    ToolUnavailable,
    SigningFailed,
    Cleanup,
    Configuration,
}

impl ResignError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResignError::NotFound(_) => ErrorKind::NotFound,
            ResignError::NoAssets(_) => ErrorKind::NoAssets,
            ResignError::Network(_) => ErrorKind::Network,
            ResignError::Io(_) => ErrorKind::Io,
            ResignError::ToolUnavailable(_) => ErrorKind::ToolUnavailable,
            ResignError::SigningFailed(_) => ErrorKind::SigningFailed,
            ResignError::Cleanup(_) => ErrorKind::Cleanup,
            ResignError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl ErrorKind {
    /// Short label used in reports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::NoAssets => "no_assets",
            ErrorKind::Network => "network_error",
            ErrorKind::Io => "io_error",
            ErrorKind::ToolUnavailable => "tool_unavailable",
            ErrorKind::SigningFailed => "signing_failed",
            ErrorKind::Cleanup => "cleanup_error",
            ErrorKind::Configuration => "configuration_error",
        }
    }

    /// A hint for the user on what to check next.
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "The release host has no latest release for this repository.",
            ErrorKind::NoAssets => "The latest release has no downloadable assets.",
            ErrorKind::Network => "The release host or the asset download could not be reached.",
            ErrorKind::Io => "A local file could not be read or written.",
            ErrorKind::ToolUnavailable => "The signing tool could not be started. Is it installed and on PATH?",
            ErrorKind::SigningFailed => "The signing tool reported a failure.",
            ErrorKind::Cleanup => "The staging directory could not be removed.",
            ErrorKind::Configuration => "The configuration is incomplete or invalid.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for resign operations.
pub type Result<T> = std::result::Result<T, ResignError>;
