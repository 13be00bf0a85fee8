//! Build log scanning.
//!
//! Pulls compiler diagnostics of the form `path: error: message` or
//! `path: warning: message` out of a build log. Independent of the signing
//! workflow.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use thiserror::Error;

static DIAGNOSTIC_PATTERN: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"(?i)^(.*?)(error|warning):\s*(.*)$")
        .expect("diagnostic pattern is valid")
});

/// A diagnostic line found in a build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFinding {
    /// Text before the level, usually a file path and position. May be empty.
    pub location: String,
    /// `error` or `warning`, in the case it appeared in the log.
    pub level: String,
    pub message: String,
}

impl std::fmt::Display for LogFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.level, self.message)
    }
}

/// Errors reading a build log. Reported to the user, never fatal.
#[derive(Error, Debug)]
pub enum LogScanError {
    #[error("Log file not found at {0}")]
    NotFound(PathBuf),

    #[error("An error occurred while reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Scans log text, at most one finding per line.
pub fn scan_log(content: &str) -> Vec<LogFinding> {
    content
        .lines()
        .filter_map(|line| {
            let caps = DIAGNOSTIC_PATTERN.captures(line)?;
            Some(LogFinding {
                location: caps[1].trim().to_string(),
                level: caps[2].trim().to_string(),
                message: caps[3].trim().to_string(),
            })
        })
        .collect()
}

/// Reads and scans a log file. Invalid UTF-8 is replaced, not rejected.
pub async fn scan_log_file(path: &Path) -> Result<Vec<LogFinding>, LogScanError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LogScanError::NotFound(path.to_path_buf())
        } else {
            LogScanError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let findings = scan_log(&String::from_utf8_lossy(&bytes));
    tracing::debug!("Found {} diagnostic(s) in {}", findings.len(), path.display());
    Ok(findings)
}
