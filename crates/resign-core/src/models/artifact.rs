//! Artifact models produced along a run.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// An artifact downloaded into the staging workspace.
///
/// Only valid while the workspace that holds it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    /// Full path of the staged file.
    pub path: PathBuf,
    /// Asset name as published by the release host.
    pub name: String,
    /// Number of bytes written.
    pub size_bytes: u64,
    /// Hex SHA-256 of the downloaded bytes.
    pub sha256: String,
    /// Tag of the release the asset belongs to.
    pub release_tag: Option<String>,
}

impl StagedArtifact {
    /// File name component of the staged path.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }
}

/// A re-signed artifact in the durable output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedArtifact {
    pub path: PathBuf,
}

impl SignedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Install link printed by the signing tool.
///
/// Opaque; the only guarantee is that it is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstallLink(String);

impl InstallLink {
    /// Wraps a link, rejecting empty or whitespace-only text.
    pub fn new(link: impl Into<String>) -> Option<Self> {
        let link = link.into();
        if link.trim().is_empty() {
            None
        } else {
            Some(Self(link))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstallLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
