//! Run lifecycle models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use super::{InstallLink, SignedArtifact};
use crate::error::{ErrorKind, ResignError};

/// Unique identifier for a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stage a run has reached.
///
/// Runs move strictly forward; any failure ends the run in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Start,
    WorkspaceCreated,
    ArtifactFetched,
    ArtifactSigned,
    Reported,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Start => "start",
            RunStage::WorkspaceCreated => "workspace_created",
            RunStage::ArtifactFetched => "artifact_fetched",
            RunStage::ArtifactSigned => "artifact_signed",
            RunStage::Reported => "reported",
            RunStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct SignedRelease {
    /// Tag of the release the artifact came from, if the host reported one.
    pub release_tag: Option<String>,
    /// Name of the asset that was signed.
    pub asset_name: String,
    /// SHA-256 of the artifact as downloaded.
    pub source_sha256: String,
    pub signed_artifact: SignedArtifact,
    pub install_link: InstallLink,
}

/// Failure of a run, with the last stage reached before it happened.
#[derive(Debug)]
pub struct RunFailure {
    /// Last stage completed before the failure.
    pub stage: RunStage,
    pub error: ResignError,
}

impl RunFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Terminal outcome of one workflow run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub result: std::result::Result<SignedRelease, RunFailure>,
    /// Secondary cleanup failure, never the primary outcome.
    pub cleanup_error: Option<ResignError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Terminal stage of the run.
    pub fn stage(&self) -> RunStage {
        match self.result {
            Ok(_) => RunStage::Reported,
            Err(_) => RunStage::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Kind of the primary failure, if the run failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(RunFailure::kind)
    }

    /// Install link of a successful run.
    pub fn install_link(&self) -> Option<&InstallLink> {
        self.result.as_ref().ok().map(|r| &r.install_link)
    }

    /// Renders the report as human readable lines.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.result {
            Ok(release) => {
                if let Some(tag) = &release.release_tag {
                    lines.push(format!("Release:           {}", tag));
                }
                lines.push(format!("Asset:             {}", release.asset_name));
                lines.push(format!("SHA-256:           {}", release.source_sha256));
                lines.push(format!(
                    "Signed artifact:   {}",
                    release.signed_artifact.path.display()
                ));
                lines.push(format!("Installation Link: {}", release.install_link));
            }
            Err(failure) => {
                lines.push(format!(
                    "Run failed ({}) after stage '{}': {}",
                    failure.kind(),
                    failure.stage,
                    failure.error
                ));
                lines.push(failure.kind().describe().to_string());
            }
        }
        if let Some(cleanup) = &self.cleanup_error {
            lines.push(format!("Warning: {}", cleanup));
        }
        lines
    }
}
