//! Fetch, sign, report, clean up.
//!
//! A [`Workflow`] performs exactly one attempt per [`run`](Workflow::run):
//! it stages the newest release asset in a fresh workspace, re-signs it into
//! the output directory and reports the install link. The workspace is removed
//! on every exit path. Callers retry by running again.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;

use crate::error::{ResignError, Result};
use crate::models::{
    CredentialBundle, ReleaseDescriptor, RunFailure, RunId, RunReport, RunStage, SignedRelease,
};
use crate::providers::{GitHubReleaseConfig, GitHubReleaseFetcher, ReleaseSource};
use crate::signing::{ArtifactSigner, ExternalSigner, SigningToolConfig};
use crate::workspace::{WorkspaceManager, WorkspaceOutcome};

/// Static configuration for a workflow.
#[derive(Debug)]
pub struct WorkflowConfig {
    /// Repository whose latest release is signed.
    pub release: ReleaseDescriptor,
    pub credentials: CredentialBundle,
    /// Durable directory receiving signed artifacts.
    pub output_dir: PathBuf,
    /// Ephemeral staging directory, removed after every run.
    pub staging_dir: PathBuf,
}

impl WorkflowConfig {
    /// Checks that signed artifacts land outside the staging directory.
    ///
    /// An output directory at or under the staging directory would be removed
    /// together with the workspace at the end of every run.
    pub fn validate(&self) -> Result<()> {
        let output = normalized(&self.output_dir)?;
        let staging = normalized(&self.staging_dir)?;
        if output.starts_with(&staging) {
            return Err(ResignError::Configuration(format!(
                "Output directory {} is inside the staging directory {}, which is removed after every run",
                self.output_dir.display(),
                self.staging_dir.display()
            )));
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching the
/// filesystem.
fn normalized(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| {
        ResignError::Configuration(format!("Invalid directory '{}': {}", path.display(), e))
    })?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Orchestrates one fetch → sign → report run.
pub struct Workflow {
    config: WorkflowConfig,
    source: Arc<dyn ReleaseSource>,
    signer: Arc<dyn ArtifactSigner>,
}

impl Workflow {
    pub fn new(
        config: WorkflowConfig,
        source: Arc<dyn ReleaseSource>,
        signer: Arc<dyn ArtifactSigner>,
    ) -> Self {
        Self {
            config,
            source,
            signer,
        }
    }

    /// Builds a workflow backed by GitHub Releases and the external signing tool.
    pub fn external(
        config: WorkflowConfig,
        release_host: GitHubReleaseConfig,
        tool: SigningToolConfig,
    ) -> Result<Self> {
        let source = GitHubReleaseFetcher::new(release_host)?;
        let signer = ExternalSigner::new(tool);
        Ok(Self::new(config, Arc::new(source), Arc::new(signer)))
    }

    /// Executes one run and returns its terminal report.
    ///
    /// Never fails itself: every error ends up in the report.
    pub async fn run(&self) -> RunReport {
        let run_id = RunId::new();
        let span = tracing::info_span!(
            "run",
            run_id = %run_id,
            release = %self.config.release
        );
        self.execute(run_id).instrument(span).await
    }

    async fn execute(&self, run_id: RunId) -> RunReport {
        let started_at = Utc::now();
        let workspace = WorkspaceManager::new(&self.config.staging_dir);

        tracing::info!("Starting run");

        let mut stage = RunStage::Start;
        let reached = &mut stage;
        let outcome = match self.config.validate() {
            Err(error) => WorkspaceOutcome {
                result: Err(error),
                cleanup_error: None,
            },
            Ok(()) => {
                workspace
                    .with_workspace(|dir| async move {
                        *reached = RunStage::WorkspaceCreated;
                        tracing::info!("Workspace ready at {}", dir.display());

                        let artifact = self.source.fetch(&self.config.release, &dir).await?;
                        *reached = RunStage::ArtifactFetched;

                        let signed = self
                            .signer
                            .sign(&artifact, &self.config.credentials, &self.config.output_dir)
                            .await?;
                        *reached = RunStage::ArtifactSigned;

                        Ok::<_, ResignError>(SignedRelease {
                            release_tag: artifact.release_tag,
                            asset_name: artifact.name,
                            source_sha256: artifact.sha256,
                            signed_artifact: signed.signed_artifact,
                            install_link: signed.install_link,
                        })
                    })
                    .await
            }
        };

        let result = match outcome.result {
            Ok(release) => {
                tracing::info!(
                    "Run complete: {} -> {}",
                    release.asset_name,
                    release.signed_artifact.path.display()
                );
                Ok(release)
            }
            Err(error) => {
                let failure = RunFailure { stage, error };
                tracing::error!(
                    "Run failed after stage '{}' ({}): {}",
                    failure.stage,
                    failure.kind(),
                    failure.error
                );
                Err(failure)
            }
        };

        RunReport {
            run_id,
            result,
            cleanup_error: outcome.cleanup_error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
