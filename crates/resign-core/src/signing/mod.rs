//! Artifact re-signing.
//!
//! The [`ArtifactSigner`] trait is the only surface the workflow sees; the
//! external command line tool lives behind it in [`external`].

pub mod external;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CredentialBundle, InstallLink, SignedArtifact, StagedArtifact};

pub use external::{ExternalSigner, SigningToolConfig};

/// Prefix given to re-signed artifacts in the output directory.
pub const SIGNED_PREFIX: &str = "signed_";

/// What a successful signing produces.
#[derive(Debug, Clone)]
pub struct SigningOutput {
    pub signed_artifact: SignedArtifact,
    pub install_link: InstallLink,
}

/// Trait for re-signing a staged artifact.
#[async_trait]
pub trait ArtifactSigner: Send + Sync {
    /// Re-signs `artifact` into `output_dir` and returns the install link.
    ///
    /// `output_dir` is created if missing.
    async fn sign(
        &self,
        artifact: &StagedArtifact,
        credentials: &CredentialBundle,
        output_dir: &Path,
    ) -> Result<SigningOutput>;
}

/// Output path for a signed artifact: `<output_dir>/signed_<file name>`.
pub fn signed_output_path(artifact: &StagedArtifact, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}{}", SIGNED_PREFIX, artifact.file_name()))
}
