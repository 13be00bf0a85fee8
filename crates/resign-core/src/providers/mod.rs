//! Release host integrations.
//!
//! A [`ReleaseSource`] resolves the latest release of a repository and stages
//! its artifact on disk.

pub mod github;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{ResignError, Result};
use crate::models::{Release, ReleaseAsset, ReleaseDescriptor, StagedArtifact};

pub use github::{GitHubReleaseConfig, GitHubReleaseFetcher};

/// Trait for fetching build artifacts from a release host.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Queries the host for the latest release of `descriptor`.
    async fn latest_release(&self, descriptor: &ReleaseDescriptor) -> Result<Release>;

    /// Streams `asset` into `destination_dir`.
    async fn download(&self, asset: &ReleaseAsset, destination_dir: &Path)
    -> Result<StagedArtifact>;

    /// Resolves the latest release and stages its first asset.
    async fn fetch(
        &self,
        descriptor: &ReleaseDescriptor,
        destination_dir: &Path,
    ) -> Result<StagedArtifact> {
        let release = self.latest_release(descriptor).await?;
        let asset = select_asset(&release, descriptor)?;

        tracing::info!(
            "Selected asset {} from release {} ({})",
            asset.name,
            release.tag_name.as_deref().unwrap_or("<untagged>"),
            release.name.as_deref().unwrap_or("unnamed")
        );

        let mut artifact = self.download(asset, destination_dir).await?;
        artifact.release_tag = release.tag_name.clone();
        Ok(artifact)
    }
}

/// Picks the asset to sign: always the first one the host listed.
///
/// No filtering by extension or content type happens here. A release that
/// publishes several build variants gets its first variant signed.
pub fn select_asset<'a>(
    release: &'a Release,
    descriptor: &ReleaseDescriptor,
) -> Result<&'a ReleaseAsset> {
    release
        .assets
        .first()
        .ok_or_else(|| ResignError::NoAssets(descriptor.to_string()))
}

/// Reduces an asset name to a file name that stays inside the staging directory.
pub fn staged_file_name(asset_name: &str) -> Result<PathBuf> {
    Path::new(asset_name)
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| {
            ResignError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Asset name '{}' is not a valid file name", asset_name),
            ))
        })
}
