//! GitHub Releases provider.
//!
//! Resolves `GET /repos/{owner}/{repo}/releases/latest` and streams the chosen
//! asset to disk.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use super::{staged_file_name, ReleaseSource};
use crate::error::{ResignError, Result};
use crate::models::{Release, ReleaseAsset, ReleaseDescriptor, StagedArtifact};

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Write buffer for asset downloads.
const DOWNLOAD_BUFFER_SIZE: usize = 8192;

/// Longest error body excerpt carried into an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Connection settings for the release host.
#[derive(Debug)]
pub struct GitHubReleaseConfig {
    /// API root, `https://api.github.com` unless pointed at an Enterprise host.
    pub api_base: Url,
    /// Optional token sent with the metadata query only.
    pub token: Option<SecretString>,
    /// Timeout for establishing connections.
    pub connect_timeout: Duration,
    /// Timeout for the metadata query.
    pub request_timeout: Duration,
    /// Timeout for the whole asset download.
    pub download_timeout: Duration,
}

impl Default for GitHubReleaseConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(GITHUB_API_BASE).expect("static URL is valid"),
            token: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
        }
    }
}

/// Fetches artifacts from GitHub Releases.
pub struct GitHubReleaseFetcher {
    client: reqwest::Client,
    config: GitHubReleaseConfig,
}

impl GitHubReleaseFetcher {
    /// Creates a new fetcher.
    pub fn new(config: GitHubReleaseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(format!("resign/{}", crate::VERSION))
            .build()
            .map_err(|e| {
                ResignError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Builds the latest-release endpoint for `descriptor`.
    pub fn latest_release_url(&self, descriptor: &ReleaseDescriptor) -> Result<Url> {
        latest_release_url(&self.config.api_base, descriptor)
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleaseFetcher {
    async fn latest_release(&self, descriptor: &ReleaseDescriptor) -> Result<Release> {
        let url = self.latest_release_url(descriptor)?;
        tracing::debug!("Querying latest release: {}", url);

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .timeout(self.config.request_timeout);

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResignError::Network(format!("Release query failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResignError::NotFound(format!(
                "{} has no published release",
                descriptor
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResignError::Network(format!(
                "Release host returned {} for {}: {}",
                status,
                descriptor,
                excerpt(&body)
            )));
        }

        let release: Release = response.json().await.map_err(|e| {
            ResignError::Network(format!("Failed to parse release metadata: {}", e))
        })?;

        tracing::debug!(
            "Release {} lists {} asset(s)",
            release.tag_name.as_deref().unwrap_or("<untagged>"),
            release.assets.len()
        );

        Ok(release)
    }

    async fn download(
        &self,
        asset: &ReleaseAsset,
        destination_dir: &Path,
    ) -> Result<StagedArtifact> {
        let path = destination_dir.join(staged_file_name(&asset.name)?);
        let url = Url::parse(&asset.browser_download_url).map_err(|e| {
            ResignError::Network(format!("Invalid download URL for {}: {}", asset.name, e))
        })?;

        tracing::debug!(
            "Downloading {} ({} bytes) from {}",
            asset.name,
            asset.size.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
            url
        );

        let response = self
            .client
            .get(url)
            .timeout(self.config.download_timeout)
            .send()
            .await
            .map_err(|e| ResignError::Network(format!("Download of {} failed: {}", asset.name, e)))?;

        if !response.status().is_success() {
            return Err(ResignError::Network(format!(
                "Download of {} failed with status {}",
                asset.name,
                response.status()
            )));
        }

        let file = tokio::fs::File::create(&path).await?;
        let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFFER_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut size_bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ResignError::Network(format!("Download of {} interrupted: {}", asset.name, e))
            })?;
            hasher.update(&chunk);
            writer.write_all(&chunk).await?;
            size_bytes += chunk.len() as u64;
        }

        writer.flush().await?;

        if let Some(expected) = asset.size.filter(|&expected| expected != size_bytes) {
            return Err(ResignError::Network(format!(
                "Download of {} is incomplete: received {} of {} bytes",
                asset.name, size_bytes, expected
            )));
        }

        let sha256 = hex::encode(hasher.finalize());
        tracing::info!(
            "Downloaded {} ({} bytes, sha256 {})",
            asset.name,
            size_bytes,
            sha256
        );

        Ok(StagedArtifact {
            path,
            name: asset.name.clone(),
            size_bytes,
            sha256,
            release_tag: None,
        })
    }
}

/// Appends `repos/{owner}/{repo}/releases/latest` to the API root.
pub fn latest_release_url(api_base: &Url, descriptor: &ReleaseDescriptor) -> Result<Url> {
    let mut url = api_base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            ResignError::Configuration(format!("API base '{}' cannot hold a path", api_base))
        })?
        .pop_if_empty()
        .extend([
            "repos",
            descriptor.owner.as_str(),
            descriptor.repo.as_str(),
            "releases",
            "latest",
        ]);
    Ok(url)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
