//! Shared fixtures: a local release host and a scripted signing tool.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use resign_core::models::{CredentialBundle, PassphraseDelivery, ReleaseDescriptor};
use resign_core::providers::GitHubReleaseConfig;
use resign_core::signing::SigningToolConfig;
use resign_core::workflow::WorkflowConfig;
use secrecy::SecretString;
use serde_json::json;
use url::Url;

pub const OWNER: &str = "BDGHubNoKey";
pub const REPO: &str = "Backdoor";
pub const PASSPHRASE: &str = "BDG-secret";

/// What the host answers on the latest-release endpoint.
#[derive(Clone)]
pub enum LatestResponse {
    /// A release listing these assets, in this order, with their real sizes.
    Assets(Vec<String>),
    /// Like `Assets`, but each listed size is one byte larger than the body.
    OversizedAssets(Vec<String>),
    /// A bare status code.
    Status(u16),
    /// 200 with a body that is not JSON.
    Malformed,
}

#[derive(Clone)]
struct HostState {
    latest: LatestResponse,
    bodies: Arc<HashMap<String, Vec<u8>>>,
    downloads: Arc<AtomicUsize>,
    base: String,
}

/// A release host listening on 127.0.0.1.
pub struct FakeReleaseHost {
    pub base: Url,
    downloads: Arc<AtomicUsize>,
}

impl FakeReleaseHost {
    /// Starts a host whose assets serve `bodies`. Listed assets missing from
    /// `bodies` answer 404 on download.
    pub async fn start(latest: LatestResponse, bodies: HashMap<String, Vec<u8>>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let downloads = Arc::new(AtomicUsize::new(0));

        let state = HostState {
            latest,
            bodies: Arc::new(bodies),
            downloads: downloads.clone(),
            base: base.clone(),
        };

        let app = Router::new()
            .route("/repos/{owner}/{repo}/releases/latest", get(latest_release))
            .route("/downloads/{name}", get(download))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&base).unwrap(),
            downloads,
        }
    }

    /// Host listing `names`, each serving `contents of <name>`.
    pub async fn with_assets(names: &[&str]) -> Self {
        let bodies = names
            .iter()
            .map(|n| (n.to_string(), format!("contents of {}", n).into_bytes()))
            .collect();
        Self::start(
            LatestResponse::Assets(names.iter().map(|n| n.to_string()).collect()),
            bodies,
        )
        .await
    }

    /// Number of asset body requests served.
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn release_config(&self) -> GitHubReleaseConfig {
        GitHubReleaseConfig {
            api_base: self.base.clone(),
            request_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(10),
            ..GitHubReleaseConfig::default()
        }
    }
}

async fn latest_release(
    State(state): State<HostState>,
    UrlPath((owner, repo)): UrlPath<(String, String)>,
) -> Response {
    if owner != OWNER || repo != REPO {
        return (StatusCode::NOT_FOUND, r#"{"message":"Not Found"}"#).into_response();
    }

    match &state.latest {
        LatestResponse::Assets(names) => release_body(&state, names, 0),
        LatestResponse::OversizedAssets(names) => release_body(&state, names, 1),
        LatestResponse::Status(code) => (
            StatusCode::from_u16(*code).unwrap(),
            r#"{"message":"Not Found"}"#,
        )
            .into_response(),
        LatestResponse::Malformed => (StatusCode::OK, "<html>not json</html>").into_response(),
    }
}

fn release_body(state: &HostState, names: &[String], size_offset: u64) -> Response {
    let assets: Vec<_> = names
        .iter()
        .map(|name| {
            let size = state.bodies.get(name).map(|b| b.len() as u64 + size_offset);
            json!({
                "name": name,
                "browser_download_url": format!("{}/downloads/{}", state.base, name),
                "size": size,
            })
        })
        .collect();
    Json(json!({ "tag_name": "v1.2", "name": "Release 1.2", "assets": assets })).into_response()
}

async fn download(State(state): State<HostState>, UrlPath(name): UrlPath<String>) -> Response {
    state.downloads.fetch_add(1, Ordering::SeqCst);
    match state.bodies.get(&name) {
        Some(body) => body.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Signing tool run as `/bin/sh <script>`; `$2` is the input and `$4` the output.
pub fn scripted_tool(dir: &Path, script: &str) -> SigningToolConfig {
    let script_path = dir.join("fake-signer.sh");
    std::fs::write(&script_path, script).unwrap();
    SigningToolConfig {
        program: PathBuf::from("/bin/sh"),
        leading_args: vec![script_path.display().to_string()],
        timeout: Duration::from_secs(10),
        passphrase_delivery: PassphraseDelivery::Argument,
    }
}

pub fn workflow_config(root: &Path) -> WorkflowConfig {
    WorkflowConfig {
        release: ReleaseDescriptor::new(OWNER, REPO),
        credentials: CredentialBundle::new(
            root.join("certificates/your_certificate.p12"),
            SecretString::from(PASSPHRASE.to_string()),
            root.join("certificates/your_provision.mobileprovision"),
        ),
        output_dir: root.join("signed_ipas"),
        staging_dir: root.join("temp_files"),
    }
}
