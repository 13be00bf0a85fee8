//! External signing tool invocation.
//!
//! The tool is called as
//! `<program> -i <input> -o <output> -c <certificate> -p <passphrase> -m <profile>`.
//! Exit code 0 means success and the trimmed standard output is the install
//! link. Any other exit code is a failure described on standard error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::process::Command;

use super::{signed_output_path, ArtifactSigner, SigningOutput};
use crate::error::{ResignError, Result};
use crate::models::{
    CredentialBundle, InstallLink, PassphraseDelivery, SignedArtifact, StagedArtifact,
};

pub const DEFAULT_SIGNING_TOOL: &str = "DaiSign-API";

/// Settings for the external signing tool.
#[derive(Debug, Clone)]
pub struct SigningToolConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments placed before the signing flags (e.g. a script for an
    /// interpreter).
    pub leading_args: Vec<String>,
    /// Maximum time the tool may run.
    pub timeout: Duration,
    pub passphrase_delivery: PassphraseDelivery,
}

impl Default for SigningToolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_SIGNING_TOOL),
            leading_args: Vec::new(),
            timeout: Duration::from_secs(600),
            passphrase_delivery: PassphraseDelivery::Argument,
        }
    }
}

/// Signs artifacts by running an external command.
pub struct ExternalSigner {
    config: SigningToolConfig,
}

impl ExternalSigner {
    pub fn new(config: SigningToolConfig) -> Self {
        Self { config }
    }

    fn build_command(
        &self,
        artifact: &StagedArtifact,
        output_path: &Path,
        credentials: &CredentialBundle,
    ) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.leading_args)
            .arg("-i")
            .arg(&artifact.path)
            .arg("-o")
            .arg(output_path)
            .arg("-c")
            .arg(&credentials.certificate_path);

        match &self.config.passphrase_delivery {
            PassphraseDelivery::Argument => {
                command.arg("-p").arg(credentials.passphrase.expose_secret());
            }
            PassphraseDelivery::Environment(var) => {
                command.env(var, credentials.passphrase.expose_secret());
            }
        }

        command
            .arg("-m")
            .arg(&credentials.provisioning_profile_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        command
    }
}

impl Default for ExternalSigner {
    fn default() -> Self {
        Self::new(SigningToolConfig::default())
    }
}

#[async_trait]
impl ArtifactSigner for ExternalSigner {
    async fn sign(
        &self,
        artifact: &StagedArtifact,
        credentials: &CredentialBundle,
        output_dir: &Path,
    ) -> Result<SigningOutput> {
        tokio::fs::create_dir_all(output_dir).await?;

        let output_path = signed_output_path(artifact, output_dir);
        let program = self.config.program.display().to_string();

        tracing::debug!(
            "Running {} on {} -> {}",
            program,
            artifact.path.display(),
            output_path.display()
        );

        let child = self
            .build_command(artifact, &output_path, credentials)
            .spawn()
            .map_err(|e| ResignError::ToolUnavailable(format!("{}: {}", program, e)))?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(output) => output?,
            Err(_) => {
                return Err(ResignError::SigningFailed(format!(
                    "{} timed out after {} seconds",
                    program,
                    self.config.timeout.as_secs()
                )));
            }
        };

        let passphrase = credentials.passphrase.expose_secret();

        if !output.status.success() {
            let stderr = redact(&String::from_utf8_lossy(&output.stderr), passphrase);
            let stderr = stderr.trim();
            return Err(ResignError::SigningFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                if stderr.is_empty() { "no diagnostic output" } else { stderr }
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let install_link = parse_install_link(&stdout)?;

        tracing::info!("Signed artifact written to {}", output_path.display());

        Ok(SigningOutput {
            signed_artifact: SignedArtifact { path: output_path },
            install_link,
        })
    }
}

/// Interprets the tool's standard output as the install link.
///
/// The whole output is taken, trimmed of surrounding whitespace. Nothing is
/// parsed out of it.
pub fn parse_install_link(stdout: &str) -> Result<InstallLink> {
    InstallLink::new(stdout.trim()).ok_or_else(|| {
        ResignError::SigningFailed("signing tool printed no install link".to_string())
    })
}

/// Secrets at least this long are masked wherever they appear. Shorter ones
/// are masked only as whole words.
const MIN_EMBEDDED_SECRET_LEN: usize = 4;

/// Masks occurrences of `secret` in `text`.
fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    if secret.chars().count() >= MIN_EMBEDDED_SECRET_LEN {
        return text.replace(secret, "***");
    }

    let mut redacted = String::with_capacity(text.len());
    let mut start = 0;
    while let Some(offset) = text[start..].find(secret) {
        let begin = start + offset;
        let end = begin + secret.len();
        let standalone = !text[..begin].chars().next_back().is_some_and(char::is_alphanumeric)
            && !text[end..].chars().next().is_some_and(char::is_alphanumeric);

        redacted.push_str(&text[start..begin]);
        redacted.push_str(if standalone { "***" } else { secret });
        start = end;
    }
    redacted.push_str(&text[start..]);
    redacted
}
