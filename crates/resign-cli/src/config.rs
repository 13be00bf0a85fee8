//! CLI configuration loading and resolution.
//!
//! Settings come from `~/.resign/config.huml` with priority order:
//! CLI flags > environment variables > config file > defaults.

use anyhow::{bail, Context, Result};
use resign_core::ResignError;
use resign_core::models::{CredentialBundle, PassphraseDelivery, ReleaseDescriptor};
use resign_core::providers::GitHubReleaseConfig;
use resign_core::providers::github::GITHUB_API_BASE;
use resign_core::signing::SigningToolConfig;
use resign_core::signing::external::DEFAULT_SIGNING_TOOL;
use resign_core::workflow::WorkflowConfig;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::commands::run::RunArgs;

pub const ENV_CONFIG: &str = "RESIGN_CONFIG";
pub const ENV_OWNER: &str = "RESIGN_OWNER";
pub const ENV_REPO: &str = "RESIGN_REPO";
pub const ENV_API_BASE: &str = "RESIGN_API_BASE";
pub const ENV_GITHUB_TOKEN: &str = "RESIGN_GITHUB_TOKEN";
pub const ENV_CERTIFICATE: &str = "RESIGN_CERTIFICATE";
pub const ENV_PROVISIONING_PROFILE: &str = "RESIGN_PROVISIONING_PROFILE";
pub const ENV_CERT_PASSWORD: &str = "RESIGN_CERT_PASSWORD";
pub const ENV_OUTPUT_DIR: &str = "RESIGN_OUTPUT_DIR";
pub const ENV_STAGING_DIR: &str = "RESIGN_STAGING_DIR";
pub const ENV_SIGNING_TOOL: &str = "RESIGN_SIGNING_TOOL";

pub const DEFAULT_OUTPUT_DIR: &str = "signed_ipas";
pub const DEFAULT_STAGING_DIR: &str = "temp_files";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Configuration loaded from config.huml. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub release: ReleaseSection,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub tool: ToolSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseSection {
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// REST API root, for GitHub Enterprise hosts.
    pub api_base: Option<String>,
    pub token: Option<String>,
    /// Timeout for the release metadata query.
    pub timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
}

#[derive(Clone, Default, Deserialize)]
pub struct CredentialsSection {
    pub certificate: Option<PathBuf>,
    pub provisioning_profile: Option<PathBuf>,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for CredentialsSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsSection")
            .field("certificate", &self.certificate)
            .field("provisioning_profile", &self.provisioning_profile)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    pub output_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolSection {
    pub program: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    /// When set, the passphrase is handed to the tool in this environment
    /// variable instead of on its command line.
    pub passphrase_env: Option<String>,
}

/// Everything a run needs, after applying priority rules.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub workflow: WorkflowConfig,
    pub release_host: GitHubReleaseConfig,
    pub tool: SigningToolConfig,
}

/// Returns the config directory path (~/.resign).
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join(".resign"))
        .context("Could not determine home directory")
}

/// Returns the default config file path (~/.resign/config.huml).
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.huml"))
}

/// Picks the config file: `--config`, then `RESIGN_CONFIG`, then the default.
pub fn config_path(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    match env_value(ENV_CONFIG) {
        Some(p) => Ok(PathBuf::from(p)),
        None => default_config_path(),
    }
}

/// Load configuration from `path`.
///
/// Returns `Ok(None)` if the file doesn't exist and an error if it exists
/// but is invalid.
pub fn load_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config in {}", path.display()))?;

    check_file_permissions(path);

    Ok(Some(config))
}

pub(crate) fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = huml_rs::serde::from_str(content).context("Invalid HUML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values that are present but unusable.
fn validate_config(config: &FileConfig) -> Result<()> {
    for (key, value) in [
        ("release.owner", &config.release.owner),
        ("release.repo", &config.release.repo),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            bail!("{} must not be empty", key);
        }
    }

    if let Some(base) = &config.release.api_base {
        Url::parse(base).with_context(|| format!("release.api_base '{}' is not a URL", base))?;
    }

    for (key, value) in [
        ("release.timeout_secs", config.release.timeout_secs),
        ("release.download_timeout_secs", config.release.download_timeout_secs),
        ("tool.timeout_secs", config.tool.timeout_secs),
    ] {
        if value == Some(0) {
            bail!("{} must be greater than zero", key);
        }
    }

    if matches!(&config.tool.passphrase_env, Some(name) if name.trim().is_empty()) {
        bail!("tool.passphrase_env must not be empty");
    }

    Ok(())
}

/// Warn if the config file is readable by group or others (on Unix).
///
/// The file may hold the certificate passphrase and an API token.
#[cfg(unix)]
fn check_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                "{} has overly permissive permissions ({:o}). Consider running: chmod 600 {}",
                path.display(),
                mode & 0o777,
                path.display()
            );
        }
    }
}

#[cfg(not(unix))]
fn check_file_permissions(_path: &Path) {}

/// Non-empty value of an environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Flag, then environment, then file.
fn pick<T>(flag: Option<T>, env: &str, file: Option<T>) -> Option<T>
where
    T: From<String>,
{
    flag.or_else(|| env_value(env).map(T::from)).or(file)
}

fn required<T>(value: Option<T>, field: &str, key: &str, env: &str, flag: Option<&str>) -> Result<T> {
    value.ok_or_else(|| {
        let mut sources = format!("{} in the config file or {}", key, env);
        if let Some(flag) = flag {
            sources.push_str(&format!(" or {}", flag));
        }
        ResignError::Configuration(format!("Missing {}: set {}", field, sources)).into()
    })
}

/// Resolve run configuration by applying priority rules.
///
/// Priority order (highest to lowest):
/// 1. CLI flags
/// 2. Environment variables (`RESIGN_*`)
/// 3. Config file
/// 4. Defaults
///
/// The passphrase and the API token are never taken from flags.
pub fn resolve_config(args: &RunArgs, file_config: Option<FileConfig>) -> Result<ResolvedConfig> {
    let file = file_config.unwrap_or_default();

    let owner = required(
        pick(args.owner.clone(), ENV_OWNER, file.release.owner),
        "release owner",
        "release.owner",
        ENV_OWNER,
        Some("--owner"),
    )?;
    let repo = required(
        pick(args.repo.clone(), ENV_REPO, file.release.repo),
        "release repository",
        "release.repo",
        ENV_REPO,
        Some("--repo"),
    )?;
    let certificate = required(
        pick(args.certificate.clone(), ENV_CERTIFICATE, file.credentials.certificate),
        "signing certificate",
        "credentials.certificate",
        ENV_CERTIFICATE,
        Some("--certificate"),
    )?;
    let provisioning_profile = required(
        pick(
            args.profile.clone(),
            ENV_PROVISIONING_PROFILE,
            file.credentials.provisioning_profile,
        ),
        "provisioning profile",
        "credentials.provisioning_profile",
        ENV_PROVISIONING_PROFILE,
        Some("--profile"),
    )?;
    let passphrase = required(
        pick(None, ENV_CERT_PASSWORD, file.credentials.passphrase),
        "certificate passphrase",
        "credentials.passphrase",
        ENV_CERT_PASSWORD,
        None,
    )?;

    let api_base = pick(args.api_base.clone(), ENV_API_BASE, file.release.api_base)
        .unwrap_or_else(|| GITHUB_API_BASE.to_string());
    let api_base = Url::parse(&api_base)
        .with_context(|| format!("Invalid release API base '{}'", api_base))?;
    let token = pick(None, ENV_GITHUB_TOKEN, file.release.token).map(SecretString::from);

    let output_dir = pick(args.output_dir.clone(), ENV_OUTPUT_DIR, file.paths.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let staging_dir = pick(args.staging_dir.clone(), ENV_STAGING_DIR, file.paths.staging_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR));
    let program = pick(args.tool.clone(), ENV_SIGNING_TOOL, file.tool.program)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGNING_TOOL));

    let passphrase_delivery = match file.tool.passphrase_env {
        Some(name) => PassphraseDelivery::Environment(name),
        None => PassphraseDelivery::Argument,
    };

    let release_host = GitHubReleaseConfig {
        api_base,
        token,
        request_timeout: Duration::from_secs(
            file.release.timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
        download_timeout: Duration::from_secs(
            file.release
                .download_timeout_secs
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        ),
        ..GitHubReleaseConfig::default()
    };

    let tool = SigningToolConfig {
        program,
        leading_args: Vec::new(),
        timeout: Duration::from_secs(file.tool.timeout_secs.unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS)),
        passphrase_delivery,
    };

    let workflow = WorkflowConfig {
        release: ReleaseDescriptor::new(owner, repo),
        credentials: CredentialBundle::new(
            certificate,
            SecretString::from(passphrase),
            provisioning_profile,
        ),
        output_dir,
        staging_dir,
    };
    workflow.validate()?;

    Ok(ResolvedConfig {
        workflow,
        release_host,
        tool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const ALL_ENV: [&str; 11] = [
        ENV_CONFIG,
        ENV_OWNER,
        ENV_REPO,
        ENV_API_BASE,
        ENV_GITHUB_TOKEN,
        ENV_CERTIFICATE,
        ENV_PROVISIONING_PROFILE,
        ENV_CERT_PASSWORD,
        ENV_OUTPUT_DIR,
        ENV_STAGING_DIR,
        ENV_SIGNING_TOOL,
    ];

    /// Runs `f` with every RESIGN_* variable cleared except `vars`.
    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut all: Vec<(&str, Option<&str>)> = ALL_ENV.iter().map(|k| (*k, None)).collect();
        for &(key, value) in vars {
            all.retain(|(k, _)| *k != key);
            all.push((key, Some(value)));
        }
        temp_env::with_vars(all, f)
    }

    fn full_file() -> FileConfig {
        FileConfig {
            release: ReleaseSection {
                owner: Some("BDGHubNoKey".to_string()),
                repo: Some("Backdoor".to_string()),
                ..Default::default()
            },
            credentials: CredentialsSection {
                certificate: Some(PathBuf::from("certificates/your_certificate.p12")),
                provisioning_profile: Some(PathBuf::from(
                    "certificates/your_provision.mobileprovision",
                )),
                passphrase: Some("file-pass".to_string()),
            },
            ..Default::default()
        }
    }

    const SAMPLE_HUML: &str = r#"%HUML v0.2.0
release::
  owner: "BDGHubNoKey"
  repo: "Backdoor"
  timeout_secs: 45

credentials::
  certificate: "certificates/your_certificate.p12"
  provisioning_profile: "certificates/your_provision.mobileprovision"
  passphrase: "file-pass"

paths::
  output_dir: "out"

tool::
  program: "/opt/tools/DaiSign-API"
  passphrase_env: "DAISIGN_PASSWORD"
"#;

    #[test]
    fn test_parse_config_file() {
        let config = parse_config(SAMPLE_HUML).unwrap();
        assert_eq!(config.release.owner.as_deref(), Some("BDGHubNoKey"));
        assert_eq!(config.release.repo.as_deref(), Some("Backdoor"));
        assert_eq!(config.release.timeout_secs, Some(45));
        assert_eq!(config.paths.output_dir, Some(PathBuf::from("out")));
        assert!(config.paths.staging_dir.is_none());
        assert_eq!(
            config.tool.program,
            Some(PathBuf::from("/opt/tools/DaiSign-API"))
        );
        assert_eq!(config.tool.passphrase_env.as_deref(), Some("DAISIGN_PASSWORD"));
    }

    #[test]
    fn test_parse_config_rejects_zero_timeout() {
        let content = "%HUML v0.2.0\ntool::\n  timeout_secs: 0\n";
        assert!(parse_config(content).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_api_base() {
        let mut config = full_file();
        config.release.api_base = Some("not a url".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_owner() {
        let mut config = full_file();
        config.release.owner = Some("  ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("config.huml")).unwrap().is_none());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.huml");
        std::fs::write(&path, SAMPLE_HUML).unwrap();
        let config = load_config(&path).unwrap().unwrap();
        assert_eq!(config.credentials.passphrase.as_deref(), Some("file-pass"));
    }

    #[test]
    fn test_credentials_debug_hides_passphrase() {
        let debug = format!("{:?}", full_file());
        assert!(!debug.contains("file-pass"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = with_env(&[], || {
            resolve_config(&RunArgs::default(), Some(full_file())).unwrap()
        });

        assert_eq!(resolved.workflow.release.to_string(), "BDGHubNoKey/Backdoor");
        assert_eq!(resolved.workflow.output_dir, PathBuf::from("signed_ipas"));
        assert_eq!(resolved.workflow.staging_dir, PathBuf::from("temp_files"));
        assert_eq!(resolved.release_host.api_base.as_str(), "https://api.github.com/");
        assert!(resolved.release_host.token.is_none());
        assert_eq!(resolved.release_host.request_timeout, Duration::from_secs(30));
        assert_eq!(resolved.release_host.download_timeout, Duration::from_secs(600));
        assert_eq!(resolved.tool.program, PathBuf::from("DaiSign-API"));
        assert_eq!(resolved.tool.timeout, Duration::from_secs(600));
        assert_eq!(resolved.tool.passphrase_delivery, PassphraseDelivery::Argument);
        assert_eq!(
            resolved.workflow.credentials.passphrase.expose_secret(),
            "file-pass"
        );
    }

    #[test]
    fn test_resolve_env_overrides_file() {
        let resolved = with_env(
            &[
                (ENV_OWNER, "env-owner"),
                (ENV_CERT_PASSWORD, "env-pass"),
                (ENV_OUTPUT_DIR, "/srv/signed"),
                (ENV_GITHUB_TOKEN, "ghp_example"),
            ],
            || resolve_config(&RunArgs::default(), Some(full_file())).unwrap(),
        );

        assert_eq!(resolved.workflow.release.owner, "env-owner");
        assert_eq!(resolved.workflow.release.repo, "Backdoor");
        assert_eq!(resolved.workflow.credentials.passphrase.expose_secret(), "env-pass");
        assert_eq!(resolved.workflow.output_dir, PathBuf::from("/srv/signed"));
        assert_eq!(
            resolved.release_host.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("ghp_example".to_string())
        );
    }

    #[test]
    fn test_resolve_flags_override_env() {
        let args = RunArgs {
            owner: Some("flag-owner".to_string()),
            tool: Some(PathBuf::from("/usr/local/bin/sign")),
            api_base: Some("https://ghe.example.com/api/v3".to_string()),
            ..Default::default()
        };
        let resolved = with_env(
            &[(ENV_OWNER, "env-owner"), (ENV_SIGNING_TOOL, "/env/tool")],
            || resolve_config(&args, Some(full_file())).unwrap(),
        );

        assert_eq!(resolved.workflow.release.owner, "flag-owner");
        assert_eq!(resolved.tool.program, PathBuf::from("/usr/local/bin/sign"));
        assert_eq!(
            resolved.release_host.api_base.as_str(),
            "https://ghe.example.com/api/v3"
        );
    }

    #[test]
    fn test_resolve_empty_env_is_ignored() {
        let resolved = with_env(&[(ENV_OWNER, "")], || {
            resolve_config(&RunArgs::default(), Some(full_file())).unwrap()
        });
        assert_eq!(resolved.workflow.release.owner, "BDGHubNoKey");
    }

    #[test]
    fn test_resolve_without_config_uses_env() {
        let resolved = with_env(
            &[
                (ENV_OWNER, "o"),
                (ENV_REPO, "r"),
                (ENV_CERTIFICATE, "c.p12"),
                (ENV_PROVISIONING_PROFILE, "p.mobileprovision"),
                (ENV_CERT_PASSWORD, "pw"),
            ],
            || resolve_config(&RunArgs::default(), None).unwrap(),
        );
        assert_eq!(resolved.workflow.release.to_string(), "o/r");
        assert_eq!(
            resolved.workflow.credentials.certificate_path,
            PathBuf::from("c.p12")
        );
    }

    #[test]
    fn test_resolve_missing_passphrase_names_sources() {
        let mut file = full_file();
        file.credentials.passphrase = None;

        let err = with_env(&[], || resolve_config(&RunArgs::default(), Some(file)).unwrap_err());

        let message = err.to_string();
        assert!(message.contains("certificate passphrase"));
        assert!(message.contains("credentials.passphrase"));
        assert!(message.contains(ENV_CERT_PASSWORD));
        assert!(!message.contains("--"));
        assert_eq!(
            err.downcast_ref::<ResignError>().map(|e| e.kind()),
            Some(resign_core::ErrorKind::Configuration)
        );
    }

    #[test]
    fn test_resolve_rejects_output_inside_staging() {
        let args = RunArgs {
            output_dir: Some(PathBuf::from("temp_files/signed")),
            ..Default::default()
        };

        let err = with_env(&[], || resolve_config(&args, Some(full_file())).unwrap_err());

        assert!(err.to_string().contains("temp_files/signed"));
        assert_eq!(
            err.downcast_ref::<ResignError>().map(|e| e.kind()),
            Some(resign_core::ErrorKind::Configuration)
        );
    }

    #[test]
    fn test_resolve_missing_owner_mentions_flag() {
        let err = with_env(&[], || resolve_config(&RunArgs::default(), None).unwrap_err());
        assert!(err.to_string().contains("--owner"));
    }

    #[test]
    fn test_resolve_passphrase_env_delivery() {
        let mut file = full_file();
        file.tool.passphrase_env = Some("DAISIGN_PASSWORD".to_string());
        file.tool.timeout_secs = Some(90);

        let resolved = with_env(&[], || resolve_config(&RunArgs::default(), Some(file)).unwrap());

        assert_eq!(
            resolved.tool.passphrase_delivery,
            PassphraseDelivery::Environment("DAISIGN_PASSWORD".to_string())
        );
        assert_eq!(resolved.tool.timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_config_path_priority() {
        let flag = PathBuf::from("/etc/resign.huml");
        let from_flag = with_env(&[(ENV_CONFIG, "/env/config.huml")], || {
            config_path(Some(&flag)).unwrap()
        });
        assert_eq!(from_flag, flag);

        let from_env = with_env(&[(ENV_CONFIG, "/env/config.huml")], || config_path(None).unwrap());
        assert_eq!(from_env, PathBuf::from("/env/config.huml"));
    }
}
