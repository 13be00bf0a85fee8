//! `resign run`: one fetch → sign → report run.

use anyhow::{bail, Result};
use clap::Args;
use resign_core::models::RunReport;
use resign_core::workflow::Workflow;
use std::path::{Path, PathBuf};

use crate::config::{load_config, resolve_config};

const INSTALL_HINT: &str = "Open this link on your iOS device's Safari browser to install the app.";

/// Overrides for a single run. Unset flags fall back to the environment,
/// then the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Owner of the repository whose latest release is signed
    #[arg(long)]
    pub owner: Option<String>,

    /// Repository whose latest release is signed
    #[arg(long)]
    pub repo: Option<String>,

    /// Release host API root (e.g. https://ghe.example.com/api/v3)
    #[arg(long)]
    pub api_base: Option<String>,

    /// Path to the .p12 signing certificate
    #[arg(long)]
    pub certificate: Option<PathBuf>,

    /// Path to the .mobileprovision provisioning profile
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Directory receiving signed artifacts
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Staging directory, removed after the run
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Signing tool executable
    #[arg(long)]
    pub tool: Option<PathBuf>,
}

/// Executes one run. Returns whether it succeeded.
pub async fn handle_run_command(config_path: &Path, args: RunArgs) -> Result<bool> {
    let file_config = load_config(config_path)?;
    let resolved = resolve_config(&args, file_config)?;
    let workflow = Workflow::external(resolved.workflow, resolved.release_host, resolved.tool)?;

    let report = tokio::select! {
        report = workflow.run() => report,
        _ = tokio::signal::ctrl_c() => {
            // The run future is dropped here, which removes the workspace
            // and kills the signing tool.
            bail!("Run cancelled");
        }
    };

    if report.is_success() {
        for line in render_report(&report) {
            println!("{}", line);
        }
    } else {
        for line in render_report(&report) {
            eprintln!("{}", line);
        }
    }

    Ok(report.is_success())
}

fn render_report(report: &RunReport) -> Vec<String> {
    let mut lines = report.summary();
    if report.is_success() {
        lines.push(INSTALL_HINT.to_string());
    }
    lines
}
