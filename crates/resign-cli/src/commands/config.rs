//! `resign config` commands for managing CLI configuration.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use resign_core::models::PassphraseDelivery;
use std::fs;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::commands::run::RunArgs;
use crate::config::{
    load_config, resolve_config, DEFAULT_OUTPUT_DIR, DEFAULT_STAGING_DIR,
    DEFAULT_TOOL_TIMEOUT_SECS, ENV_CERT_PASSWORD, ENV_CONFIG,
};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create a new config file with default settings
    Init {
        /// Owner of the repository to sign releases from
        #[arg(long)]
        owner: Option<String>,

        /// Repository to sign releases from
        #[arg(long)]
        repo: Option<String>,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration (secrets are never printed)
    Show,

    /// Show config file path
    Path,
}

pub fn handle_config_command(config_path: &Path, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { owner, repo, force } => {
            init_config(config_path, owner.as_deref(), repo.as_deref(), force)
        }
        ConfigCommands::Show => show_config(config_path),
        ConfigCommands::Path => show_path(config_path),
    }
}

/// Create a new config file.
fn init_config(
    config_path: &Path,
    owner: Option<&str>,
    repo: Option<&str>,
    force: bool,
) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            #[cfg(unix)]
            {
                let permissions = fs::Permissions::from_mode(0o700);
                fs::set_permissions(dir, permissions)?;
            }
        }
    }

    write_config(config_path, &render_template(owner, repo))?;

    println!("Created config file at {}", config_path.display());
    println!();
    println!("Edit it to point at your certificate and provisioning profile.");
    println!("Provide the certificate passphrase with:");
    println!("  export {}=<passphrase>", ENV_CERT_PASSWORD);

    Ok(())
}

/// Display the configuration a run would use.
fn show_config(config_path: &Path) -> Result<()> {
    let file_config = load_config(config_path)?;

    if file_config.is_some() {
        println!("Config file: {}", config_path.display());
    } else {
        println!("Config file: {} (not found)", config_path.display());
    }
    println!();

    let resolved = match resolve_config(&RunArgs::default(), file_config) {
        Ok(r) => r,
        Err(e) => {
            println!("Configuration is incomplete: {}", e);
            println!();
            println!("Run 'resign config init' to create a config file.");
            return Ok(());
        }
    };

    let workflow = &resolved.workflow;
    println!("Release:");
    println!("  Repository:   {}", workflow.release);
    println!("  API base:     {}", resolved.release_host.api_base);
    println!(
        "  Token:        {}",
        if resolved.release_host.token.is_some() { "(set)" } else { "(not set)" }
    );
    println!();
    println!("Credentials:");
    println!("  Certificate:  {}", workflow.credentials.certificate_path.display());
    println!(
        "  Profile:      {}",
        workflow.credentials.provisioning_profile_path.display()
    );
    println!("  Passphrase:   (set)");
    println!();
    println!("Paths:");
    println!("  Output:       {}", workflow.output_dir.display());
    println!("  Staging:      {}", workflow.staging_dir.display());
    println!();
    println!("Signing tool:");
    println!("  Program:      {}", resolved.tool.program.display());
    println!("  Timeout:      {}s", resolved.tool.timeout.as_secs());
    match &resolved.tool.passphrase_delivery {
        PassphraseDelivery::Argument => println!("  Passphrase:   passed as -p argument"),
        PassphraseDelivery::Environment(name) => {
            println!("  Passphrase:   passed in ${}", name)
        }
    }

    Ok(())
}

/// Show the config file path.
fn show_path(config_path: &Path) -> Result<()> {
    println!("{}", config_path.display());

    if let Ok(env_path) = std::env::var(ENV_CONFIG) {
        println!();
        println!("Note: {} is set to: {}", ENV_CONFIG, env_path);
    }

    Ok(())
}

/// Write config to file with secure permissions.
fn write_config(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    // Owner read/write only
    #[cfg(unix)]
    {
        let permissions = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}

/// Quote a value as a HUML string.
fn huml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Starter config. The passphrase is left out on purpose.
fn render_template(owner: Option<&str>, repo: Option<&str>) -> String {
    let mut output = String::new();

    output.push_str("%HUML v0.2.0\n");
    output.push_str("release::\n");
    if let Some(owner) = owner {
        output.push_str(&format!("  owner: {}\n", huml_string(owner)));
    }
    if let Some(repo) = repo {
        output.push_str(&format!("  repo: {}\n", huml_string(repo)));
    }
    output.push_str("  api_base: \"https://api.github.com\"\n");
    output.push('\n');

    output.push_str("credentials::\n");
    output.push_str("  certificate: \"certificates/your_certificate.p12\"\n");
    output.push_str("  provisioning_profile: \"certificates/your_provision.mobileprovision\"\n");
    output.push('\n');

    output.push_str("paths::\n");
    output.push_str(&format!("  output_dir: \"{}\"\n", DEFAULT_OUTPUT_DIR));
    output.push_str(&format!("  staging_dir: \"{}\"\n", DEFAULT_STAGING_DIR));
    output.push('\n');

    output.push_str("tool::\n");
    output.push_str("  program: \"DaiSign-API\"\n");
    output.push_str(&format!("  timeout_secs: {}\n", DEFAULT_TOOL_TIMEOUT_SECS));

    output
}
