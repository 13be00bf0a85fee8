//! Signing credential models.

use std::path::PathBuf;

use secrecy::SecretString;

/// Certificate, passphrase and provisioning profile used to re-sign an artifact.
///
/// The passphrase stays wrapped in a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug)]
pub struct CredentialBundle {
    /// Path to the p12 certificate.
    pub certificate_path: PathBuf,
    /// Passphrase protecting the certificate.
    pub passphrase: SecretString,
    /// Path to the mobileprovision file.
    pub provisioning_profile_path: PathBuf,
}

impl CredentialBundle {
    pub fn new(
        certificate_path: impl Into<PathBuf>,
        passphrase: SecretString,
        provisioning_profile_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            certificate_path: certificate_path.into(),
            passphrase,
            provisioning_profile_path: provisioning_profile_path.into(),
        }
    }
}

/// How the certificate passphrase reaches the signing tool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PassphraseDelivery {
    /// Passed with the `-p` flag. Visible in the process table while the
    /// tool runs.
    #[default]
    Argument,
    /// Exported to the child in the named environment variable; `-p` is
    /// omitted.
    Environment(String),
}
