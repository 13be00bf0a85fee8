//! Ephemeral staging workspace.
//!
//! The workspace directory is created before a run does any work and removed
//! when it ends, whether the run succeeded, failed, panicked or was cancelled.
//! Normal exits remove it asynchronously through [`WorkspaceGuard::destroy`];
//! every other exit goes through the guard's `Drop`.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::{ResignError, Result};

/// Result of a body run inside a workspace.
#[derive(Debug)]
pub struct WorkspaceOutcome<T> {
    /// What the body returned. Never replaced by a cleanup failure.
    pub result: Result<T>,
    /// Set when the directory could not be removed afterwards.
    pub cleanup_error: Option<ResignError>,
}

/// Owns the lifecycle of one staging directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    path: PathBuf,
}

impl WorkspaceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory (and parents). Succeeds if it already exists.
    pub async fn create(&self) -> Result<WorkspaceGuard> {
        if self.path.as_os_str().is_empty() || self.path.file_name().is_none() {
            return Err(ResignError::Configuration(format!(
                "Refusing to use '{}' as a staging directory",
                self.path.display()
            )));
        }

        tokio::fs::create_dir_all(&self.path).await?;
        tracing::debug!("Created workspace: {}", self.path.display());

        Ok(WorkspaceGuard {
            path: self.path.clone(),
            armed: true,
        })
    }

    /// Runs `body` with the workspace path and removes the workspace afterwards.
    ///
    /// If the workspace cannot be created the body is not run. Dropping the
    /// returned future part way through still removes the directory.
    pub async fn with_workspace<T, F, Fut>(&self, body: F) -> WorkspaceOutcome<T>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = match self.create().await {
            Ok(guard) => guard,
            Err(e) => {
                return WorkspaceOutcome {
                    result: Err(e),
                    cleanup_error: None,
                };
            }
        };

        let result = body(guard.path().to_path_buf()).await;

        let cleanup_error = guard.destroy().await.err();
        if let Some(e) = &cleanup_error {
            tracing::warn!("{}", e);
        }

        WorkspaceOutcome {
            result,
            cleanup_error,
        }
    }
}

/// Removes the workspace when dropped unless [`destroy`](Self::destroy) ran.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    armed: bool,
}

impl WorkspaceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively removes the workspace. A missing directory is not an error.
    pub async fn destroy(mut self) -> Result<()> {
        self.armed = false;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                tracing::debug!("Removed workspace: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ResignError::Cleanup(format!(
                "Failed to remove workspace {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("Removed abandoned workspace: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                "Failed to remove abandoned workspace {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
