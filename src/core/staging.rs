//! Temporary storage for files in transit.
//!
//! A [`StagedFile`] is a scoped handle: it owns one path under the staging
//! directory and removes it when released. Dropping an unreleased handle
//! removes the file synchronously, so cleanup also happens when a run
//! returns early or panics.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Errors raised while preparing staging space
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to create staging directory {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Manages the staging directory
#[derive(Debug, Clone)]
pub struct TempStorage {
    root: PathBuf,
    isolate_runs: bool,
}

impl TempStorage {
    /// Stage files directly under `root`, named after their display name
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            isolate_runs: false,
        }
    }

    /// Stage each file in its own `<root>/<uuid>/` directory.
    ///
    /// Without isolation, two concurrent runs with the same display name
    /// share one staged path.
    pub fn with_isolated_runs(mut self, isolate: bool) -> Self {
        self.isolate_runs = isolate;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the staging directory exists and is a directory
    pub async fn ensure_dir(&self) -> Result<(), StagingError> {
        if tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| {
                error!(path = %self.root.display(), error = %source, "Failed to create temp directory");
                StagingError::DirectoryUnavailable {
                    path: self.root.clone(),
                    source,
                }
            })?;

        debug!(path = %self.root.display(), "Created staging directory");
        Ok(())
    }

    /// Reserve a staged path for `file_name`.
    ///
    /// Nothing is written yet; the caller fills the path. The handle is
    /// responsible for removing whatever ends up there.
    pub async fn stage(&self, file_name: &str) -> Result<StagedFile, StagingError> {
        self.ensure_dir().await?;

        if !self.isolate_runs {
            return Ok(StagedFile::new(self.root.join(file_name), None));
        }

        let run_dir = self.root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir(&run_dir)
            .await
            .map_err(|source| StagingError::DirectoryUnavailable {
                path: run_dir.clone(),
                source,
            })?;

        Ok(StagedFile::new(run_dir.join(file_name), Some(run_dir)))
    }
}

/// A file on transient storage, removed on release or drop
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    run_dir: Option<PathBuf>,
    released: bool,
}

impl StagedFile {
    fn new(path: PathBuf, run_dir: Option<PathBuf>) -> Self {
        Self {
            path,
            run_dir,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the staged file
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Remove the staged file.
    ///
    /// A file that was never written and one that is already gone are the
    /// same no-op. Failures are logged and swallowed.
    pub async fn release(mut self) {
        self.released = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!(path = %self.path.display(), "Removed temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to remove temporary file")
            }
        }

        if let Some(dir) = &self.run_dir {
            report_run_dir_removal(dir, tokio::fs::remove_dir(dir).await);
        }
    }
}

fn report_run_dir_removal(dir: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => error!(path = %dir.display(), error = %e, "Failed to remove run directory"),
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "Removed temporary file on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to remove temporary file")
            }
        }

        if let Some(dir) = &self.run_dir {
            report_run_dir_removal(dir, std::fs::remove_dir(dir));
        }
    }
}
