//! Scratch workspace for submission artifacts
//!
//! Every submission is written to its own uniquely named file inside a
//! shared scratch directory. The directory is created on demand; artifact
//! names come from UUID v4 so concurrent submissions never collide.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub use crate::workspace::artifact::Artifact;

mod artifact;

/// File name prefix for artifacts
const ARTIFACT_PREFIX: &str = "temp_";
/// File extension for artifacts
const ARTIFACT_EXTENSION: &str = "py";

/// Errors that occur while materializing or removing artifacts
///
/// Display output never includes file system paths; paths are logged.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create scratch directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("artifact {0} already exists")]
    Collision(Uuid),

    #[error("failed to write artifact: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to remove artifact {id}: {source}")]
    Remove {
        id: Uuid,
        #[source]
        source: std::io::Error,
    },
}

/// Shared scratch directory
#[derive(Debug, Clone)]
pub struct Workspace {
    scratch_dir: PathBuf,
}

impl Workspace {
    /// Relative directories are anchored at the current working directory so
    /// artifact paths stay valid for a child running elsewhere.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        let scratch_dir = scratch_dir.into();
        let scratch_dir = std::path::absolute(&scratch_dir).unwrap_or(scratch_dir);
        Self { scratch_dir }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path an artifact with the given id lives at
    pub fn artifact_path(&self, id: &Uuid) -> PathBuf {
        self.scratch_dir
            .join(format!("{ARTIFACT_PREFIX}{id}.{ARTIFACT_EXTENSION}"))
    }

    /// Write `source` to a freshly named artifact.
    ///
    /// The artifact is returned only once the whole source is on disk.
    #[instrument(skip(self, source), fields(len = source.len()))]
    pub async fn materialize(&self, source: &str) -> Result<Artifact, WorkspaceError> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| {
                warn!(dir = %self.scratch_dir.display(), error = %e, "cannot create scratch directory");
                WorkspaceError::CreateDir(e)
            })?;

        self.write_artifact(Uuid::new_v4(), source).await
    }

    async fn write_artifact(&self, id: Uuid, source: &str) -> Result<Artifact, WorkspaceError> {
        let path = self.artifact_path(&id);

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(%id, "artifact name collision");
                return Err(WorkspaceError::Collision(id));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot create artifact");
                return Err(WorkspaceError::Write(e));
            }
        };

        let written = async {
            file.write_all(source.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            warn!(path = %path.display(), error = %e, "artifact write failed");
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %rm, "failed to remove partial artifact");
            }
            return Err(WorkspaceError::Write(e));
        }

        debug!(%id, path = %path.display(), "artifact materialized");
        Ok(Artifact::new(id, path))
    }
}
