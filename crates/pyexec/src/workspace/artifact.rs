use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::workspace::WorkspaceError;

/// A transient file holding one submission's source
///
/// Exclusively owned by the handling of a single submission.
///
/// # Cleanup
///
/// Call [`cleanup()`](Self::cleanup) once handling is done; it consumes the
/// artifact so removal happens exactly once. The `Drop` implementation is a
/// synchronous fallback for paths that skipped it (panics, cancelled
/// requests) and logs a warning when it has to act.
#[derive(Debug)]
pub struct Artifact {
    id: Uuid,
    path: PathBuf,
    removed: bool,
}

impl Artifact {
    pub(crate) fn new(id: Uuid, path: PathBuf) -> Self {
        Self {
            id,
            path,
            removed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the artifact from the scratch directory
    ///
    /// An artifact that is already gone counts as removed.
    #[must_use = "cleanup errors should be handled"]
    pub async fn cleanup(mut self) -> Result<(), WorkspaceError> {
        self.removed = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(id = %self.id, "artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(id = %self.id, "artifact already gone");
                Ok(())
            }
            Err(source) => {
                warn!(id = %self.id, path = %self.path.display(), error = %source, "failed to remove artifact");
                Err(WorkspaceError::Remove {
                    id: self.id,
                    source,
                })
            }
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }

        warn!(
            id = %self.id,
            path = %self.path.display(),
            "Artifact dropped without explicit cleanup, removing synchronously"
        );

        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(id = %self.id, error = %e, "best-effort artifact removal failed"),
        }
    }
}
