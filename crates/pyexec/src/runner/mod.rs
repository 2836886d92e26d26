//! Submission runner
//!
//! Ties the pieces together for one submission: admission, materialization,
//! supervised execution and cleanup. The artifact is removed exactly once on
//! every path that created it.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use crate::runner::intake::{IntakeError, Submission};
pub use crate::runner::pool::{ExecutionPool, PoolError};

mod intake;
mod pool;

use crate::{
    config::Config,
    supervisor::{InterpreterCommand, Supervisor, SupervisorError},
    types::{ExecutionResult, Outcome},
    workspace::{Artifact, Workspace, WorkspaceError},
};

/// Name the artifact path is replaced with in captured output
pub const REDACTED_SCRIPT_NAME: &str = "main.py";

/// Marker appended to output that hit the capture ceiling
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// Variables every interpreter run gets regardless of passthrough settings
const FIXED_ENV: [(&str, &str); 3] = [
    ("PYTHONUNBUFFERED", "1"),
    ("PYTHONDONTWRITEBYTECODE", "1"),
    ("PYTHONIOENCODING", "utf-8"),
];

/// Errors that keep a submission from producing an outcome
///
/// A script that fails is not an error; it is an `Ok` report with
/// [`Outcome::ScriptError`].
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("{0}")]
    InvalidRequest(#[from] IntakeError),

    #[error("server busy: {0}")]
    Busy(#[from] PoolError),

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("{0}")]
    Supervisor(#[from] SupervisorError),
}

/// Outcome of one submission together with what is needed to report it
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Id of the (already removed) artifact
    pub artifact_id: Uuid,

    /// Supervised result with the artifact path redacted
    pub result: ExecutionResult,

    /// Wall time limit the run was held to
    pub time_limit: Duration,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Captured stdout, with a marker line when output was truncated
    pub fn output_text(&self) -> String {
        let mut output = self.result.stdout.clone();
        if self.result.truncated {
            push_line(&mut output, TRUNCATION_MARKER);
        }
        output
    }

    /// Error text for the caller; `None` only on success
    pub fn error_text(&self) -> Option<String> {
        match self.result.outcome {
            Outcome::Success => None,
            Outcome::ScriptError => Some(self.result.stderr.clone()),
            Outcome::Timeout => {
                let mut error = self.result.stderr.clone();
                push_line(
                    &mut error,
                    &format!("Execution timed out after {}", seconds(self.time_limit)),
                );
                Some(error)
            }
        }
    }
}

fn seconds(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs == 1.0 {
        "1 second".to_owned()
    } else {
        format!("{secs} seconds")
    }
}

fn push_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
}

/// Runs submissions against a shared scratch workspace
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    workspace: Workspace,
    supervisor: Supervisor,
    pool: ExecutionPool,
}

impl Runner {
    /// Create a new runner with the given configuration
    pub fn new(config: Config) -> Self {
        let limits = config.effective_limits(None);
        Self {
            workspace: Workspace::new(config.scratch_dir.clone()),
            supervisor: Supervisor::new(&limits),
            pool: ExecutionPool::new(config.concurrency(), config.queue_wait()),
            config: Arc::new(config),
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn pool(&self) -> &ExecutionPool {
        &self.pool
    }

    /// Validate raw input and execute it
    pub async fn submit(&self, code: Option<String>) -> Result<ExecutionReport, ExecuteError> {
        let submission = Submission::new(code, self.config.limits.source_ceiling())?;
        self.execute(submission).await
    }

    /// Execute a validated submission
    #[instrument(skip_all, fields(len = submission.len()))]
    pub async fn execute(&self, submission: Submission) -> Result<ExecutionReport, ExecuteError> {
        let _permit = self.pool.admit().await?;

        let artifact = self.workspace.materialize(submission.code()).await?;
        let artifact_id = artifact.id();
        let script_path = artifact.path().display().to_string();

        let supervised = self.supervisor.run(&self.command_for(&artifact)).await;

        if let Err(e) = artifact.cleanup().await {
            debug!(id = %artifact_id, error = %e, "continuing after cleanup failure");
        }

        let mut result = supervised?;
        result.stdout = result.stdout.replace(&script_path, REDACTED_SCRIPT_NAME);
        result.stderr = result.stderr.replace(&script_path, REDACTED_SCRIPT_NAME);

        info!(
            id = %artifact_id,
            outcome = ?result.outcome,
            exit_code = ?result.exit_code,
            truncated = result.truncated,
            wall_time = result.wall_time,
            "submission finished"
        );

        Ok(ExecutionReport {
            artifact_id,
            result,
            time_limit: self.supervisor.wall_time(),
        })
    }

    fn command_for(&self, artifact: &Artifact) -> InterpreterCommand {
        FIXED_ENV.iter().fold(
            InterpreterCommand::new(self.config.interpreter_binary(), artifact.path())
                .working_dir(self.workspace.scratch_dir())
                .env_inherit(self.config.env_passthrough.iter().cloned()),
            |command, (key, value)| command.env(*key, *value),
        )
    }
}
