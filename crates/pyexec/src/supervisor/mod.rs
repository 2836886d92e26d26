//! Execution supervisor
//!
//! Runs one interpreter process per artifact under a wall clock deadline and
//! a combined output ceiling. Stdout and stderr are drained incrementally by
//! two tasks into request-local buffers. Once the interpreter is gone (exited,
//! timed out or the run was dropped) its whole process group is killed, so no
//! descendant outlives the run. Every termination path ends in one
//! [`ExecutionResult`] or one [`SupervisorError`].

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Child;
use tracing::{debug, instrument, warn};

pub use crate::supervisor::command::InterpreterCommand;
use crate::supervisor::capture::{OutputBudget, StreamCapture};
use crate::types::{ExecutionLimits, ExecutionResult, Outcome};

mod capture;
mod command;

/// Errors that keep the supervisor from producing an outcome
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for interpreter: {0}")]
    Wait(#[source] std::io::Error),
}

/// Supervises interpreter processes with fixed bounds
#[derive(Debug, Clone)]
pub struct Supervisor {
    wall_time: Duration,
    max_output: usize,
    drain_grace: Duration,
}

impl Supervisor {
    pub fn new(limits: &ExecutionLimits) -> Self {
        Self {
            wall_time: limits.wall_time(),
            max_output: limits.output_ceiling(),
            drain_grace: limits.drain_grace_period(),
        }
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    /// Spawn `command` and supervise it to completion
    #[instrument(skip_all, fields(script = %command.script().display()))]
    pub async fn run(&self, command: &InterpreterCommand) -> Result<ExecutionResult, SupervisorError> {
        let started = Instant::now();

        let mut child = command.build().spawn().map_err(|e| {
            warn!(program = %command.program().display(), error = %e, "interpreter failed to start");
            SupervisorError::Spawn(e)
        })?;
        let pid = child.id();
        debug!(?pid, "interpreter started");

        let mut group = ProcessGroup::new(pid);
        let budget = OutputBudget::new(self.max_output);
        let mut stdout = StreamCapture::spawn(child.stdout.take(), budget.clone());
        let mut stderr = StreamCapture::spawn(child.stderr.take(), budget.clone());

        let (status, timed_out) = match tokio::time::timeout(self.wall_time, child.wait()).await {
            Ok(Ok(status)) => (Some(status), false),
            Ok(Err(e)) => {
                warn!(?pid, error = %e, "waiting for interpreter failed");
                kill_tree(&mut child, &mut group).await;
                return Err(SupervisorError::Wait(e));
            }
            Err(_) => {
                warn!(?pid, limit = ?self.wall_time, "wall time limit exceeded, killing interpreter");
                (kill_tree(&mut child, &mut group).await, true)
            }
        };

        // Descendants never outlive the run, whatever they did with their stdio.
        group.kill();

        let mut settled = stdout.settle(self.drain_grace).await;
        settled &= stderr.settle(self.drain_grace).await;
        if !settled {
            warn!(?pid, "output still open after process group was killed, abandoning readers");
        }

        let (exit_code, signal) = status.map(exit_parts).unwrap_or((None, None));
        let outcome = if timed_out {
            Outcome::Timeout
        } else if exit_code == Some(0) {
            Outcome::Success
        } else {
            Outcome::ScriptError
        };

        let result = ExecutionResult {
            outcome,
            exit_code: if timed_out { None } else { exit_code },
            signal,
            stdout: String::from_utf8_lossy(&stdout.into_bytes()).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.into_bytes()).into_owned(),
            truncated: budget.is_truncated(),
            wall_time: started.elapsed().as_secs_f64(),
        };

        debug!(
            outcome = ?result.outcome,
            exit_code = ?result.exit_code,
            signal = ?result.signal,
            truncated = result.truncated,
            wall_time = result.wall_time,
            "interpreter finished"
        );

        Ok(result)
    }
}

/// Kill the child and everything in its process group, then reap it
async fn kill_tree(child: &mut Child, group: &mut ProcessGroup) -> Option<ExitStatus> {
    group.kill();

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "start_kill failed");
    }

    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "failed to reap killed interpreter");
            None
        }
    }
}

/// The process group created for one interpreter
///
/// The group is sent SIGKILL exactly once: explicitly via
/// [`kill()`](Self::kill), or on drop when a run is cancelled midway.
#[derive(Debug)]
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            signal_group(pgid);
        }
        #[cfg(not(unix))]
        self.pgid.take();
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!(pgid = ?self.pgid, "run dropped before completion, killing process group");
            self.kill();
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only delivers a signal; the group was created for this
    // child by `process_group(0)`.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, error = %err, "killpg failed");
        }
    }
}

fn exit_parts(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal())
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}
