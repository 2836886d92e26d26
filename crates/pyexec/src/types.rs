use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Wall clock time limit in seconds
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Combined stdout + stderr capture ceiling in bytes
    #[serde(default)]
    pub max_output: Option<u64>,

    /// Maximum accepted source size in bytes
    #[serde(default)]
    pub max_source_bytes: Option<u64>,

    /// Time to wait for output pipes to close after the interpreter exits,
    /// in seconds
    #[serde(default)]
    pub drain_grace: Option<f64>,
}

impl ExecutionLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1024;
    /// 1 megabyte in bytes
    pub const MB: u64 = 1024 * 1024;

    pub const DEFAULT_WALL_TIME_LIMIT: f64 = 10.0;
    pub const DEFAULT_MAX_OUTPUT: u64 = Self::MB;
    pub const DEFAULT_MAX_SOURCE_BYTES: u64 = Self::MB;
    pub const DEFAULT_DRAIN_GRACE: f64 = 0.5;

    /// Create new limits with the reference defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, useful as an override base
    pub fn unset() -> Self {
        Self {
            wall_time_limit: None,
            max_output: None,
            max_source_bytes: None,
            drain_grace: None,
        }
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the combined output ceiling in bytes
    pub fn with_max_output(mut self, bytes: u64) -> Self {
        self.max_output = Some(bytes);
        self
    }

    /// Set the maximum source size in bytes
    pub fn with_max_source_bytes(mut self, bytes: u64) -> Self {
        self.max_source_bytes = Some(bytes);
        self
    }

    /// Set the pipe drain grace period in seconds
    pub fn with_drain_grace(mut self, seconds: f64) -> Self {
        self.drain_grace = Some(seconds);
        self
    }

    /// Apply overrides from another ExecutionLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            max_output: overrides.max_output.or(self.max_output),
            max_source_bytes: overrides.max_source_bytes.or(self.max_source_bytes),
            drain_grace: overrides.drain_grace.or(self.drain_grace),
        }
    }

    /// Effective wall clock deadline
    pub fn wall_time(&self) -> Duration {
        seconds(self.wall_time_limit, Self::DEFAULT_WALL_TIME_LIMIT)
    }

    /// Effective combined output ceiling in bytes
    pub fn output_ceiling(&self) -> usize {
        usize::try_from(self.max_output.unwrap_or(Self::DEFAULT_MAX_OUTPUT)).unwrap_or(usize::MAX)
    }

    /// Effective maximum source size in bytes
    pub fn source_ceiling(&self) -> usize {
        usize::try_from(
            self.max_source_bytes
                .unwrap_or(Self::DEFAULT_MAX_SOURCE_BYTES),
        )
        .unwrap_or(usize::MAX)
    }

    /// Effective drain grace period
    pub fn drain_grace_period(&self) -> Duration {
        seconds(self.drain_grace, Self::DEFAULT_DRAIN_GRACE)
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            wall_time_limit: Some(Self::DEFAULT_WALL_TIME_LIMIT),
            max_output: Some(Self::DEFAULT_MAX_OUTPUT),
            max_source_bytes: Some(Self::DEFAULT_MAX_SOURCE_BYTES),
            drain_grace: Some(Self::DEFAULT_DRAIN_GRACE),
        }
    }
}

fn seconds(value: Option<f64>, fallback: f64) -> Duration {
    value
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_else(|| Duration::from_secs_f64(fallback))
}

/// How a supervised interpreter run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Interpreter exited with status zero
    Success,

    /// Interpreter exited non-zero or was killed by a signal it raised itself
    ScriptError,

    /// Wall clock limit reached; the process group was killed
    Timeout,
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Result of one supervised run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: Outcome,

    /// Exit code if the interpreter exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the interpreter was killed by a signal
    pub signal: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Whether the combined output ceiling cut capture short
    pub truncated: bool,

    /// Wall clock time used in seconds
    pub wall_time: f64,
}

impl ExecutionResult {
    /// Check if the execution was successful (exited with code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success() && self.exit_code == Some(0)
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            outcome: Outcome::Success,
            exit_code: None,
            signal: None,
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            wall_time: 0.0,
        }
    }
}
