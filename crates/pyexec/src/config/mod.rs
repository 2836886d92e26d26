use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::ExecutionLimits;

mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../pyexec.example.toml");

/// Prefix for environment variable overrides (`PYEXEC_LIMITS__MAX_OUTPUT`, ...)
pub const ENV_PREFIX: &str = "PYEXEC";

/// Interpreter used when none is configured
pub const DEFAULT_INTERPRETER: &str = "python3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for pyexec
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Interpreter executable (uses PATH lookup if not absolute).
    #[serde(default)]
    pub interpreter: Option<PathBuf>,

    /// Directory that holds transient per-submission artifacts.
    ///
    /// Created on demand; shared by all concurrent submissions.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Host environment variables forwarded to the interpreter.
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,

    /// Maximum number of interpreters running at once.
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Seconds a submission may wait for an execution slot.
    #[serde(default = "default_queue_timeout")]
    pub queue_timeout: f64,

    /// Per-run resource limits
    #[serde(default)]
    pub limits: ExecutionLimits,

    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body ceiling in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Socket address the service binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("invalid listen address: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the path to the interpreter
    pub fn interpreter_binary(&self) -> PathBuf {
        self.interpreter
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER))
    }

    /// Number of execution slots
    pub fn concurrency(&self) -> usize {
        self.max_concurrent.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// How long a submission may queue for a slot
    pub fn queue_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.queue_timeout).unwrap_or(Duration::ZERO)
    }

    /// Merge resource limits with defaults
    pub fn effective_limits(&self, overrides: Option<&ExecutionLimits>) -> ExecutionLimits {
        match overrides {
            Some(limits) => self.limits.with_overrides(limits),
            None => self.limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("pyexec")
}

fn default_env_passthrough() -> Vec<String> {
    ["PATH", "LANG", "LC_ALL", "SYSTEMROOT"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_queue_timeout() -> f64 {
    30.0
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    5000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}
