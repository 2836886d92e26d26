//! Configuration file loading for pyexec
//!
//! Layers the embedded example, an optional file and the process environment
//! using the config crate.

use std::collections::HashMap;
use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, EXAMPLE_CONFIG, ENV_PREFIX};

/// Shorthand honored for `interpreter`
const PYTHON_BIN_VAR: &str = "PYTHON_BIN";
/// Shorthand honored for `server.port`
const PORT_VAR: &str = "PORT";

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the effective configuration for the service.
    ///
    /// Precedence, lowest first: embedded example, `path`, `PYEXEC_*`
    /// variables, then `PYTHON_BIN` / `PORT`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    pub(crate) fn load_with_env(
        path: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let python_bin = vars.get(PYTHON_BIN_VAR).cloned();
        let port = vars.get(PORT_VAR).cloned();

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("env_passthrough")
                    .with_list_parse_key("server.allowed_origins")
                    .source(Some(vars)),
            )
            .set_override_option("interpreter", python_bin)?
            .set_override_option("server.port", port)?
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Loading validates already; call this again after changing fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref interpreter) = self.interpreter
            && interpreter.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("interpreter is empty".into()));
        }

        if self.scratch_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("scratch_dir is empty".into()));
        }

        if self.max_concurrent == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent must be at least 1".into(),
            ));
        }

        if !self.queue_timeout.is_finite() || self.queue_timeout < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "queue_timeout must be a non-negative number of seconds, got {}",
                self.queue_timeout
            )));
        }

        let limits = &self.limits;
        if let Some(wall) = limits.wall_time_limit
            && !(wall.is_finite() && wall > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "limits.wall_time_limit must be positive, got {wall}"
            )));
        }
        if let Some(grace) = limits.drain_grace
            && !(grace.is_finite() && grace >= 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "limits.drain_grace must be non-negative, got {grace}"
            )));
        }
        if limits.max_output == Some(0) {
            return Err(ConfigError::Invalid(
                "limits.max_output must be positive".into(),
            ));
        }
        if limits.max_source_bytes == Some(0) {
            return Err(ConfigError::Invalid(
                "limits.max_source_bytes must be positive".into(),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be positive".into(),
            ));
        }

        Ok(())
    }
}
