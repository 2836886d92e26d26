//! Command builder for the interpreter process

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Builder for one interpreter invocation
///
/// The child starts from an empty environment; only explicitly set
/// variables and inherited allowlisted host variables reach it.
#[derive(Debug, Clone)]
pub struct InterpreterCommand {
    /// Interpreter executable
    program: PathBuf,
    /// Artifact passed as the sole argument
    script: PathBuf,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    env_inherit: Vec<String>,
}

impl InterpreterCommand {
    pub fn new(program: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            working_dir: None,
            env: BTreeMap::new(),
            env_inherit: Vec::new(),
        }
    }

    /// Set the working directory of the child
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Forward host environment variables by name, if present
    pub fn env_inherit<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_inherit.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Environment the child will see, resolving inherited keys with `lookup`.
    /// Explicitly set variables win over inherited ones.
    pub(crate) fn resolve_env_with<F>(&self, lookup: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env: BTreeMap<String, String> = self
            .env_inherit
            .iter()
            .filter_map(|key| lookup(key).map(|value| (key.clone(), value)))
            .collect();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }

    /// Build the tokio command: piped stdout/stderr, null stdin, cleared
    /// environment, own process group, no privilege gain.
    pub(crate) fn build(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(&self.script)
            .env_clear()
            .envs(self.resolve_env_with(|key| std::env::var(key).ok()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        command.process_group(0);

        #[cfg(target_os = "linux")]
        forbid_new_privileges(&mut command);

        command
    }
}

#[cfg(target_os = "linux")]
fn forbid_new_privileges(command: &mut Command) {
    // SAFETY: the hook runs between fork and exec and only calls prctl,
    // which is async-signal-safe and touches no parent memory.
    unsafe {
        command.pre_exec(|| {
            let (on, unused): (libc::c_ulong, libc::c_ulong) = (1, 0);
            if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, on, unused, unused, unused) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
