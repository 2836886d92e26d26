//! A library for supervised execution of untrusted Python submissions.
//!
//! pyexec accepts a piece of Python source, writes it to a uniquely named
//! artifact in a scratch directory, runs it in a fresh interpreter process
//! under a wall clock deadline and an output ceiling, and reports captured
//! stdout/stderr with an explicit outcome. The artifact is removed after
//! every run.
//!
//! # Features
//!
//! - **Out-of-process execution**: every submission gets its own interpreter in its own process group.
//! - **Bounded runs**: wall clock timeout that kills the whole process tree, shared output ceiling.
//! - **Clean environment**: cleared env with an allowlist, null stdin, no privilege gain on Linux.
//! - **Admission control**: a fixed number of concurrent runs with a bounded queue wait.
//! - **HTTP API**: axum router with the JSON contract, health check and graceful shutdown.
//! - **TOML configuration**: layered with environment overrides.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, ServerConfig};
pub use http::{ApiError, ExecuteRequest, ExecuteResponse, router, serve, shutdown_signal};
pub use runner::{
    ExecuteError, ExecutionPool, ExecutionReport, IntakeError, PoolError, Runner, Submission,
};
pub use supervisor::{InterpreterCommand, Supervisor, SupervisorError};
pub use types::{ExecutionLimits, ExecutionResult, Outcome};
pub use workspace::{Artifact, Workspace, WorkspaceError};

pub mod config;
pub mod http;
pub mod runner;
pub mod supervisor;
pub mod types;
pub mod workspace;
