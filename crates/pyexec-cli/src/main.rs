//! pyexec CLI
//!
//! Runs the execution HTTP service, or executes a single file through the
//! same supervised runner.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pyexec::{Config, EXAMPLE_CONFIG, ExecutionLimits, Runner};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pyexec")]
#[command(about = "A service for supervised execution of untrusted Python code")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Execute one Python file and print its output
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Wall time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path (default: pyexec.toml)
        #[arg(short, long, default_value = "pyexec.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Commands::Init { output, force } = &cli.command {
        return init_config(output, *force).await;
    }

    if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
    } else {
        debug!("using embedded configuration");
    }
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Run { source, time_limit } => run_file(config, &source, time_limit).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
        Commands::Init { .. } => Ok(()),
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = config.server.bind_addr().context("invalid listen address")?;

    let runner = Arc::new(Runner::new(config));
    info!(
        interpreter = %runner.config().interpreter_binary().display(),
        scratch_dir = %runner.workspace().scratch_dir().display(),
        slots = runner.pool().capacity(),
        "starting execution service"
    );

    pyexec::serve(runner, addr, pyexec::shutdown_signal())
        .await
        .with_context(|| format!("server on {addr} failed"))
}

async fn run_file(mut config: Config, source: &Path, time_limit: Option<f64>) -> Result<()> {
    apply_time_limit(&mut config, time_limit)?;

    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    info!(source = %source.display(), "running program");
    let runner = Runner::new(config);
    let report = runner.submit(Some(code)).await.context("execution failed")?;

    print!("{}", report.output_text());
    if let Some(error) = report.error_text()
        && !error.is_empty()
    {
        eprint!("{error}");
        if !error.ends_with('\n') {
            eprintln!();
        }
    }

    // Log execution info via tracing (stderr), keeping stdout clean for piping
    info!(
        outcome = ?report.result.outcome,
        wall_time = format_args!("{:.3}s", report.result.wall_time),
        exit_code = report.result.exit_code,
        signal = report.result.signal,
        truncated = report.result.truncated,
        "execution result"
    );

    if report.is_success() {
        Ok(())
    } else {
        std::process::exit(report.result.exit_code.unwrap_or(1));
    }
}

/// Override the wall time limit, rejecting values the config file would reject
fn apply_time_limit(config: &mut Config, time_limit: Option<f64>) -> Result<()> {
    if let Some(seconds) = time_limit {
        let overrides = ExecutionLimits::unset().with_wall_time_limit(seconds);
        config.limits = config.effective_limits(Some(&overrides));
        config.validate().context("invalid --time-limit")?;
    }
    Ok(())
}

fn show_config(config: &Config) {
    println!("Interpreter: {}", config.interpreter_binary().display());
    println!("Scratch directory: {}", config.scratch_dir.display());
    println!("Environment passthrough: {}", config.env_passthrough.join(", "));
    println!("Concurrent runs: {}", config.concurrency());
    println!("Queue timeout: {}s", config.queue_timeout);
    println!();
    println!("Resource limits:");
    println!("  Wall time limit: {:?}", config.limits.wall_time());
    println!("  Max output: {} bytes", config.limits.output_ceiling());
    println!("  Max source: {} bytes", config.limits.source_ceiling());
    println!("  Drain grace: {:?}", config.limits.drain_grace_period());
    println!();
    println!("Server:");
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Max body: {} bytes", config.server.max_body_bytes);
    if config.server.allowed_origins.is_empty() {
        println!("  CORS origins: any");
    } else {
        println!("  CORS origins: {}", config.server.allowed_origins.join(", "));
    }
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
