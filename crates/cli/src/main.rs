//! Container Resource Toolbox CLI
//!
//! Reports CPU and memory usage and limits as seen from inside a
//! container, with the source each figure came from, plus raw system
//! reports and connectivity checks.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{connectivity, metric, raw, snapshot};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use toolbox_lib::{CpuSampling, EngineConfig, HostSource, OsFamily, ResolutionEngine};
use tracing_subscriber::EnvFilter;

/// Container Resource Toolbox CLI
#[derive(Parser)]
#[command(name = "tbx")]
#[command(author, version, about = "Container Resource Toolbox: container-aware CPU and memory introspection", long_about = None)]
pub struct Cli {
    /// Output format (defaults to the config file's, then table)
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// OS family whose sources are used (linux or darwin)
    #[arg(long, env = "TBX_OS_FAMILY", global = true)]
    pub os_family: Option<OsFamily>,

    /// Root of the cgroup mount
    #[arg(long, env = "TBX_CGROUP_ROOT", global = true)]
    pub cgroup_root: Option<PathBuf>,

    /// Root of procfs
    #[arg(long, env = "TBX_PROC_ROOT", global = true)]
    pub proc_root: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a full CPU and memory snapshot
    Snapshot {
        /// Use OS utilities only, skipping container accounting
        #[arg(long)]
        command_only: bool,

        /// Measure CPU from two counter reads this many milliseconds apart
        #[arg(long, value_name = "MS")]
        two_sample: Option<u64>,
    },

    /// Resolve a single CPU figure
    Cpu {
        #[arg(value_enum)]
        field: metric::CpuField,
    },

    /// Resolve a single memory figure
    Memory {
        #[arg(value_enum)]
        field: metric::MemoryField,
    },

    /// Print an unprocessed system report
    Raw {
        #[arg(value_enum)]
        report: raw::RawKind,
    },

    /// Check TCP and HTTP reachability of a host
    Check {
        /// Host name or IP address
        domain: String,

        /// Port to dial (default 80)
        #[arg(long, short)]
        port: Option<String>,

        /// Timeout in seconds for each stage (default 5)
        #[arg(long, short)]
        timeout: Option<i64>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("TBX_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_engine(
    cli: &Cli,
    config: &config::Config,
    two_sample: Option<u64>,
) -> Result<ResolutionEngine> {
    let family = match (cli.os_family, config.os_family.as_deref()) {
        (Some(family), _) => family,
        (None, Some(name)) => name.parse().context("invalid os_family in config file")?,
        (None, None) => OsFamily::current(),
    };

    let mut engine_config = EngineConfig::default();
    if let Some(root) = cli.cgroup_root.clone().or_else(|| config.cgroup_root.clone()) {
        engine_config.paths.cgroup_root = root;
    }
    if let Some(root) = cli.proc_root.clone().or_else(|| config.proc_root.clone()) {
        engine_config.paths.proc_root = root;
    }
    if let Some(ms) = two_sample {
        anyhow::ensure!(ms > 0, "--two-sample interval must be positive");
        engine_config.cpu_sampling = CpuSampling::TwoSample {
            interval: Duration::from_millis(ms),
        };
    }

    Ok(ResolutionEngine::new(Arc::new(HostSource), family, engine_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::Config::load()?;
    let format = match cli.format {
        Some(format) => format,
        None => config.output_format()?,
    };

    match &cli.command {
        Commands::Snapshot {
            command_only,
            two_sample,
        } => {
            let engine = build_engine(&cli, &config, *two_sample)?;
            snapshot::show_snapshot(&engine, *command_only, format).await?;
        }
        Commands::Cpu { field } => {
            let engine = build_engine(&cli, &config, None)?;
            metric::show_cpu(&engine, *field, format).await?;
        }
        Commands::Memory { field } => {
            let engine = build_engine(&cli, &config, None)?;
            metric::show_memory(&engine, *field, format).await?;
        }
        Commands::Raw { report } => {
            let engine = build_engine(&cli, &config, None)?;
            raw::show_raw(&engine, *report, format).await?;
        }
        Commands::Check {
            domain,
            port,
            timeout,
        } => {
            let timeout = timeout.or(config.timeout_secs).unwrap_or(0);
            connectivity::check(domain, port.clone().unwrap_or_default(), timeout, format).await?;
        }
    }

    Ok(())
}
