//! Toolbox Agent - container resource introspection over HTTP
//!
//! Serves CPU and memory snapshots resolved from cgroup accounting or OS
//! utilities, plus connectivity diagnostics, health and Prometheus metrics.

use anyhow::{Context, Result};
use std::sync::Arc;
use toolbox_agent::{api, config::AgentConfig};
use toolbox_lib::{HostSource, ResolutionEngine, StructuredLogger, ToolboxMetrics};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting toolbox-agent");

    let config = AgentConfig::load()?;
    let family = config.os_family().context("invalid TOOLBOX_OS_FAMILY")?;
    let engine_config = config.engine_config()?;
    info!(
        host_name = %config.host_name,
        os_family = %family,
        cgroup_root = %config.cgroup_root,
        proc_root = %config.proc_root,
        cpu_sampling = %config.cpu_sampling,
        "Agent configured"
    );

    let engine = ResolutionEngine::new(Arc::new(HostSource), family, engine_config);
    let metrics = ToolboxMetrics::new();
    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(AGENT_VERSION, family.as_str());

    // Probe once so startup logs show which sources answer on this host
    match engine.resolve_snapshot().await {
        Ok(snapshot) => logger.snapshot_resolved(&snapshot),
        Err(e) => warn!(error = %e, "Initial snapshot failed; serving anyway"),
    }

    let app_state = Arc::new(api::AppState::new(engine, metrics, logger.clone()));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    api::serve(config.api_port, app_state, shutdown).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
