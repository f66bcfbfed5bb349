//! Raw system report command

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::json;

use crate::output::{print_json, OutputFormat};
use toolbox_lib::{RawReport, ResolutionEngine};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RawKind {
    /// One-shot `top` report
    Load,
    /// `free -b` or `vm_stat`
    Memory,
    /// `ps aux`
    Processes,
    /// `uptime`
    Uptime,
}

impl From<RawKind> for RawReport {
    fn from(kind: RawKind) -> Self {
        match kind {
            RawKind::Load => RawReport::Load,
            RawKind::Memory => RawReport::Memory,
            RawKind::Processes => RawReport::Processes,
            RawKind::Uptime => RawReport::Uptime,
        }
    }
}

pub async fn show_raw(engine: &ResolutionEngine, kind: RawKind, format: OutputFormat) -> Result<()> {
    let report = RawReport::from(kind);
    let output = engine
        .raw_output(report)
        .await
        .with_context(|| format!("Failed to read {} report", report.name()))?;

    match format {
        OutputFormat::Json => print_json(&json!({ "report": report.name(), "output": output }))?,
        OutputFormat::Table => print!("{}", output),
    }
    Ok(())
}
