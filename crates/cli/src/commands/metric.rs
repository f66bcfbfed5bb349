//! Single-metric commands

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::json;

use crate::output::{format_bytes, format_cores, print_json, OutputFormat};
use toolbox_lib::ResolutionEngine;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CpuField {
    /// Usage as a percentage of the limit
    Usage,
    /// Limit in cores
    Limit,
    /// Limit minus used cores
    Available,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MemoryField {
    /// Usage in bytes
    Usage,
    /// Limit in bytes
    Limit,
    /// Usage as a percentage of the limit
    Percent,
    /// Bytes still available
    Available,
}

pub async fn show_cpu(engine: &ResolutionEngine, field: CpuField, format: OutputFormat) -> Result<()> {
    let (metric, value) = match field {
        CpuField::Usage => ("cpu_usage_percent", engine.cpu_usage_percent().await),
        CpuField::Limit => ("cpu_limit_cores", engine.cpu_limit_cores().await),
        CpuField::Available => ("available_cpu_cores", engine.available_cpu_cores().await),
    };
    let value = value.context("Failed to resolve CPU metrics")?;

    match format {
        OutputFormat::Json => print_json(&json!({ "metric": metric, "value": value }))?,
        OutputFormat::Table => match field {
            CpuField::Usage => println!("{:.2}", value),
            CpuField::Limit | CpuField::Available => println!("{}", format_cores(value)),
        },
    }
    Ok(())
}

pub async fn show_memory(
    engine: &ResolutionEngine,
    field: MemoryField,
    format: OutputFormat,
) -> Result<()> {
    let (metric, value) = match field {
        MemoryField::Usage => (
            "memory_usage_bytes",
            engine.memory_usage_bytes().await.map(|v| json!(v)),
        ),
        MemoryField::Limit => (
            "memory_limit_bytes",
            engine.memory_limit_bytes().await.map(|v| json!(v)),
        ),
        MemoryField::Percent => (
            "memory_usage_percent",
            engine.memory_usage_percent().await.map(|v| json!(v)),
        ),
        MemoryField::Available => (
            "available_memory_bytes",
            engine.available_memory_bytes().await.map(|v| json!(v)),
        ),
    };
    let value = value.context("Failed to resolve memory metrics")?;

    match format {
        OutputFormat::Json => print_json(&json!({ "metric": metric, "value": value }))?,
        OutputFormat::Table => match (field, value.as_u64(), value.as_f64()) {
            (MemoryField::Percent, _, Some(percent)) => println!("{:.2}", percent),
            (_, Some(bytes), _) => println!("{} ({})", bytes, format_bytes(bytes)),
            _ => println!("{}", value),
        },
    }
    Ok(())
}
