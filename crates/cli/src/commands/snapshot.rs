//! Snapshot command

use anyhow::{Context, Result};
use colored::Colorize;

use crate::output::{
    color_method, color_percent, format_bytes, format_cores, print_info, print_json, print_rows,
    print_warning, FieldRow, OutputFormat,
};
use toolbox_lib::{ResolutionEngine, ResourceSnapshot};

/// Resolve and print a CPU and memory snapshot
pub async fn show_snapshot(
    engine: &ResolutionEngine,
    command_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let snapshot = if command_only {
        engine.resolve_snapshot_command_only().await
    } else {
        engine.resolve_snapshot().await
    }
    .context("Failed to resolve resource snapshot")?;

    match format {
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Table => print_snapshot_table(&snapshot),
    }
    Ok(())
}

fn print_snapshot_table(snapshot: &ResourceSnapshot) {
    println!("{}", "Resource Snapshot".bold());
    println!("{}", "=".repeat(40));

    let cpu = &snapshot.cpu;
    let memory = &snapshot.memory;
    let mut rows = vec![
        FieldRow::new("CPU usage", color_percent(cpu.usage_percent)),
        FieldRow::new("CPU limit (cores)", format_cores(cpu.limit_cores)),
        FieldRow::new("CPU used (cores)", format_cores(cpu.used_cores)),
        FieldRow::new("CPU available (cores)", format_cores(cpu.available_cores)),
    ];
    if let Some(load) = &cpu.load_average {
        rows.push(FieldRow::new("Load average", load.clone()));
    }
    rows.extend([
        FieldRow::new("Memory usage", color_percent(memory.usage_percent)),
        FieldRow::new("Memory used", format_bytes(memory.usage_bytes)),
        FieldRow::new("Memory limit", format_bytes(memory.limit_bytes)),
        FieldRow::new("Memory available", format_bytes(memory.available_bytes)),
        FieldRow::new("Memory free", format_bytes(memory.free_bytes)),
        FieldRow::new("Buffers", format_bytes(memory.buffer_bytes)),
        FieldRow::new("Cached", format_bytes(memory.cached_bytes)),
    ]);
    print_rows(rows);

    println!();
    print_info(&format!(
        "Method: {} (cpu: {}, memory: {})",
        color_method(snapshot.method),
        snapshot.cpu_source,
        snapshot.memory_source
    ));
    if snapshot.used_fallback {
        print_warning("Resolved via fallback source");
    }
    if let Some(at) = chrono::DateTime::from_timestamp(snapshot.captured_at, 0) {
        println!("Captured at {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
