//! Derivation of redundant snapshot fields
//!
//! Every probe hands its core numbers to one of these constructors so
//! percentages, MiB mirrors and availability are computed in one place.

use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryBreakdown, MemoryMetrics};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Build CPU metrics from used and limit cores.
///
/// `used` is clamped into `[0, limit]`.
pub fn cpu_from_used_cores(
    used: f64,
    limit: f64,
    load_average: Option<String>,
) -> Result<CpuMetrics, ProbeError> {
    check_cpu_limit(limit)?;
    if !used.is_finite() {
        return Err(ProbeError::parse("cpu usage", format!("non-finite used cores {used}")));
    }

    let used_cores = used.clamp(0.0, limit);
    Ok(CpuMetrics {
        usage_percent: used_cores / limit * 100.0,
        limit_cores: limit,
        used_cores,
        available_cores: limit - used_cores,
        load_average,
    })
}

/// Build CPU metrics from a host-wide usage percentage.
///
/// Percentages outside `[0, 100]` are rejected, not clamped: they mean the
/// report was misread.
pub fn cpu_from_usage_percent(
    percent: f64,
    limit: f64,
    load_average: Option<String>,
) -> Result<CpuMetrics, ProbeError> {
    check_cpu_limit(limit)?;
    if !(0.0..=100.0).contains(&percent) {
        return Err(ProbeError::parse(
            "cpu usage",
            format!("usage percent {percent} outside [0, 100]"),
        ));
    }

    let used_cores = percent / 100.0 * limit;
    Ok(CpuMetrics {
        usage_percent: percent,
        limit_cores: limit,
        used_cores,
        available_cores: limit - used_cores,
        load_average,
    })
}

/// Build memory metrics from a single usage/limit pair (container accounting).
pub fn memory_from_usage_limit(usage: u64, limit: u64) -> Result<MemoryMetrics, ProbeError> {
    check_memory_limit(limit)?;
    let available = limit.saturating_sub(usage);
    Ok(assemble_memory(usage, limit, available, available, 0, 0))
}

/// Build memory metrics from a free/buffers/cached breakdown (OS reports).
pub fn memory_from_breakdown(breakdown: MemoryBreakdown) -> Result<MemoryMetrics, ProbeError> {
    check_memory_limit(breakdown.total)?;
    let available = breakdown
        .free
        .saturating_add(breakdown.buffers)
        .saturating_add(breakdown.cached);
    Ok(assemble_memory(
        breakdown.used,
        breakdown.total,
        available,
        breakdown.free,
        breakdown.buffers,
        breakdown.cached,
    ))
}

fn assemble_memory(
    usage: u64,
    limit: u64,
    available: u64,
    free: u64,
    buffers: u64,
    cached: u64,
) -> MemoryMetrics {
    MemoryMetrics {
        usage_bytes: usage,
        limit_bytes: limit,
        available_bytes: available,
        usage_percent: usage as f64 / limit as f64 * 100.0,
        usage_mb: usage as f64 / BYTES_PER_MB,
        limit_mb: limit as f64 / BYTES_PER_MB,
        available_mb: available as f64 / BYTES_PER_MB,
        free_bytes: free,
        buffer_bytes: buffers,
        cached_bytes: cached,
    }
}

fn check_cpu_limit(limit: f64) -> Result<(), ProbeError> {
    if limit.is_finite() && limit > 0.0 {
        Ok(())
    } else {
        Err(ProbeError::parse("cpu limit", format!("invalid core count {limit}")))
    }
}

fn check_memory_limit(limit: u64) -> Result<(), ProbeError> {
    if limit == 0 {
        return Err(ProbeError::parse("memory limit", "limit is zero"));
    }
    Ok(())
}
