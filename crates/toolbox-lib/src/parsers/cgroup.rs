//! cgroup v1 and v2 accounting file formats

use super::{parse_f64, parse_u64};
use crate::error::ProbeError;

/// Value written by the kernel for "no limit" in v2 files
pub const UNBOUNDED: &str = "max";

/// cgroup v1 reports an unset memory limit as a huge page-aligned number
/// instead of a sentinel; anything above this is treated as unbounded.
pub const V1_MEMORY_UNBOUNDED_THRESHOLD: u64 = (i64::MAX / 2) as u64;

/// A CPU limit that may defer to the host core count
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuQuota {
    Cores(f64),
    Unbounded,
}

/// A memory limit that may defer to the host total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLimit {
    Bytes(u64),
    Unbounded,
}

/// Parse `usage_usec` from a v2 `cpu.stat` block
pub fn parse_cpu_stat_usage(content: &str) -> Result<u64, ProbeError> {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() == Some("usage_usec") {
            let value = parts
                .next()
                .ok_or_else(|| ProbeError::parse("cpu.stat", "usage_usec has no value"))?;
            return parse_u64(value, "cpu.stat");
        }
    }

    Err(ProbeError::parse("cpu.stat", "usage_usec not found"))
}

/// Parse a v2 `cpu.max` line: `<quota|max> <period>`
pub fn parse_cpu_max(content: &str) -> Result<CpuQuota, ProbeError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(ProbeError::parse(
            "cpu.max",
            format!("expected 2 fields, got {}", parts.len()),
        ));
    }

    if parts[0] == UNBOUNDED {
        return Ok(CpuQuota::Unbounded);
    }

    let quota = parse_f64(parts[0], "cpu.max")?;
    let period = parse_f64(parts[1], "cpu.max")?;
    quota_over_period(quota, period, "cpu.max")
}

/// Parse v1 `cpu.cfs_quota_us` and `cpu.cfs_period_us` contents.
///
/// A quota of `-1` means no limit.
pub fn parse_cfs_quota(quota: &str, period: &str) -> Result<CpuQuota, ProbeError> {
    let quota = parse_f64(quota, "cpu.cfs_quota_us")?;
    if quota == -1.0 {
        return Ok(CpuQuota::Unbounded);
    }
    let period = parse_f64(period, "cpu.cfs_period_us")?;
    quota_over_period(quota, period, "cpu.cfs_quota_us")
}

fn quota_over_period(quota: f64, period: f64, what: &'static str) -> Result<CpuQuota, ProbeError> {
    if quota <= 0.0 || period <= 0.0 {
        return Err(ProbeError::parse(
            what,
            format!("quota {quota} and period {period} must be positive"),
        ));
    }
    Ok(CpuQuota::Cores(quota / period))
}

/// Parse a v2 `memory.max` value
pub fn parse_memory_max(content: &str) -> Result<MemoryLimit, ProbeError> {
    let value = content.trim();
    if value == UNBOUNDED {
        return Ok(MemoryLimit::Unbounded);
    }
    parse_u64(value, "memory.max").map(MemoryLimit::Bytes)
}

/// Parse a v1 `memory.limit_in_bytes` value
pub fn parse_memory_limit_in_bytes(content: &str) -> Result<MemoryLimit, ProbeError> {
    let limit = parse_u64(content, "memory.limit_in_bytes")?;
    if limit > V1_MEMORY_UNBOUNDED_THRESHOLD {
        Ok(MemoryLimit::Unbounded)
    } else {
        Ok(MemoryLimit::Bytes(limit))
    }
}

/// Parse a file holding a single integer counter
/// (`memory.current`, `memory.usage_in_bytes`, `cpuacct.usage`)
pub fn parse_counter(content: &str, what: &'static str) -> Result<u64, ProbeError> {
    parse_u64(content, what)
}
