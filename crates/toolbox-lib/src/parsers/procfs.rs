//! `/proc/cpuinfo`, `/proc/meminfo`, `/proc/stat` and `/proc/loadavg`

use super::parse_u64;
use crate::error::ProbeError;
use crate::models::MemoryBreakdown;

/// Number of `processor` entries in `/proc/cpuinfo`
pub fn count_processors(cpuinfo: &str) -> Result<f64, ProbeError> {
    let count = cpuinfo
        .lines()
        .filter(|line| line.starts_with("processor"))
        .count();

    if count == 0 {
        return Err(ProbeError::parse("/proc/cpuinfo", "no processors found"));
    }
    Ok(count as f64)
}

/// `MemTotal` from `/proc/meminfo`, in bytes
pub fn parse_mem_total(meminfo: &str) -> Result<u64, ProbeError> {
    meminfo_kib(meminfo, "MemTotal:")?
        .map(|kib| kib.saturating_mul(1024))
        .ok_or_else(|| ProbeError::parse("/proc/meminfo", "MemTotal not found"))
}

/// Total, free, buffers and page cache from `/proc/meminfo`.
///
/// Used memory is whatever is not free, buffers or cache.
pub fn parse_meminfo_breakdown(meminfo: &str) -> Result<MemoryBreakdown, ProbeError> {
    let total = parse_mem_total(meminfo)?;
    let free = meminfo_kib(meminfo, "MemFree:")?
        .ok_or_else(|| ProbeError::parse("/proc/meminfo", "MemFree not found"))?
        .saturating_mul(1024);
    let buffers = meminfo_kib(meminfo, "Buffers:")?.unwrap_or(0).saturating_mul(1024);
    let cached = meminfo_kib(meminfo, "Cached:")?.unwrap_or(0).saturating_mul(1024);

    Ok(MemoryBreakdown {
        total,
        used: total
            .saturating_sub(free)
            .saturating_sub(buffers)
            .saturating_sub(cached),
        free,
        buffers,
        cached,
    })
}

fn meminfo_kib(meminfo: &str, key: &str) -> Result<Option<u64>, ProbeError> {
    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() == Some(key) {
            let value = parts
                .next()
                .ok_or_else(|| ProbeError::parse("/proc/meminfo", format!("{key} has no value")))?;
            return parse_u64(value, "/proc/meminfo").map(Some);
        }
    }
    Ok(None)
}

/// Fraction of time since boot the CPUs spent busy, from the aggregate
/// `cpu ` line of `/proc/stat`.
///
/// Busy is everything except `idle` and `iowait`.
pub fn parse_proc_stat_busy(stat: &str) -> Result<f64, ProbeError> {
    let line = stat
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| ProbeError::parse("/proc/stat", "aggregate cpu line not found"))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|token| parse_u64(token, "/proc/stat"))
        .collect::<Result<Vec<u64>, _>>()?;
    if values.len() < 4 {
        return Err(ProbeError::parse(
            "/proc/stat",
            format!("cpu line has {} fields, need at least 4", values.len()),
        ));
    }

    // user nice system idle iowait irq softirq steal [guest guest_nice]
    // guest time is already counted in user/nice
    let counted = &values[..values.len().min(8)];
    let overflow = || ProbeError::parse("/proc/stat", "counter overflow");
    let total = counted
        .iter()
        .try_fold(0u64, |sum, &value| sum.checked_add(value))
        .ok_or_else(overflow)?;
    let idle = values[3]
        .checked_add(values.get(4).copied().unwrap_or(0))
        .ok_or_else(overflow)?;
    if total == 0 {
        return Err(ProbeError::parse("/proc/stat", "cpu line sums to zero"));
    }

    Ok(total.saturating_sub(idle) as f64 / total as f64)
}

/// The three load averages from `/proc/loadavg`, formatted like `uptime`
pub fn parse_loadavg(content: &str) -> Option<String> {
    let fields: Vec<&str> = content.split_whitespace().take(3).collect();
    (fields.len() == 3).then(|| fields.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16384000 kB
MemFree:         2048000 kB
MemAvailable:    8192000 kB
Buffers:          512000 kB
Cached:          4096000 kB
SwapCached:            0 kB
";

    #[test]
    fn test_count_processors() {
        let cpuinfo = "processor\t: 0
vendor_id\t: GenuineIntel
model name\t: Intel(R) Xeon(R)

processor\t: 1
vendor_id\t: GenuineIntel

processor\t: 2

processor\t: 3
";
        assert_eq!(count_processors(cpuinfo).unwrap(), 4.0);
        assert!(count_processors("").is_err());
        assert!(count_processors("vendor_id : GenuineIntel").is_err());
    }

    #[test]
    fn test_mem_total() {
        assert_eq!(parse_mem_total(MEMINFO).unwrap(), 16384000 * 1024);
        assert!(parse_mem_total("MemFree: 100 kB").is_err());
        assert!(parse_mem_total("MemTotal: lots kB").is_err());
    }

    #[test]
    fn test_meminfo_breakdown() {
        let mem = parse_meminfo_breakdown(MEMINFO).unwrap();
        assert_eq!(mem.total, 16384000 * 1024);
        assert_eq!(mem.free, 2048000 * 1024);
        assert_eq!(mem.buffers, 512000 * 1024);
        assert_eq!(mem.cached, 4096000 * 1024);
        assert_eq!(mem.used, (16384000 - 2048000 - 512000 - 4096000) * 1024);
    }

    #[test]
    fn test_meminfo_breakdown_needs_free() {
        assert!(parse_meminfo_breakdown("MemTotal: 1000 kB\n").is_err());
    }

    #[test]
    fn test_proc_stat_busy() {
        let stat = "cpu  300 0 100 500 100 0 0 0 0 0
cpu0 150 0 50 250 50 0 0 0 0 0
intr 12345
";
        let busy = parse_proc_stat_busy(stat).unwrap();
        assert!((busy - 400.0 / 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_proc_stat_malformed() {
        assert!(parse_proc_stat_busy("").is_err());
        assert!(parse_proc_stat_busy("cpu0 1 2 3 4").is_err());
        assert!(parse_proc_stat_busy("cpu  1 2 3").is_err());
        assert!(parse_proc_stat_busy("cpu  0 0 0 0").is_err());
    }

    #[test]
    fn test_proc_stat_counter_overflow_is_parse_failure() {
        let err = parse_proc_stat_busy("cpu  18446744073709551615 1 0 0\n").unwrap_err();
        assert!(matches!(err, ProbeError::ParseFailure { .. }));
        assert!(err.to_string().contains("counter overflow"));

        let err = parse_proc_stat_busy("cpu  0 0 0 18446744073709551615 1\n").unwrap_err();
        assert!(err.to_string().contains("counter overflow"));
    }

    #[test]
    fn test_loadavg() {
        assert_eq!(
            parse_loadavg("0.52 0.58 0.59 1/234 5678\n").as_deref(),
            Some("0.52, 0.58, 0.59")
        );
        assert_eq!(parse_loadavg("0.52"), None);
    }
}
