//! Output formats of `top`, `free`, `vm_stat`, `sysctl`, `nproc` and `uptime`

use super::{parse_f64, parse_u64};
use crate::error::ProbeError;
use crate::models::MemoryBreakdown;

/// Page size assumed when `sysctl -n hw.pagesize` cannot be used
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

/// CPU usage percent (`100 - idle`) from a `top` report.
///
/// Understands the procps summary line
/// (`%Cpu(s):  5.2 us,  2.1 sy,  0.0 ni, 92.7 id, ...`, also the older
/// `92.7%id` spelling) and the BSD/Darwin line
/// (`CPU usage: 7.98% user, 5.32% sys, 86.69% idle`).
pub fn parse_top_cpu_usage(output: &str) -> Result<f64, ProbeError> {
    for line in output.lines() {
        let idle = if line.contains("%Cpu") || line.contains("Cpu(s)") {
            procps_idle(line)
        } else if line.contains("CPU usage:") {
            bsd_idle(line)
        } else {
            None
        };

        if let Some(idle) = idle {
            if (0.0..=100.0).contains(&idle) {
                return Ok(100.0 - idle);
            }
        }
    }

    Err(ProbeError::parse("top output", "no idle percentage found"))
}

fn procps_idle(line: &str) -> Option<f64> {
    let (_, fields) = line.split_once(':')?;
    fields.split(',').find_map(|field| {
        let value = field.trim().strip_suffix("id")?;
        let value = value.trim().trim_end_matches('%');
        value.trim().parse::<f64>().ok()
    })
}

fn bsd_idle(line: &str) -> Option<f64> {
    let (_, fields) = line.split_once("CPU usage:")?;
    fields.split(',').find_map(|field| {
        let mut tokens = field.split_whitespace();
        let value = tokens.next()?;
        if tokens.next()? != "idle" {
            return None;
        }
        value.trim_end_matches('%').parse::<f64>().ok()
    })
}

/// Memory figures from `free -b`.
///
/// Column positions are taken from the header when there is one: the
/// modern `buff/cache` column lands in `buffers`, the legacy `buffers` and
/// `cached` columns map by name. Without a header, buffers and cached are
/// read from fixed positions 5 and 6 of the `Mem:` row.
pub fn parse_free_output(output: &str) -> Result<MemoryBreakdown, ProbeError> {
    let header: Option<Vec<&str>> = output
        .lines()
        .find(|line| {
            let line = line.trim_start();
            !line.starts_with("Mem:") && line.split_whitespace().any(|t| t == "total")
        })
        .map(|line| line.split_whitespace().collect());

    let row = output
        .lines()
        .find(|line| line.trim_start().starts_with("Mem:"))
        .ok_or_else(|| ProbeError::parse("free output", "no Mem: row"))?;

    let fields: Vec<&str> = row.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(ProbeError::parse(
            "free output",
            format!("Mem: row has {} fields, need at least 4", fields.len()),
        ));
    }

    let total = parse_u64(fields[1], "free total")?;
    let used = parse_u64(fields[2], "free used")?;
    let free = parse_u64(fields[3], "free free")?;

    // Optional columns are best-effort: an unreadable one counts as zero.
    let optional = |index: Option<usize>| -> u64 {
        index
            .and_then(|i| fields.get(i))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };

    let (buffers, cached) = match header {
        Some(columns) => {
            // The row starts with the "Mem:" label, the header does not.
            let position = |name: &str| columns.iter().position(|c| *c == name).map(|i| i + 1);
            match position("buff/cache") {
                Some(index) => (optional(Some(index)), 0),
                None => (optional(position("buffers")), optional(position("cached"))),
            }
        }
        None => (optional(Some(5)), optional(Some(6))),
    };

    Ok(MemoryBreakdown {
        total,
        used,
        free,
        buffers,
        cached,
    })
}

/// Page-count categories summed into the Darwin total
const VM_STAT_TOTAL_KEYS: &[&str] = &[
    "Pages free",
    "Pages active",
    "Pages inactive",
    "Pages speculative",
    "Pages wired down",
    "Pages throttled",
    "Pages purgeable",
    "File-backed pages",
    "Anonymous pages",
];

/// Memory figures from Darwin `vm_stat`, given the page size in bytes
pub fn parse_vm_stat(output: &str, page_size: u64) -> Result<MemoryBreakdown, ProbeError> {
    let mut total_pages = 0u64;
    let mut free_pages = 0u64;
    let mut recognised = 0usize;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let Ok(pages) = value.trim().trim_end_matches('.').parse::<u64>() else {
            continue;
        };

        if VM_STAT_TOTAL_KEYS.contains(&key) {
            total_pages = total_pages.saturating_add(pages);
            recognised += 1;
        }
        if key == "Pages free" || key == "Pages speculative" {
            free_pages = free_pages.saturating_add(pages);
        }
    }

    if recognised == 0 {
        return Err(ProbeError::parse("vm_stat output", "no page counts found"));
    }

    let total = total_pages.saturating_mul(page_size);
    let free = free_pages.saturating_mul(page_size);
    Ok(MemoryBreakdown {
        total,
        used: total.saturating_sub(free),
        free,
        buffers: 0,
        cached: 0,
    })
}

/// Core count printed by `nproc` or `sysctl -n hw.ncpu`
pub fn parse_core_count(output: &str) -> Result<f64, ProbeError> {
    let cores = parse_f64(output, "core count")?;
    if cores < 1.0 {
        return Err(ProbeError::parse("core count", format!("{cores} cores")));
    }
    Ok(cores)
}

/// Page size from `sysctl -n hw.pagesize`, or [`DEFAULT_PAGE_SIZE`]
pub fn page_size_or_default(output: Result<String, ProbeError>) -> u64 {
    output
        .ok()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// The raw `1m, 5m, 15m` part of `uptime` output
pub fn parse_load_average(output: &str) -> Option<String> {
    ["load averages:", "load average:"].iter().find_map(|marker| {
        let (_, rest) = output.split_once(marker)?;
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCPS_TOP: &str = "top - 10:30:00 up 2 days, 20:45,  1 user,  load average: 0.52, 0.58, 0.59
Tasks: 123 total,   1 running, 122 sleeping,   0 stopped,   0 zombie
%Cpu(s):  5.2 us,  2.1 sy,  0.0 ni, 92.7 id,  0.0 wa,  0.0 hi,  0.0 si,  0.0 st
MiB Mem :  16384.0 total,   8192.0 free,   4096.0 used,   4096.0 buff/cache";

    #[test]
    fn test_top_procps_dialect() {
        let usage = parse_top_cpu_usage(PROCPS_TOP).unwrap();
        assert!((usage - 7.3).abs() < 0.001);
    }

    #[test]
    fn test_top_procps_legacy_spelling() {
        let output = "Cpu(s):  3.0%us,  1.0%sy,  0.0%ni, 95.5%id,  0.5%wa,  0.0%hi,  0.0%si";
        let usage = parse_top_cpu_usage(output).unwrap();
        assert!((usage - 4.5).abs() < 0.001);
    }

    #[test]
    fn test_top_bsd_dialect() {
        let usage = parse_top_cpu_usage("CPU usage: 15.2% user, 8.1% system, 76.7% idle").unwrap();
        assert!((usage - 23.3).abs() < 0.001);

        let darwin = "Processes: 512 total, 2 running, 510 sleeping, 2571 threads
Load Avg: 1.93, 2.10, 2.25
CPU usage: 7.98% user, 5.32% sys, 86.69% idle
SharedLibs: 500M resident, 90M data, 40M linkedit.";
        let usage = parse_top_cpu_usage(darwin).unwrap();
        assert!((usage - 13.31).abs() < 0.001);
    }

    #[test]
    fn test_top_unrecognised() {
        assert!(parse_top_cpu_usage("invalid output").is_err());
        assert!(parse_top_cpu_usage("").is_err());
        assert!(parse_top_cpu_usage("%Cpu(s):  5.2 us,  2.1 sy").is_err());
        assert!(parse_top_cpu_usage("CPU usage: 7.98% user, 5.32% sys").is_err());
    }

    #[test]
    fn test_free_modern_header() {
        let output = "              total        used        free      shared  buff/cache   available
Mem:       16777216     8388608     4194304          0     4194304     8388608
Swap:      16777216            0    16777216";

        let mem = parse_free_output(output).unwrap();
        assert_eq!(mem.total, 16777216);
        assert_eq!(mem.used, 8388608);
        assert_eq!(mem.free, 4194304);
        assert_eq!(mem.buffers, 4194304);
        assert_eq!(mem.cached, 0);
    }

    #[test]
    fn test_free_legacy_header() {
        let output = "             total       used       free     shared    buffers     cached
Mem:      8000000    6000000    2000000          0     500000    1500000
-/+ buffers/cache:    4000000    4000000";

        let mem = parse_free_output(output).unwrap();
        assert_eq!(mem.buffers, 500000);
        assert_eq!(mem.cached, 1500000);
    }

    #[test]
    fn test_free_without_header_uses_fixed_positions() {
        let mem = parse_free_output("Mem: 1000 400 300 0 100 200").unwrap();
        assert_eq!(mem.buffers, 100);
        assert_eq!(mem.cached, 200);

        let mem = parse_free_output("Mem: 1000 400 300").unwrap();
        assert_eq!(mem.free, 300);
        assert_eq!(mem.buffers, 0);
        assert_eq!(mem.cached, 0);
    }

    #[test]
    fn test_free_malformed() {
        assert!(parse_free_output("invalid output").is_err());
        assert!(parse_free_output("").is_err());
        assert!(parse_free_output("              total        used\nSwap: 1 0 1").is_err());
        assert!(parse_free_output("Mem: 1000 400").is_err());
        assert!(parse_free_output("Mem: lots 400 300").is_err());
    }

    #[test]
    fn test_vm_stat() {
        let output = "Mach Virtual Memory Statistics: (page size of 4096 bytes)
Pages free:                               1000.
Pages active:                             3000.
Pages inactive:                           2000.
Pages speculative:                         500.
Pages throttled:                             0.
Pages wired down:                         1500.
Pages purgeable:                           100.
\"Translation faults\":                 123456789.
Pages copy-on-write:                     54321.
File-backed pages:                        1200.
Anonymous pages:                          2700.";

        let mem = parse_vm_stat(output, 4096).unwrap();
        let total_pages = 1000 + 3000 + 2000 + 500 + 1500 + 100 + 1200 + 2700;
        assert_eq!(mem.total, total_pages * 4096);
        assert_eq!(mem.free, 1500 * 4096);
        assert_eq!(mem.used, (total_pages - 1500) * 4096);
        assert_eq!(mem.buffers, 0);
    }

    #[test]
    fn test_vm_stat_empty() {
        assert!(parse_vm_stat("", 4096).is_err());
        assert!(parse_vm_stat("invalid content", 4096).is_err());
    }

    #[test]
    fn test_core_count() {
        assert_eq!(parse_core_count("8\n").unwrap(), 8.0);
        assert!(parse_core_count("0").is_err());
        assert!(parse_core_count("").is_err());
    }

    #[test]
    fn test_page_size_default() {
        assert_eq!(page_size_or_default(Ok("16384\n".to_string())), 16384);
        assert_eq!(page_size_or_default(Ok("garbage".to_string())), DEFAULT_PAGE_SIZE);
        assert_eq!(
            page_size_or_default(Err(ProbeError::CommandUnavailable {
                command: "sysctl -n hw.pagesize".to_string(),
                detail: "not found".to_string(),
            })),
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn test_load_average() {
        let linux = " 10:30:00 up 2 days, 20:45,  1 user,  load average: 0.52, 0.58, 0.59\n";
        assert_eq!(parse_load_average(linux).as_deref(), Some("0.52, 0.58, 0.59"));

        let darwin = "10:30  up 3 days,  2:01, 2 users, load averages: 1.93 2.10 2.25\n";
        assert_eq!(parse_load_average(darwin).as_deref(), Some("1.93 2.10 2.25"));

        assert_eq!(parse_load_average("up 2 days"), None);
        assert_eq!(parse_load_average("load average:"), None);
    }
}
