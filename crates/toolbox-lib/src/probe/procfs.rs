//! Host-wide probes over `/proc`, also used for unbounded cgroup limits

use super::ProbeContext;
use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryMetrics};
use crate::normalize;
use crate::parsers::procfs as parse;

pub(super) async fn host_cores(ctx: &ProbeContext<'_>) -> Result<f64, ProbeError> {
    parse::count_processors(&ctx.read_proc("cpuinfo").await?)
}

pub(super) async fn host_memory(ctx: &ProbeContext<'_>) -> Result<u64, ProbeError> {
    parse::parse_mem_total(&ctx.read_proc("meminfo").await?)
}

pub(super) async fn cpu(ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
    let cores = host_cores(ctx).await?;
    let busy = parse::parse_proc_stat_busy(&ctx.read_proc("stat").await?)?;
    let load = ctx
        .read_proc("loadavg")
        .await
        .ok()
        .and_then(|content| parse::parse_loadavg(&content));

    normalize::cpu_from_usage_percent(busy * 100.0, cores, load)
}

pub(super) async fn memory(ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
    let breakdown = parse::parse_meminfo_breakdown(&ctx.read_proc("meminfo").await?)?;
    normalize::memory_from_breakdown(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::test_support::{ctx, CPUINFO_4, MEMINFO_16G};
    use crate::source::{FixtureSource, SourcePaths};

    #[tokio::test]
    async fn test_cpu_from_proc_stat() {
        let source = FixtureSource::new()
            .with_file("/proc/cpuinfo", CPUINFO_4)
            .with_file("/proc/stat", "cpu  300 0 100 500 100 0 0 0 0 0\n")
            .with_file("/proc/loadavg", "1.00 0.75 0.50 2/345 6789\n");
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 4.0);
        assert!((cpu.usage_percent - 40.0).abs() < 1e-9);
        assert!((cpu.used_cores - 1.6).abs() < 1e-9);
        assert_eq!(cpu.load_average.as_deref(), Some("1.00, 0.75, 0.50"));
    }

    #[tokio::test]
    async fn test_cpu_without_loadavg() {
        let source = FixtureSource::new()
            .with_file("/proc/cpuinfo", CPUINFO_4)
            .with_file("/proc/stat", "cpu  300 0 100 500 100 0 0 0\n");
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.load_average, None);
    }

    #[tokio::test]
    async fn test_memory_from_meminfo() {
        let source = FixtureSource::new().with_file("/proc/meminfo", MEMINFO_16G);
        let paths = SourcePaths::default();

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 16777216 * 1024);
        assert_eq!(mem.free_bytes, 4194304 * 1024);
        assert_eq!(mem.buffer_bytes, 1048576 * 1024);
        assert_eq!(mem.cached_bytes, 2097152 * 1024);
        assert_eq!(mem.available_bytes, (4194304 + 1048576 + 2097152) * 1024);
        assert_eq!(mem.usage_bytes, (16777216 - 4194304 - 1048576 - 2097152) * 1024);
    }

    #[tokio::test]
    async fn test_custom_proc_root() {
        let source = FixtureSource::new().with_file("/host/proc/cpuinfo", CPUINFO_4);
        let paths = SourcePaths {
            proc_root: "/host/proc".into(),
            ..SourcePaths::default()
        };

        assert_eq!(host_cores(&ctx(&source, &paths)).await.unwrap(), 4.0);
    }
}
