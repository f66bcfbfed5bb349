//! cgroup v2 probes
//!
//! Reads the unified hierarchy:
//! - cpu.max for the CPU quota
//! - cpu.stat for cumulative CPU usage
//! - memory.max and memory.current for memory

use super::{procfs, used_cores, CpuCounter, ProbeContext};
use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryMetrics};
use crate::normalize;
use crate::parsers::cgroup::{self, CpuQuota, MemoryLimit};

/// Present at the root of every cgroup v2 mount
const CONTROLLERS: &str = "cgroup.controllers";

pub(super) async fn cpu(ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
    ctx.require_cgroup(CONTROLLERS).await?;

    let limit = match cgroup::parse_cpu_max(&ctx.read_cgroup("cpu.max").await?)? {
        CpuQuota::Cores(cores) => cores,
        CpuQuota::Unbounded => procfs::host_cores(ctx).await?,
    };
    let used = used_cores(ctx, CpuCounter::CgroupV2).await?;

    normalize::cpu_from_used_cores(used, limit, None)
}

pub(super) async fn read_usage_usec(ctx: &ProbeContext<'_>) -> Result<u64, ProbeError> {
    cgroup::parse_cpu_stat_usage(&ctx.read_cgroup("cpu.stat").await?)
}

pub(super) async fn memory(ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
    ctx.require_cgroup(CONTROLLERS).await?;

    let limit = match cgroup::parse_memory_max(&ctx.read_cgroup("memory.max").await?)? {
        MemoryLimit::Bytes(bytes) => bytes,
        MemoryLimit::Unbounded => procfs::host_memory(ctx).await?,
    };
    let usage = cgroup::parse_counter(&ctx.read_cgroup("memory.current").await?, "memory.current")?;

    normalize::memory_from_usage_limit(usage, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::test_support::{ctx, CPUINFO_4, MEMINFO_16G};
    use crate::source::{FixtureSource, SourcePaths};

    fn v2_fixture() -> FixtureSource {
        FixtureSource::new()
            .with_file("/sys/fs/cgroup/cgroup.controllers", "cpu memory io\n")
            .with_file("/sys/fs/cgroup/cpu.max", "200000 100000\n")
            .with_file(
                "/sys/fs/cgroup/cpu.stat",
                "usage_usec 50000000\nuser_usec 30000000\nsystem_usec 20000000\n",
            )
            .with_file("/sys/fs/cgroup/memory.max", "1073741824\n")
            .with_file("/sys/fs/cgroup/memory.current", "268435456\n")
    }

    #[tokio::test]
    async fn test_cpu_with_quota() {
        let source = v2_fixture();
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 2.0);
        // 50 CPU-seconds / divisor 100
        assert!((cpu.used_cores - 0.5).abs() < 1e-9);
        assert!((cpu.usage_percent - 25.0).abs() < 1e-9);
        assert!((cpu.available_cores - 1.5).abs() < 1e-9);
        assert_eq!(cpu.load_average, None);
    }

    #[tokio::test]
    async fn test_cpu_unbounded_uses_host_cores() {
        let source = v2_fixture()
            .with_file("/sys/fs/cgroup/cpu.max", "max 100000\n")
            .with_file("/proc/cpuinfo", CPUINFO_4);
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 4.0);
    }

    #[tokio::test]
    async fn test_cpu_unbounded_without_cpuinfo_fails() {
        let source = v2_fixture().with_file("/sys/fs/cgroup/cpu.max", "max 100000\n");
        let paths = SourcePaths::default();

        assert!(cpu(&ctx(&source, &paths)).await.is_err());
    }

    #[tokio::test]
    async fn test_no_v2_hierarchy() {
        let source = FixtureSource::new()
            .with_file("/sys/fs/cgroup/cpu.max", "200000 100000\n")
            .with_file("/sys/fs/cgroup/cpu.stat", "usage_usec 1\n");
        let paths = SourcePaths::default();

        let err = cpu(&ctx(&source, &paths)).await.unwrap_err();
        assert!(matches!(err, ProbeError::FileUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_memory_with_limit() {
        let source = v2_fixture();
        let paths = SourcePaths::default();

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 1073741824);
        assert_eq!(mem.usage_bytes, 268435456);
        assert_eq!(mem.available_bytes, 1073741824 - 268435456);
        assert_eq!(mem.usage_percent, 25.0);
    }

    #[tokio::test]
    async fn test_memory_unbounded_uses_meminfo() {
        let source = v2_fixture()
            .with_file("/sys/fs/cgroup/memory.max", "max\n")
            .with_file("/proc/meminfo", MEMINFO_16G);
        let paths = SourcePaths::default();

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 16777216 * 1024);
    }

    #[tokio::test]
    async fn test_custom_cgroup_root() {
        let source = FixtureSource::new()
            .with_file("/host/cgroup/cgroup.controllers", "memory\n")
            .with_file("/host/cgroup/memory.max", "1000\n")
            .with_file("/host/cgroup/memory.current", "250\n");
        let paths = SourcePaths {
            cgroup_root: "/host/cgroup".into(),
            ..SourcePaths::default()
        };

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.available_bytes, 750);
    }
}
