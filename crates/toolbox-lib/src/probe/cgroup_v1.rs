//! cgroup v1 probes (legacy hierarchy)
//!
//! Reads separate controller directories:
//! - cpu,cpuacct for the CFS quota and period
//! - cpuacct for cumulative CPU usage
//! - memory for memory usage and limit

use super::{procfs, used_cores, CpuCounter, ProbeContext};
use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryMetrics};
use crate::normalize;
use crate::parsers::cgroup::{self, CpuQuota, MemoryLimit};

const CPU_CONTROLLER: &str = "cpu,cpuacct";
const MEMORY_CONTROLLER: &str = "memory";

pub(super) async fn cpu(ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
    ctx.require_cgroup(CPU_CONTROLLER).await?;

    let quota = ctx.read_cgroup("cpu,cpuacct/cpu.cfs_quota_us").await?;
    let period = ctx.read_cgroup("cpu,cpuacct/cpu.cfs_period_us").await?;
    let limit = match cgroup::parse_cfs_quota(&quota, &period)? {
        CpuQuota::Cores(cores) => cores,
        CpuQuota::Unbounded => procfs::host_cores(ctx).await?,
    };
    let used = used_cores(ctx, CpuCounter::CgroupV1).await?;

    normalize::cpu_from_used_cores(used, limit, None)
}

pub(super) async fn read_usage_ns(ctx: &ProbeContext<'_>) -> Result<u64, ProbeError> {
    cgroup::parse_counter(
        &ctx.read_cgroup("cpuacct/cpuacct.usage").await?,
        "cpuacct.usage",
    )
}

pub(super) async fn memory(ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
    ctx.require_cgroup(MEMORY_CONTROLLER).await?;

    let limit = cgroup::parse_memory_limit_in_bytes(
        &ctx.read_cgroup("memory/memory.limit_in_bytes").await?,
    )?;
    let limit = match limit {
        MemoryLimit::Bytes(bytes) => bytes,
        MemoryLimit::Unbounded => procfs::host_memory(ctx).await?,
    };
    let usage = cgroup::parse_counter(
        &ctx.read_cgroup("memory/memory.usage_in_bytes").await?,
        "memory.usage_in_bytes",
    )?;

    normalize::memory_from_usage_limit(usage, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::test_support::{ctx, CPUINFO_4, MEMINFO_16G};
    use crate::source::{FixtureSource, SourcePaths};

    fn v1_fixture() -> FixtureSource {
        FixtureSource::new()
            .with_file("/sys/fs/cgroup/cpu,cpuacct/cpu.cfs_quota_us", "150000\n")
            .with_file("/sys/fs/cgroup/cpu,cpuacct/cpu.cfs_period_us", "100000\n")
            .with_file("/sys/fs/cgroup/cpuacct/cpuacct.usage", "30000000000\n")
            .with_file("/sys/fs/cgroup/memory/memory.limit_in_bytes", "536870912\n")
            .with_file("/sys/fs/cgroup/memory/memory.usage_in_bytes", "104857600\n")
    }

    #[tokio::test]
    async fn test_cpu_with_quota() {
        let source = v1_fixture();
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 1.5);
        // 30 CPU-seconds / divisor 100
        assert!((cpu.used_cores - 0.3).abs() < 1e-9);
        assert!((cpu.usage_percent - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cpu_unbounded_quota() {
        let source = v1_fixture()
            .with_file("/sys/fs/cgroup/cpu,cpuacct/cpu.cfs_quota_us", "-1\n")
            .with_file("/proc/cpuinfo", CPUINFO_4);
        let paths = SourcePaths::default();

        let cpu = cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 4.0);
    }

    #[tokio::test]
    async fn test_cpu_missing_usage_counter() {
        let source = FixtureSource::new()
            .with_file("/sys/fs/cgroup/cpu,cpuacct/cpu.cfs_quota_us", "150000\n")
            .with_file("/sys/fs/cgroup/cpu,cpuacct/cpu.cfs_period_us", "100000\n");
        let paths = SourcePaths::default();

        assert!(cpu(&ctx(&source, &paths)).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_with_limit() {
        let source = v1_fixture();
        let paths = SourcePaths::default();

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 536870912);
        assert_eq!(mem.usage_bytes, 104857600);
        assert_eq!(mem.available_bytes, 536870912 - 104857600);
    }

    #[tokio::test]
    async fn test_memory_unlimited_uses_meminfo() {
        let source = v1_fixture()
            .with_file(
                "/sys/fs/cgroup/memory/memory.limit_in_bytes",
                "9223372036854771712\n",
            )
            .with_file("/proc/meminfo", MEMINFO_16G);
        let paths = SourcePaths::default();

        let mem = memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 16777216 * 1024);
        assert_eq!(mem.usage_bytes, 104857600);
    }

    #[tokio::test]
    async fn test_no_v1_hierarchy() {
        let source = FixtureSource::new();
        let paths = SourcePaths::default();

        assert!(memory(&ctx(&source, &paths)).await.is_err());
        assert!(cpu(&ctx(&source, &paths)).await.is_err());
    }
}
