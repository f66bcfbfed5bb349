//! Measurement sources
//!
//! Each probe pairs one set of reads or commands with the matching parser
//! and either answers fully or fails with a [`ProbeError`]. Probes never
//! retry and never fall back on their own; ordering is the engine's job.

mod cgroup_v1;
mod cgroup_v2;
pub(crate) mod command;
mod procfs;

use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryMetrics, SourceTier};
use crate::source::{SourcePaths, SystemSource};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Divisor applied to a cumulative CPU-seconds counter to approximate
/// instantaneous core usage without a second sample.
pub const CUMULATIVE_DIVISOR: f64 = 100.0;

/// How cgroup CPU counters are turned into used cores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuSampling {
    /// One read: cumulative CPU seconds / [`CUMULATIVE_DIVISOR`]
    #[default]
    CumulativeApproximation,
    /// Two reads `interval` apart: CPU time delta / wall time delta
    TwoSample { interval: Duration },
}

/// Everything a probe needs for one attempt
pub struct ProbeContext<'a> {
    pub source: &'a dyn SystemSource,
    pub paths: &'a SourcePaths,
    pub sampling: CpuSampling,
}

impl ProbeContext<'_> {
    async fn read_cgroup(&self, relative: &str) -> Result<String, ProbeError> {
        self.source.read_text(&self.paths.cgroup(relative)).await
    }

    async fn read_proc(&self, relative: &str) -> Result<String, ProbeError> {
        self.source.read_text(&self.paths.proc(relative)).await
    }

    /// Fail fast when a hierarchy marker is absent
    async fn require_cgroup(&self, relative: &str) -> Result<(), ProbeError> {
        let path: PathBuf = self.paths.cgroup(relative);
        if self.source.exists(&path).await {
            Ok(())
        } else {
            Err(ProbeError::missing(path))
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        self.source.run_command(program, args).await
    }
}

/// Cumulative CPU-time counters exposed by container accounting
#[derive(Debug, Clone, Copy)]
enum CpuCounter {
    /// `cpu.stat` `usage_usec`, microseconds
    CgroupV2,
    /// `cpuacct.usage`, nanoseconds
    CgroupV1,
}

impl CpuCounter {
    fn units_per_second(self) -> f64 {
        match self {
            CpuCounter::CgroupV2 => 1e6,
            CpuCounter::CgroupV1 => 1e9,
        }
    }

    async fn read(self, ctx: &ProbeContext<'_>) -> Result<u64, ProbeError> {
        match self {
            CpuCounter::CgroupV2 => cgroup_v2::read_usage_usec(ctx).await,
            CpuCounter::CgroupV1 => cgroup_v1::read_usage_ns(ctx).await,
        }
    }
}

/// Used cores from a cumulative counter according to the sampling mode
async fn used_cores(ctx: &ProbeContext<'_>, counter: CpuCounter) -> Result<f64, ProbeError> {
    let units = counter.units_per_second();
    match ctx.sampling {
        CpuSampling::CumulativeApproximation => {
            let total = counter.read(ctx).await?;
            Ok(total as f64 / units / CUMULATIVE_DIVISOR)
        }
        CpuSampling::TwoSample { interval } => {
            let first = counter.read(ctx).await?;
            let started = Instant::now();
            sleep(interval).await;
            let second = counter.read(ctx).await?;
            let elapsed = started.elapsed().as_secs_f64();
            if elapsed <= 0.0 {
                return Err(ProbeError::parse("cpu sample", "zero sampling window"));
            }
            Ok(second.saturating_sub(first) as f64 / units / elapsed)
        }
    }
}

/// CPU measurement sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuProbe {
    CgroupV2,
    CgroupV1,
    /// procps `top`, `nproc`, `uptime`
    Top,
    /// `/proc/stat` since-boot busy ratio
    ProcStat,
    /// Darwin `top`, `sysctl`, `uptime`
    DarwinTop,
}

impl CpuProbe {
    pub fn name(&self) -> &'static str {
        match self {
            CpuProbe::CgroupV2 => "cgroup_v2",
            CpuProbe::CgroupV1 => "cgroup_v1",
            CpuProbe::Top => "top",
            CpuProbe::ProcStat => "proc_stat",
            CpuProbe::DarwinTop => "darwin_top",
        }
    }

    pub fn tier(&self) -> SourceTier {
        match self {
            CpuProbe::CgroupV2 => SourceTier::PrimaryContainer,
            CpuProbe::CgroupV1 => SourceTier::SecondaryContainer,
            CpuProbe::Top | CpuProbe::ProcStat | CpuProbe::DarwinTop => SourceTier::CommandBased,
        }
    }

    pub async fn probe(&self, ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
        match self {
            CpuProbe::CgroupV2 => cgroup_v2::cpu(ctx).await,
            CpuProbe::CgroupV1 => cgroup_v1::cpu(ctx).await,
            CpuProbe::Top => command::linux_cpu(ctx).await,
            CpuProbe::ProcStat => procfs::cpu(ctx).await,
            CpuProbe::DarwinTop => command::darwin_cpu(ctx).await,
        }
    }
}

/// Memory measurement sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProbe {
    CgroupV2,
    CgroupV1,
    /// procps `free -b`
    Free,
    /// `/proc/meminfo`
    ProcMeminfo,
    /// Darwin `vm_stat` and `sysctl hw.pagesize`
    VmStat,
}

impl MemoryProbe {
    pub fn name(&self) -> &'static str {
        match self {
            MemoryProbe::CgroupV2 => "cgroup_v2",
            MemoryProbe::CgroupV1 => "cgroup_v1",
            MemoryProbe::Free => "free",
            MemoryProbe::ProcMeminfo => "proc_meminfo",
            MemoryProbe::VmStat => "vm_stat",
        }
    }

    pub fn tier(&self) -> SourceTier {
        match self {
            MemoryProbe::CgroupV2 => SourceTier::PrimaryContainer,
            MemoryProbe::CgroupV1 => SourceTier::SecondaryContainer,
            MemoryProbe::Free | MemoryProbe::ProcMeminfo | MemoryProbe::VmStat => {
                SourceTier::CommandBased
            }
        }
    }

    pub async fn probe(&self, ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
        match self {
            MemoryProbe::CgroupV2 => cgroup_v2::memory(ctx).await,
            MemoryProbe::CgroupV1 => cgroup_v1::memory(ctx).await,
            MemoryProbe::Free => command::linux_memory(ctx).await,
            MemoryProbe::ProcMeminfo => procfs::memory(ctx).await,
            MemoryProbe::VmStat => command::darwin_memory(ctx).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::source::FixtureSource;

    pub const CPUINFO_4: &str = "processor\t: 0\n\nprocessor\t: 1\n\nprocessor\t: 2\n\nprocessor\t: 3\n";
    pub const MEMINFO_16G: &str =
        "MemTotal:       16777216 kB\nMemFree:         4194304 kB\nBuffers:          1048576 kB\nCached:          2097152 kB\n";

    pub fn ctx<'a>(source: &'a FixtureSource, paths: &'a SourcePaths) -> ProbeContext<'a> {
        ProbeContext {
            source,
            paths,
            sampling: CpuSampling::CumulativeApproximation,
        }
    }
}
