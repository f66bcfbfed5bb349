//! Probes built on OS reporting utilities

use super::{procfs, ProbeContext};
use crate::error::ProbeError;
use crate::models::{CpuMetrics, MemoryMetrics};
use crate::normalize;
use crate::parsers::command as parse;
use tracing::debug;

/// A program and its arguments
pub(crate) type Invocation = (&'static str, &'static [&'static str]);

pub(crate) const LINUX_TOP: Invocation = ("top", &["-b", "-n", "1"]);
pub(crate) const LINUX_FREE: Invocation = ("free", &["-b"]);
pub(crate) const DARWIN_TOP: Invocation = ("top", &["-l", "1"]);
pub(crate) const DARWIN_VM_STAT: Invocation = ("vm_stat", &[]);
pub(crate) const PS: Invocation = ("ps", &["aux"]);
pub(crate) const UPTIME: Invocation = ("uptime", &[]);

const NPROC: Invocation = ("nproc", &[]);
const SYSCTL_NCPU: Invocation = ("sysctl", &["-n", "hw.ncpu"]);
const SYSCTL_PAGESIZE: Invocation = ("sysctl", &["-n", "hw.pagesize"]);

async fn run(ctx: &ProbeContext<'_>, (program, args): Invocation) -> Result<String, ProbeError> {
    ctx.run(program, args).await
}

/// Load average is decoration; a missing `uptime` never fails a probe.
async fn load_average(ctx: &ProbeContext<'_>) -> Option<String> {
    match run(ctx, UPTIME).await {
        Ok(output) => parse::parse_load_average(&output),
        Err(e) => {
            debug!(error = %e, "uptime unavailable, omitting load average");
            None
        }
    }
}

pub(super) async fn linux_cpu(ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
    let cores = match run(ctx, NPROC).await {
        Ok(output) => parse::parse_core_count(&output)?,
        Err(e) => {
            debug!(error = %e, "nproc unavailable, counting /proc/cpuinfo");
            procfs::host_cores(ctx).await?
        }
    };
    let usage = parse::parse_top_cpu_usage(&run(ctx, LINUX_TOP).await?)?;

    normalize::cpu_from_usage_percent(usage, cores, load_average(ctx).await)
}

pub(super) async fn darwin_cpu(ctx: &ProbeContext<'_>) -> Result<CpuMetrics, ProbeError> {
    let cores = parse::parse_core_count(&run(ctx, SYSCTL_NCPU).await?)?;
    let usage = parse::parse_top_cpu_usage(&run(ctx, DARWIN_TOP).await?)?;

    normalize::cpu_from_usage_percent(usage, cores, load_average(ctx).await)
}

pub(super) async fn linux_memory(ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
    let breakdown = parse::parse_free_output(&run(ctx, LINUX_FREE).await?)?;
    normalize::memory_from_breakdown(breakdown)
}

pub(super) async fn darwin_memory(ctx: &ProbeContext<'_>) -> Result<MemoryMetrics, ProbeError> {
    let page_size = parse::page_size_or_default(run(ctx, SYSCTL_PAGESIZE).await);
    let breakdown = parse::parse_vm_stat(&run(ctx, DARWIN_VM_STAT).await?, page_size)?;
    normalize::memory_from_breakdown(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::test_support::{ctx, CPUINFO_4};
    use crate::source::{FixtureSource, SourcePaths};

    const TOP_OUTPUT: &str = "top - 10:30:00 up 2 days, 20:45,  1 user,  load average: 0.52, 0.58, 0.59
%Cpu(s): 20.0 us,  5.0 sy,  0.0 ni, 75.0 id,  0.0 wa,  0.0 hi,  0.0 si,  0.0 st\n";
    const UPTIME_OUTPUT: &str = " 10:30:00 up 2 days, 20:45,  1 user,  load average: 0.52, 0.58, 0.59\n";

    #[tokio::test]
    async fn test_linux_cpu() {
        let source = FixtureSource::new()
            .with_command("nproc", "4\n")
            .with_command("top -b -n 1", TOP_OUTPUT)
            .with_command("uptime", UPTIME_OUTPUT);
        let paths = SourcePaths::default();

        let cpu = linux_cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 4.0);
        assert!((cpu.usage_percent - 25.0).abs() < 1e-9);
        assert!((cpu.used_cores - 1.0).abs() < 1e-9);
        assert!((cpu.available_cores - 3.0).abs() < 1e-9);
        assert_eq!(cpu.load_average.as_deref(), Some("0.52, 0.58, 0.59"));
    }

    #[tokio::test]
    async fn test_linux_cpu_without_nproc_or_uptime() {
        let source = FixtureSource::new()
            .with_command("top -b -n 1", TOP_OUTPUT)
            .with_file("/proc/cpuinfo", CPUINFO_4);
        let paths = SourcePaths::default();

        let cpu = linux_cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 4.0);
        assert_eq!(cpu.load_average, None);
    }

    #[tokio::test]
    async fn test_linux_cpu_unparseable_top() {
        let source = FixtureSource::new()
            .with_command("nproc", "4\n")
            .with_command("top -b -n 1", "invalid output");
        let paths = SourcePaths::default();

        let err = linux_cpu(&ctx(&source, &paths)).await.unwrap_err();
        assert!(matches!(err, ProbeError::ParseFailure { .. }));
    }

    #[tokio::test]
    async fn test_darwin_cpu() {
        let source = FixtureSource::new()
            .with_command("sysctl -n hw.ncpu", "8\n")
            .with_command(
                "top -l 1",
                "Processes: 512 total\nCPU usage: 10.0% user, 10.0% sys, 80.0% idle\n",
            )
            .with_command("uptime", "10:30  up 3 days, load averages: 1.93 2.10 2.25\n");
        let paths = SourcePaths::default();

        let cpu = darwin_cpu(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(cpu.limit_cores, 8.0);
        assert!((cpu.usage_percent - 20.0).abs() < 1e-9);
        assert!((cpu.used_cores - 1.6).abs() < 1e-9);
        assert_eq!(cpu.load_average.as_deref(), Some("1.93 2.10 2.25"));
    }

    #[tokio::test]
    async fn test_linux_memory() {
        let source = FixtureSource::new().with_command(
            "free -b",
            "              total        used        free      shared  buff/cache   available
Mem:       16777216     8388608     4194304          0     4194304     8388608
Swap:      16777216            0    16777216\n",
        );
        let paths = SourcePaths::default();

        let mem = linux_memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 16777216);
        assert_eq!(mem.usage_bytes, 8388608);
        assert_eq!(mem.free_bytes, 4194304);
        assert_eq!(mem.buffer_bytes, 4194304);
        assert_eq!(mem.cached_bytes, 0);
        assert_eq!(mem.available_bytes, 8388608);
        assert_eq!(mem.usage_percent, 50.0);
    }

    #[tokio::test]
    async fn test_darwin_memory_default_page_size() {
        let source = FixtureSource::new().with_command(
            "vm_stat",
            "Pages free: 1000.\nPages active: 2000.\nPages speculative: 1000.\n",
        );
        let paths = SourcePaths::default();

        let mem = darwin_memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 4000 * 4096);
        assert_eq!(mem.free_bytes, 2000 * 4096);
        assert_eq!(mem.usage_bytes, 2000 * 4096);
        assert_eq!(mem.available_bytes, mem.free_bytes);
    }

    #[tokio::test]
    async fn test_darwin_memory_page_size_from_sysctl() {
        let source = FixtureSource::new()
            .with_command("sysctl -n hw.pagesize", "16384\n")
            .with_command("vm_stat", "Pages free: 10.\nPages active: 30.\n");
        let paths = SourcePaths::default();

        let mem = darwin_memory(&ctx(&source, &paths)).await.unwrap();
        assert_eq!(mem.limit_bytes, 40 * 16384);
    }
}
