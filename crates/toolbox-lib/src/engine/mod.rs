//! Resolution engine
//!
//! Resolves CPU and memory independently by walking the OS family's
//! ordered probe table until one probe answers, then combines the two
//! answers into a [`ResourceSnapshot`] with provenance.

use crate::error::{Metric, ProbeError, ProbeFailure, ToolboxError};
use crate::models::{CpuMetrics, MemoryMetrics, ResolutionMethod, ResourceSnapshot, SourceTier};
use crate::observability::ToolboxMetrics;
use crate::probe::{
    command::{self as commands, Invocation},
    CpuProbe, CpuSampling, MemoryProbe, ProbeContext,
};
use crate::source::{HostSource, SourcePaths, SystemSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};


/// Operating system family, decided once and passed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// cgroup accounting, procps utilities, `/proc`
    Linux,
    /// No container accounting, BSD utilities
    #[serde(alias = "macos")]
    Darwin,
}

const LINUX_CPU_PROBES: &[CpuProbe] = &[
    CpuProbe::CgroupV2,
    CpuProbe::CgroupV1,
    CpuProbe::Top,
    CpuProbe::ProcStat,
];
const LINUX_MEMORY_PROBES: &[MemoryProbe] = &[
    MemoryProbe::CgroupV2,
    MemoryProbe::CgroupV1,
    MemoryProbe::Free,
    MemoryProbe::ProcMeminfo,
];
const DARWIN_CPU_PROBES: &[CpuProbe] = &[CpuProbe::DarwinTop];
const DARWIN_MEMORY_PROBES: &[MemoryProbe] = &[MemoryProbe::VmStat];

impl OsFamily {
    /// Family of the compile target. Anything that is not macOS is treated as Linux.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            OsFamily::Darwin
        } else {
            OsFamily::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Darwin => "darwin",
        }
    }

    /// CPU probes in preference order
    pub fn cpu_probes(&self) -> &'static [CpuProbe] {
        match self {
            OsFamily::Linux => LINUX_CPU_PROBES,
            OsFamily::Darwin => DARWIN_CPU_PROBES,
        }
    }

    /// Memory probes in preference order
    pub fn memory_probes(&self) -> &'static [MemoryProbe] {
        match self {
            OsFamily::Linux => LINUX_MEMORY_PROBES,
            OsFamily::Darwin => DARWIN_MEMORY_PROBES,
        }
    }

    /// The single probe used when container accounting is bypassed
    pub fn command_cpu_probe(&self) -> CpuProbe {
        match self {
            OsFamily::Linux => CpuProbe::Top,
            OsFamily::Darwin => CpuProbe::DarwinTop,
        }
    }

    pub fn command_memory_probe(&self) -> MemoryProbe {
        match self {
            OsFamily::Linux => MemoryProbe::Free,
            OsFamily::Darwin => MemoryProbe::VmStat,
        }
    }

    fn raw_invocation(&self, report: RawReport) -> Invocation {
        match (self, report) {
            (OsFamily::Linux, RawReport::Load) => commands::LINUX_TOP,
            (OsFamily::Linux, RawReport::Memory) => commands::LINUX_FREE,
            (OsFamily::Darwin, RawReport::Load) => commands::DARWIN_TOP,
            (OsFamily::Darwin, RawReport::Memory) => commands::DARWIN_VM_STAT,
            (_, RawReport::Processes) => commands::PS,
            (_, RawReport::Uptime) => commands::UPTIME,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown OS family `{0}`, expected `linux` or `darwin`")]
pub struct UnknownOsFamily(pub String);

impl FromStr for OsFamily {
    type Err = UnknownOsFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "darwin" | "macos" => Ok(OsFamily::Darwin),
            _ => Err(UnknownOsFamily(s.to_string())),
        }
    }
}

/// Unprocessed system reports available for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawReport {
    /// `top` one-shot report
    Load,
    /// `free -b` or `vm_stat`
    Memory,
    /// `ps aux`
    Processes,
    /// `uptime`
    Uptime,
}

impl RawReport {
    pub const ALL: [RawReport; 4] = [
        RawReport::Load,
        RawReport::Memory,
        RawReport::Processes,
        RawReport::Uptime,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RawReport::Load => "load",
            RawReport::Memory => "memory",
            RawReport::Processes => "processes",
            RawReport::Uptime => "uptime",
        }
    }
}

/// Engine settings that are not tied to the OS family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub paths: SourcePaths,
    pub cpu_sampling: CpuSampling,
}

/// A metric value together with the probe that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub probe: &'static str,
    pub tier: SourceTier,
    /// The answering probe was not first in the family's table
    pub fallback: bool,
}

/// Run `attempt` on each probe in order and return the first success with
/// its index. If every probe fails, the errors are returned in probe order.
pub async fn try_in_order<'p, P, T, F, Fut>(
    probes: &'p [P],
    mut attempt: F,
) -> Result<(usize, T), Vec<ProbeError>>
where
    F: FnMut(&'p P) -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    let mut failures = Vec::with_capacity(probes.len());
    for (index, probe) in probes.iter().enumerate() {
        match attempt(probe).await {
            Ok(value) => return Ok((index, value)),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}

/// Snapshot-level method from the two per-metric tiers
pub fn combine_method(cpu: SourceTier, memory: SourceTier) -> ResolutionMethod {
    if cpu == memory {
        cpu.into()
    } else {
        ResolutionMethod::Mixed
    }
}

/// Resolves resource metrics for one OS family over a [`SystemSource`].
///
/// Holds no state between calls and can be shared across tasks.
#[derive(Clone)]
pub struct ResolutionEngine {
    source: Arc<dyn SystemSource>,
    family: OsFamily,
    config: EngineConfig,
    metrics: ToolboxMetrics,
}

impl fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("family", &self.family)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResolutionEngine {
    pub fn new(source: Arc<dyn SystemSource>, family: OsFamily, config: EngineConfig) -> Self {
        Self {
            source,
            family,
            config,
            metrics: ToolboxMetrics::new(),
        }
    }

    /// Engine over the real host with default paths and the compile-target family
    pub fn host() -> Self {
        Self::new(Arc::new(HostSource), OsFamily::current(), EngineConfig::default())
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(&self) -> ProbeContext<'_> {
        ProbeContext {
            source: self.source.as_ref(),
            paths: &self.config.paths,
            sampling: self.config.cpu_sampling,
        }
    }

    /// Walk the family's CPU table
    pub async fn resolve_cpu(&self) -> Result<Resolved<CpuMetrics>, ToolboxError> {
        let ctx = &self.context();
        let probes = self.family.cpu_probes();
        let outcome = try_in_order(probes, move |probe| async move {
            let result = probe.probe(ctx).await;
            if let Err(e) = &result {
                self.record_probe_failure(Metric::Cpu, probe.name(), e);
            }
            result
        })
        .await;

        match outcome {
            Ok((index, value)) => {
                let probe = probes[index];
                Ok(self.resolved(Metric::Cpu, value, probe.name(), probe.tier(), index))
            }
            Err(errors) => Err(unavailable(
                Metric::Cpu,
                probes.iter().map(CpuProbe::name),
                errors,
            )),
        }
    }

    /// Walk the family's memory table
    pub async fn resolve_memory(&self) -> Result<Resolved<MemoryMetrics>, ToolboxError> {
        let ctx = &self.context();
        let probes = self.family.memory_probes();
        let outcome = try_in_order(probes, move |probe| async move {
            let result = probe.probe(ctx).await;
            if let Err(e) = &result {
                self.record_probe_failure(Metric::Memory, probe.name(), e);
            }
            result
        })
        .await;

        match outcome {
            Ok((index, value)) => {
                let probe = probes[index];
                Ok(self.resolved(Metric::Memory, value, probe.name(), probe.tier(), index))
            }
            Err(errors) => Err(unavailable(
                Metric::Memory,
                probes.iter().map(MemoryProbe::name),
                errors,
            )),
        }
    }

    /// Full snapshot through both fallback chains.
    ///
    /// Fails if either metric cannot be resolved; CPU is reported first
    /// when both fail.
    pub async fn resolve_snapshot(&self) -> Result<ResourceSnapshot, ToolboxError> {
        let (cpu, memory) = tokio::join!(self.resolve_cpu(), self.resolve_memory());
        let (cpu, memory) = (cpu?, memory?);

        let snapshot = ResourceSnapshot {
            method: combine_method(cpu.tier, memory.tier),
            used_fallback: cpu.fallback || memory.fallback,
            cpu_source: cpu.probe.to_string(),
            memory_source: memory.probe.to_string(),
            cpu: cpu.value,
            memory: memory.value,
            captured_at: chrono::Utc::now().timestamp(),
        };
        debug!(
            method = snapshot.method.as_str(),
            fallback = snapshot.used_fallback,
            "Resolved snapshot"
        );
        Ok(snapshot)
    }

    /// Snapshot from the family's command probes only, with no fallback
    pub async fn resolve_snapshot_command_only(&self) -> Result<ResourceSnapshot, ToolboxError> {
        let ctx = self.context();
        let cpu_probe = self.family.command_cpu_probe();
        let memory_probe = self.family.command_memory_probe();

        let (cpu, memory) = tokio::join!(cpu_probe.probe(&ctx), memory_probe.probe(&ctx));
        let cpu = cpu.map_err(|source| {
            self.record_probe_failure(Metric::Cpu, cpu_probe.name(), &source);
            ToolboxError::SourceUnavailable {
                probe: cpu_probe.name(),
                source,
            }
        })?;
        let memory = memory.map_err(|source| {
            self.record_probe_failure(Metric::Memory, memory_probe.name(), &source);
            ToolboxError::SourceUnavailable {
                probe: memory_probe.name(),
                source,
            }
        })?;

        Ok(ResourceSnapshot {
            cpu,
            memory,
            method: ResolutionMethod::CommandBased,
            used_fallback: false,
            cpu_source: cpu_probe.name().to_string(),
            memory_source: memory_probe.name().to_string(),
            captured_at: chrono::Utc::now().timestamp(),
        })
    }

    pub async fn cpu_usage_percent(&self) -> Result<f64, ToolboxError> {
        Ok(self.resolve_cpu().await?.value.usage_percent)
    }

    pub async fn cpu_limit_cores(&self) -> Result<f64, ToolboxError> {
        Ok(self.resolve_cpu().await?.value.limit_cores)
    }

    pub async fn available_cpu_cores(&self) -> Result<f64, ToolboxError> {
        Ok(self.resolve_cpu().await?.value.available_cores)
    }

    pub async fn memory_usage_bytes(&self) -> Result<u64, ToolboxError> {
        Ok(self.resolve_memory().await?.value.usage_bytes)
    }

    pub async fn memory_limit_bytes(&self) -> Result<u64, ToolboxError> {
        Ok(self.resolve_memory().await?.value.limit_bytes)
    }

    pub async fn memory_usage_percent(&self) -> Result<f64, ToolboxError> {
        Ok(self.resolve_memory().await?.value.usage_percent)
    }

    pub async fn available_memory_bytes(&self) -> Result<u64, ToolboxError> {
        Ok(self.resolve_memory().await?.value.available_bytes)
    }

    /// Unprocessed output of the family's utility for `report`
    pub async fn raw_output(&self, report: RawReport) -> Result<String, ToolboxError> {
        let (program, args) = self.family.raw_invocation(report);
        self.source
            .run_command(program, args)
            .await
            .map_err(|source| ToolboxError::SourceUnavailable {
                probe: report.name(),
                source,
            })
    }

    fn resolved<T>(
        &self,
        metric: Metric,
        value: T,
        probe: &'static str,
        tier: SourceTier,
        index: usize,
    ) -> Resolved<T> {
        let fallback = index > 0;
        if fallback {
            self.metrics.inc_fallback(metric, probe);
            info!(metric = metric.as_str(), probe, "Resolved via fallback source");
        }
        Resolved {
            value,
            probe,
            tier,
            fallback,
        }
    }

    fn record_probe_failure(&self, metric: Metric, probe: &'static str, error: &ProbeError) {
        self.metrics.inc_probe_failure(metric, probe);
        debug!(metric = metric.as_str(), probe, error = %error, "Probe failed");
    }
}

fn unavailable(
    metric: Metric,
    names: impl Iterator<Item = &'static str>,
    errors: Vec<ProbeError>,
) -> ToolboxError {
    ToolboxError::MetricUnavailable {
        metric,
        attempts: names
            .zip(errors)
            .map(|(probe, error)| ProbeFailure { probe, error })
            .collect(),
    }
}
