//! Core data models for resource snapshots

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which tier of sources answered a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    /// cgroup v2 unified hierarchy
    #[serde(rename = "cgroup_v2")]
    PrimaryContainer,
    /// cgroup v1 legacy hierarchy
    #[serde(rename = "cgroup_v1")]
    SecondaryContainer,
    /// OS utilities or raw kernel interfaces
    #[serde(rename = "command")]
    CommandBased,
    /// CPU and memory were answered by different tiers
    #[serde(rename = "mixed")]
    Mixed,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::PrimaryContainer => "cgroup_v2",
            ResolutionMethod::SecondaryContainer => "cgroup_v1",
            ResolutionMethod::CommandBased => "command",
            ResolutionMethod::Mixed => "mixed",
        }
    }
}

/// Tier of a single probe. Unlike [`ResolutionMethod`] it cannot be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    PrimaryContainer,
    SecondaryContainer,
    CommandBased,
}

impl From<SourceTier> for ResolutionMethod {
    fn from(tier: SourceTier) -> Self {
        match tier {
            SourceTier::PrimaryContainer => ResolutionMethod::PrimaryContainer,
            SourceTier::SecondaryContainer => ResolutionMethod::SecondaryContainer,
            SourceTier::CommandBased => ResolutionMethod::CommandBased,
        }
    }
}

/// CPU usage and limit, in cores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    pub limit_cores: f64,
    pub used_cores: f64,
    pub available_cores: f64,
    /// Raw `1m, 5m, 15m` load average as printed by the OS, `""` on the wire when unknown
    #[serde(default, with = "empty_as_none")]
    pub load_average: Option<String>,
}

mod empty_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|text| !text.is_empty()))
    }
}

/// Memory usage and limit, in bytes with MiB mirrors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub usage_bytes: u64,
    pub limit_bytes: u64,
    pub available_bytes: u64,
    pub usage_percent: f64,
    pub usage_mb: f64,
    pub limit_mb: f64,
    pub available_mb: f64,
    pub free_bytes: u64,
    pub buffer_bytes: u64,
    pub cached_bytes: u64,
}

/// Memory figures from a source that distinguishes free, buffers and cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryBreakdown {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
}

/// Point-in-time resource snapshot with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub method: ResolutionMethod,
    #[serde(rename = "fallback")]
    pub used_fallback: bool,
    /// Name of the probe that answered for CPU
    pub cpu_source: String,
    /// Name of the probe that answered for memory
    pub memory_source: String,
    pub captured_at: i64,
}

/// Result of a two-stage TCP then HTTP reachability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub domain: String,
    pub port: String,
    pub timeout_seconds: u64,
    /// `"success"` or the dial error
    pub tcp: String,
    /// Status line, request error, or [`HTTP_SKIPPED`](crate::connectivity::HTTP_SKIPPED)
    pub http: String,
}

impl ConnectivityReport {
    pub fn tcp_succeeded(&self) -> bool {
        self.tcp == crate::connectivity::TCP_SUCCESS
    }
}
