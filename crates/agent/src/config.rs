//! Agent configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use toolbox_lib::{CpuSampling, EngineConfig, OsFamily, SourcePaths};

/// Agent configuration, read from `TOOLBOX_*` environment variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Name reported in structured logs
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Root of the cgroup mount
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Root of procfs
    #[serde(default = "default_proc_root")]
    pub proc_root: String,

    /// `linux` or `darwin`; the compile target when unset
    #[serde(default)]
    pub os_family: Option<String>,

    /// `cumulative` or `two_sample`
    #[serde(default = "default_cpu_sampling")]
    pub cpu_sampling: String,

    /// Window between the two counter reads in `two_sample` mode
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cgroup_root() -> String {
    "/sys/fs/cgroup".to_string()
}

fn default_proc_root() -> String {
    "/proc".to_string()
}

fn default_cpu_sampling() -> String {
    "cumulative".to_string()
}

fn default_sample_interval_ms() -> u64 {
    1000
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("TOOLBOX").try_parsing(true));
        Self::from_builder(builder)
    }

    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid TOOLBOX_* configuration")
    }

    pub fn os_family(&self) -> Result<OsFamily> {
        match self.os_family.as_deref() {
            Some(name) => Ok(name.parse()?),
            None => Ok(OsFamily::current()),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        let cpu_sampling = match self.cpu_sampling.trim().to_ascii_lowercase().as_str() {
            "cumulative" => CpuSampling::CumulativeApproximation,
            "two_sample" | "two-sample" => {
                if self.sample_interval_ms == 0 {
                    bail!("TOOLBOX_SAMPLE_INTERVAL_MS must be positive for two_sample");
                }
                CpuSampling::TwoSample {
                    interval: Duration::from_millis(self.sample_interval_ms),
                }
            }
            other => bail!("unknown CPU sampling mode `{other}`, expected cumulative or two_sample"),
        };

        Ok(EngineConfig {
            paths: SourcePaths {
                cgroup_root: PathBuf::from(&self.cgroup_root),
                proc_root: PathBuf::from(&self.proc_root),
            },
            cpu_sampling,
        })
    }
}
