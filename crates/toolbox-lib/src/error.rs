//! Error types for resource resolution
//!
//! Readers and probes report [`ProbeError`]; only the resolution engine
//! turns those into a caller-facing [`ToolboxError`].

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Failure of a single reader, command, or parser.
///
/// At the engine level every variant means the same thing: this source
/// cannot answer, try the next one.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// File is missing or not readable by this process
    #[error("failed to read {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Executable not found, failed to spawn, or exited non-zero
    #[error("command `{command}` unavailable: {detail}")]
    CommandUnavailable { command: String, detail: String },

    /// Output was present but did not match any known format
    #[error("failed to parse {what}: {detail}")]
    ParseFailure { what: &'static str, detail: String },
}

impl ProbeError {
    pub(crate) fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        Self::ParseFailure {
            what,
            detail: detail.into(),
        }
    }

    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::FileUnreadable {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not present"),
            path,
        }
    }
}

/// Which metric a resolution was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cpu => f.write_str("CPU"),
            Metric::Memory => f.write_str("memory"),
        }
    }
}

/// A probe that was attempted and failed, kept for error reporting
#[derive(Debug)]
pub struct ProbeFailure {
    pub probe: &'static str,
    pub error: ProbeError,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.probe, self.error)
    }
}

/// Errors surfaced to callers of the resolution engine
#[derive(Debug, thiserror::Error)]
pub enum ToolboxError {
    /// A specific source was required and it failed
    #[error("source {probe} unavailable: {source}")]
    SourceUnavailable {
        probe: &'static str,
        #[source]
        source: ProbeError,
    },

    /// Every source for a metric was tried and none answered
    #[error("{metric} metrics unavailable: {}", format_attempts(.attempts))]
    MetricUnavailable {
        metric: Metric,
        attempts: Vec<ProbeFailure>,
    },
}

impl ToolboxError {
    /// Short machine-readable kind, used in JSON error bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            ToolboxError::SourceUnavailable { .. } => "source_unavailable",
            ToolboxError::MetricUnavailable { .. } => "metric_unavailable",
        }
    }
}

fn format_attempts(attempts: &[ProbeFailure]) -> String {
    if attempts.is_empty() {
        return "no sources registered".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
