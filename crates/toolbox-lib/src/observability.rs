//! Observability infrastructure for the resource toolbox
//!
//! Provides:
//! - Prometheus metrics (resolution latency, probe failures, fallbacks, connectivity outcomes)
//! - Structured JSON logging with tracing

use crate::error::{Metric, ToolboxError};
use crate::models::{ConnectivityReport, ResourceSnapshot};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for resolution latency (in seconds).
/// Command probes spawn processes, so the range reaches further than
/// file reads alone would need.
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once). `None` if registration failed.
static GLOBAL_METRICS: OnceLock<Option<ToolboxMetricsInner>> = OnceLock::new();

struct ToolboxMetricsInner {
    resolution_latency_seconds: HistogramVec,
    probe_failures: IntCounterVec,
    fallbacks: IntCounterVec,
    resolution_failures: IntCounterVec,
    raw_report_failures: IntCounterVec,
    connectivity_checks: IntCounterVec,
}

impl ToolboxMetricsInner {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            resolution_latency_seconds: register_histogram_vec!(
                "toolbox_resolution_latency_seconds",
                "Time spent resolving a snapshot or single metric",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )?,

            probe_failures: register_int_counter_vec!(
                "toolbox_probe_failures_total",
                "Probe attempts that failed and moved resolution to the next source",
                &["metric", "probe"]
            )?,

            fallbacks: register_int_counter_vec!(
                "toolbox_fallbacks_total",
                "Metrics answered by a source other than the first in the table",
                &["metric", "probe"]
            )?,

            resolution_failures: register_int_counter_vec!(
                "toolbox_resolution_failures_total",
                "Resolutions that returned an error",
                &["kind"]
            )?,

            raw_report_failures: register_int_counter_vec!(
                "toolbox_raw_report_failures_total",
                "Raw system reports whose utility could not be run",
                &["report"]
            )?,

            connectivity_checks: register_int_counter_vec!(
                "toolbox_connectivity_checks_total",
                "Connectivity checks by TCP outcome",
                &["tcp"]
            )?,
        })
    }
}

/// Toolbox metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ToolboxMetrics {
    _private: (),
}

impl Default for ToolboxMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolboxMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolboxMetrics")
            .field("registered", &self.inner().is_some())
            .finish()
    }
}

impl ToolboxMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match ToolboxMetricsInner::new() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register Prometheus metrics, metrics disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&ToolboxMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    /// Record how long an operation (`snapshot`, `cpu`, `memory`, ...) took
    pub fn observe_resolution_latency(&self, operation: &str, duration_secs: f64) {
        if let Some(inner) = self.inner() {
            inner
                .resolution_latency_seconds
                .with_label_values(&[operation])
                .observe(duration_secs);
        }
    }

    pub fn inc_probe_failure(&self, metric: Metric, probe: &str) {
        if let Some(inner) = self.inner() {
            inner
                .probe_failures
                .with_label_values(&[metric.as_str(), probe])
                .inc();
        }
    }

    pub fn inc_fallback(&self, metric: Metric, probe: &str) {
        if let Some(inner) = self.inner() {
            inner
                .fallbacks
                .with_label_values(&[metric.as_str(), probe])
                .inc();
        }
    }

    pub fn inc_resolution_failure(&self, error: &ToolboxError) {
        if let Some(inner) = self.inner() {
            inner
                .resolution_failures
                .with_label_values(&[error.kind()])
                .inc();
        }
    }

    pub fn inc_raw_report_failure(&self, report: &str) {
        if let Some(inner) = self.inner() {
            inner.raw_report_failures.with_label_values(&[report]).inc();
        }
    }

    pub fn inc_connectivity_check(&self, tcp_succeeded: bool) {
        if let Some(inner) = self.inner() {
            let outcome = if tcp_succeeded { "success" } else { "failure" };
            inner.connectivity_checks.with_label_values(&[outcome]).inc();
        }
    }
}

/// Structured logger for toolbox events
///
/// Provides consistent JSON-formatted logging for resolutions,
/// connectivity checks, and process lifecycle.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Log a successful snapshot resolution
    pub fn snapshot_resolved(&self, snapshot: &ResourceSnapshot) {
        info!(
            event = "snapshot_resolved",
            host = %self.host,
            method = snapshot.method.as_str(),
            fallback = snapshot.used_fallback,
            cpu_source = %snapshot.cpu_source,
            memory_source = %snapshot.memory_source,
            cpu_usage_percent = snapshot.cpu.usage_percent,
            memory_usage_percent = snapshot.memory.usage_percent,
            "Resolved resource snapshot"
        );
    }

    /// Log a failed resolution
    pub fn metric_unavailable(&self, error: &ToolboxError) {
        warn!(
            event = "metric_unavailable",
            host = %self.host,
            kind = error.kind(),
            error = %error,
            "Resource resolution failed"
        );
    }

    /// Log a raw report whose utility failed
    pub fn raw_report_unavailable(&self, report: &str, error: &ToolboxError) {
        warn!(
            event = "raw_report_unavailable",
            host = %self.host,
            report = %report,
            error = %error,
            "Raw system report failed"
        );
    }

    /// Log a connectivity check result
    pub fn connectivity_checked(&self, report: &ConnectivityReport) {
        info!(
            event = "connectivity_checked",
            host = %self.host,
            domain = %report.domain,
            port = %report.port,
            tcp = %report.tcp,
            http = %report.http,
            "Connectivity check completed"
        );
    }

    pub fn log_startup(&self, version: &str, os_family: &str) {
        info!(
            event = "toolbox_started",
            host = %self.host,
            version = %version,
            os_family = %os_family,
            "Resource toolbox agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "toolbox_shutdown",
            host = %self.host,
            reason = %reason,
            "Resource toolbox agent shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolbox_metrics_creation() {
        // Global registry: a second handle must reuse the first registration
        let metrics = ToolboxMetrics::new();
        let again = ToolboxMetrics::new();

        metrics.observe_resolution_latency("snapshot", 0.002);
        metrics.inc_probe_failure(Metric::Cpu, "cgroup_v2");
        again.inc_fallback(Metric::Memory, "free");
        metrics.inc_connectivity_check(true);
        metrics.inc_raw_report_failure("processes");
        assert!(metrics.inner().is_some());
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.host, "test-host");
    }
}
