//! HTTP API over the resolution engine, plus health and Prometheus metrics

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use toolbox_lib::{
    check_connectivity, check_health, ComponentStatus, ConnectivityRequest, RawReport,
    ResolutionEngine, Resolved, StructuredLogger, ToolboxError, ToolboxMetrics,
};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: ResolutionEngine,
    pub metrics: ToolboxMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(engine: ResolutionEngine, metrics: ToolboxMetrics, logger: StructuredLogger) -> Self {
        Self {
            engine,
            metrics,
            logger,
        }
    }

    fn fail(&self, error: ToolboxError) -> ApiError {
        self.metrics.inc_resolution_failure(&error);
        self.logger.metric_unavailable(&error);
        ApiError(error)
    }

    fn fail_raw(&self, report: RawReport, error: ToolboxError) -> ApiError {
        self.metrics.inc_raw_report_failure(report.name());
        self.logger.raw_report_unavailable(report.name(), &error);
        ApiError(error)
    }
}

/// A resolution failure rendered as `503` with a JSON body
pub struct ApiError(ToolboxError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// `command` skips container accounting
    pub mode: Option<String>,
}

async fn snapshot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let (operation, result) = match query.mode.as_deref() {
        None | Some("auto") => ("snapshot", state.engine.resolve_snapshot().await),
        Some("command") => (
            "snapshot_command",
            state.engine.resolve_snapshot_command_only().await,
        ),
        Some(other) => {
            let body = json!({
                "error": "invalid_mode",
                "message": format!("unknown mode `{other}`, expected `auto` or `command`"),
            });
            return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
        }
    };
    state
        .metrics
        .observe_resolution_latency(operation, started.elapsed().as_secs_f64());

    let snapshot = result.map_err(|e| state.fail(e))?;
    state.logger.snapshot_resolved(&snapshot);
    Ok(Json(snapshot).into_response())
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuField {
    UsagePercent,
    LimitCores,
    AvailableCores,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryField {
    UsageBytes,
    LimitBytes,
    UsagePercent,
    AvailableBytes,
}

/// One metric value with the provenance of the probe that produced it
#[derive(Debug, Serialize)]
pub struct MetricValue {
    pub metric: &'static str,
    pub value: serde_json::Value,
    pub source: &'static str,
    pub method: &'static str,
    pub fallback: bool,
}

impl MetricValue {
    fn new<T>(metric: &'static str, resolved: &Resolved<T>, value: serde_json::Value) -> Self {
        Self {
            metric,
            value,
            source: resolved.probe,
            method: toolbox_lib::ResolutionMethod::from(resolved.tier).as_str(),
            fallback: resolved.fallback,
        }
    }
}

async fn cpu_metric(
    State(state): State<Arc<AppState>>,
    Path(field): Path<CpuField>,
) -> Result<Json<MetricValue>, ApiError> {
    let started = Instant::now();
    let result = state.engine.resolve_cpu().await;
    state
        .metrics
        .observe_resolution_latency("cpu", started.elapsed().as_secs_f64());
    let resolved = result.map_err(|e| state.fail(e))?;

    let cpu = &resolved.value;
    let (metric, value) = match field {
        CpuField::UsagePercent => ("cpu_usage_percent", json!(cpu.usage_percent)),
        CpuField::LimitCores => ("cpu_limit_cores", json!(cpu.limit_cores)),
        CpuField::AvailableCores => ("available_cpu_cores", json!(cpu.available_cores)),
    };
    Ok(Json(MetricValue::new(metric, &resolved, value)))
}

async fn memory_metric(
    State(state): State<Arc<AppState>>,
    Path(field): Path<MemoryField>,
) -> Result<Json<MetricValue>, ApiError> {
    let started = Instant::now();
    let result = state.engine.resolve_memory().await;
    state
        .metrics
        .observe_resolution_latency("memory", started.elapsed().as_secs_f64());
    let resolved = result.map_err(|e| state.fail(e))?;

    let memory = &resolved.value;
    let (metric, value) = match field {
        MemoryField::UsageBytes => ("memory_usage_bytes", json!(memory.usage_bytes)),
        MemoryField::LimitBytes => ("memory_limit_bytes", json!(memory.limit_bytes)),
        MemoryField::UsagePercent => ("memory_usage_percent", json!(memory.usage_percent)),
        MemoryField::AvailableBytes => ("available_memory_bytes", json!(memory.available_bytes)),
    };
    Ok(Json(MetricValue::new(metric, &resolved, value)))
}

async fn raw(
    State(state): State<Arc<AppState>>,
    Path(report): Path<RawReport>,
) -> Result<Response, ApiError> {
    let output = state
        .engine
        .raw_output(report)
        .await
        .map_err(|e| state.fail_raw(report, e))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityQuery {
    pub domain: String,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub timeout: Option<i64>,
}

/// Always `200`: an unreachable target is a result, not an error
async fn connectivity(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectivityQuery>,
) -> impl IntoResponse {
    let request = ConnectivityRequest::new(
        query.domain,
        query.port.unwrap_or_default(),
        query.timeout.unwrap_or(0),
    );
    let report = check_connectivity(request).await;

    state.metrics.inc_connectivity_check(report.tcp_succeeded());
    state.logger.connectivity_checked(&report);
    Json(report)
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = check_health(&state.engine).await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/snapshot", get(snapshot))
        .route("/api/v1/cpu/:field", get(cpu_metric))
        .route("/api/v1/memory/:field", get(memory_metric))
        .route("/api/v1/raw/:report", get(raw))
        .route("/api/v1/connectivity", get(connectivity))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
