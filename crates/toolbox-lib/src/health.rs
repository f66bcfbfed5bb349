//! Health reporting for the resource toolbox
//!
//! Health is derived on request from a fresh resolution of each metric:
//! a primary answer is healthy, a fallback answer is degraded, and an
//! unresolvable metric is unhealthy.

use crate::engine::{Resolved, ResolutionEngine};
use crate::error::ToolboxError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Answered by the first source in the table
    Healthy,
    /// Answered, but by a fallback source
    Degraded,
    /// No source could answer
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about one metric's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// Probe that answered, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    /// Health of a single resolution outcome
    pub fn from_resolution<T>(outcome: &Result<Resolved<T>, ToolboxError>) -> Self {
        let (status, source, message) = match outcome {
            Ok(resolved) if !resolved.fallback => {
                (ComponentStatus::Healthy, Some(resolved.probe), None)
            }
            Ok(resolved) => (
                ComponentStatus::Degraded,
                Some(resolved.probe),
                Some(format!("resolved via fallback source {}", resolved.probe)),
            ),
            Err(e) => (ComponentStatus::Unhealthy, None, Some(e.to_string())),
        };

        Self {
            status,
            source: source.map(str::to_string),
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub os_family: String,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Compute overall status from component statuses
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Component names in [`HealthResponse::components`]
pub mod components {
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
}

/// Resolve both metrics and report how well each was answered
pub async fn check_health(engine: &ResolutionEngine) -> HealthResponse {
    let (cpu, memory) = tokio::join!(engine.resolve_cpu(), engine.resolve_memory());

    let mut map = HashMap::new();
    map.insert(
        components::CPU.to_string(),
        ComponentHealth::from_resolution(&cpu),
    );
    map.insert(
        components::MEMORY.to_string(),
        ComponentHealth::from_resolution(&memory),
    );

    HealthResponse {
        status: HealthResponse::compute_status(&map),
        os_family: engine.family().to_string(),
        components: map,
    }
}
