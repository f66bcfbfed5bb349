//! Container-aware resource introspection
//!
//! This crate provides the core functionality for:
//! - Resolving CPU and memory usage/limits through ordered source fallback
//!   (cgroup v2, cgroup v1, OS utilities, `/proc`)
//! - Provenance reporting for every resolved snapshot
//! - Raw system report access
//! - TCP/HTTP connectivity diagnostics
//! - Health checks and observability

pub mod connectivity;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod parsers;
pub mod probe;
pub mod source;

pub use connectivity::{check_connectivity, ConnectivityRequest};
pub use engine::{EngineConfig, OsFamily, RawReport, Resolved, ResolutionEngine};
pub use error::{Metric, ProbeError, ToolboxError};
pub use health::{check_health, ComponentHealth, ComponentStatus, HealthResponse};
pub use models::*;
pub use observability::{StructuredLogger, ToolboxMetrics};
pub use probe::CpuSampling;
pub use source::{FixtureSource, HostSource, SourcePaths, SystemSource};
