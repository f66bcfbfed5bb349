//! HTTP binding for the container resource toolbox
//!
//! Exposes snapshot, per-metric, raw report and connectivity endpoints
//! over a shared [`toolbox_lib::ResolutionEngine`].

pub mod api;
pub mod config;
