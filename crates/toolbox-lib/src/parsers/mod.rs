//! Pure parsers for accounting files and utility output
//!
//! One function per source format. None of them touch the filesystem or
//! branch on the host OS; they only turn text into typed values.

pub mod cgroup;
pub mod command;
pub mod procfs;

use crate::error::ProbeError;

fn parse_u64(token: &str, what: &'static str) -> Result<u64, ProbeError> {
    token
        .trim()
        .parse::<u64>()
        .map_err(|e| ProbeError::parse(what, format!("'{}': {e}", token.trim())))
}

fn parse_f64(token: &str, what: &'static str) -> Result<f64, ProbeError> {
    let value = token
        .trim()
        .parse::<f64>()
        .map_err(|e| ProbeError::parse(what, format!("'{}': {e}", token.trim())))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProbeError::parse(what, format!("non-finite value '{}'", token.trim())))
    }
}
