//! Two-stage reachability check: TCP dial, then HTTP GET
//!
//! Every outcome is a value in the report. Nothing here returns an error.

use crate::models::ConnectivityReport;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub const TCP_SUCCESS: &str = "success";
pub const HTTP_SKIPPED: &str = "skipped (TCP failed)";
pub const DEFAULT_PORT: &str = "80";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// What to check. Use [`ConnectivityRequest::normalized`] to apply defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityRequest {
    pub domain: String,
    pub port: String,
    pub timeout_secs: i64,
}

/// A request with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub domain: String,
    pub port: String,
    pub timeout: Duration,
}

impl ConnectivityRequest {
    pub fn new(domain: impl Into<String>, port: impl Into<String>, timeout_secs: i64) -> Self {
        Self {
            domain: domain.into(),
            port: port.into(),
            timeout_secs,
        }
    }

    /// Empty port becomes `80`, a non-positive timeout becomes 5 seconds
    pub fn normalized(self) -> NormalizedRequest {
        let port = match self.port.trim() {
            "" => DEFAULT_PORT.to_string(),
            port => port.to_string(),
        };
        let secs = u64::try_from(self.timeout_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        NormalizedRequest {
            domain: self.domain,
            port,
            timeout: Duration::from_secs(secs),
        }
    }
}

impl NormalizedRequest {
    /// `host:port`, with IPv6 literals bracketed
    pub fn address(&self) -> String {
        join_host_port(&self.domain, &self.port)
    }
}

pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Dial `domain:port`, then GET `http://domain:port/` if the dial worked.
pub async fn check_connectivity(request: ConnectivityRequest) -> ConnectivityReport {
    let request = request.normalized();
    let address = request.address();

    let tcp = dial(&address, request.timeout).await;
    let http = if tcp == TCP_SUCCESS {
        http_status(&address, request.timeout).await
    } else {
        HTTP_SKIPPED.to_string()
    };
    debug!(%address, %tcp, %http, "Connectivity check finished");

    ConnectivityReport {
        domain: request.domain,
        port: request.port,
        timeout_seconds: request.timeout.as_secs(),
        tcp,
        http,
    }
}

async fn dial(address: &str, limit: Duration) -> String {
    match timeout(limit, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => TCP_SUCCESS.to_string(),
        Ok(Err(e)) => format!("dial tcp {address}: {e}"),
        Err(_) => format!("dial tcp {address}: i/o timeout after {}s", limit.as_secs()),
    }
}

async fn http_status(address: &str, limit: Duration) -> String {
    let client = match reqwest::Client::builder().timeout(limit).build() {
        Ok(client) => client,
        Err(e) => return e.to_string(),
    };

    match client.get(format!("http://{address}/")).send().await {
        Ok(response) => {
            let status = response.status();
            match status.canonical_reason() {
                Some(reason) => format!("{} {}", status.as_u16(), reason),
                None => status.as_u16().to_string(),
            }
        }
        Err(e) => e.to_string(),
    }
}
