//! Connectivity check command

use anyhow::Result;
use colored::Colorize;

use crate::output::{print_error, print_json, print_rows, print_success, FieldRow, OutputFormat};
use toolbox_lib::{check_connectivity, ConnectivityRequest};

/// Run the TCP then HTTP check and print the report.
///
/// An unreachable host is reported, not returned as an error.
pub async fn check(domain: &str, port: String, timeout_secs: i64, format: OutputFormat) -> Result<()> {
    let report = check_connectivity(ConnectivityRequest::new(domain, port, timeout_secs)).await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            println!("{}", "Connectivity Check".bold());
            println!("{}", "=".repeat(40));
            print_rows(vec![
                FieldRow::new("Domain", report.domain.cyan().to_string()),
                FieldRow::new("Port", report.port.clone()),
                FieldRow::new("Timeout", format!("{}s", report.timeout_seconds)),
                FieldRow::new("TCP", report.tcp.clone()),
                FieldRow::new("HTTP", report.http.clone()),
            ]);
            println!();
            if report.tcp_succeeded() {
                print_success(&format!("{}:{} is reachable", report.domain, report.port));
            } else {
                print_error(&format!("{}:{} is unreachable", report.domain, report.port));
            }
        }
    }
    Ok(())
}
