//! Health check for a running openerz-mcp server.
//!
//! Reads the target from `MCP_SERVER_URL` (default `http://127.0.0.1:8000`)
//! and exits non-zero when any check fails.

use openerz_mcp::health::{HealthCheckClient, EXPECTED_TOOLS};
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("openerz_mcp=info,health_check=info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let client = HealthCheckClient::from_env(Duration::from_secs(10))?;
    println!("Checking MCP server at {}", client.base_url());

    match client.run(&EXPECTED_TOOLS).await {
        Ok(report) => {
            println!("Liveness: HTTP {}", report.liveness_status);
            println!(
                "Server: {} {} (session {})",
                report.handshake.server_name,
                report.handshake.server_version,
                report.handshake.session_id
            );
            println!("Tools ({}):", report.tools.len());
            for tool in &report.tools {
                println!("  - {}: {}", tool.name, tool.description);
            }
            println!("All checks passed");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Health check failed");
            eprintln!("Health check failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
