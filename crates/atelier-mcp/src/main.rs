//! Atelier MCP Server
//!
//! This binary serves one in-memory project over MCP stdio. The project can be
//! seeded from a snapshot JSON document; edits are never written back to disk.

use std::path::PathBuf;

use anyhow::Context;
use atelier::{EngineConfig, Snapshot};
use atelier_mcp::ProjectServer;
use clap::Parser;
use rmcp::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Serve an in-memory project to MCP clients over stdio
#[derive(Debug, Parser)]
#[command(name = "atelier-mcp", version)]
struct Args {
    /// Snapshot JSON document (`{"/path": "content"}`) to start from
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Prefix `view` output lines with their line number
    #[arg(long)]
    number_lines: bool,

    /// Truncate `view` output beyond this many bytes
    #[arg(long)]
    max_view_bytes: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - output to stderr so it doesn't interfere with MCP stdio
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = EngineConfig {
        number_view_lines: args.number_lines,
        max_view_bytes: args.max_view_bytes,
    };

    let server = match &args.snapshot {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            let snapshot = Snapshot::from_json(&json)?;
            tracing::info!(files = snapshot.len(), path = %path.display(), "loaded snapshot");
            ProjectServer::from_snapshot(config, &snapshot)?
        }
        None => ProjectServer::new(config),
    };

    tracing::info!("Starting Atelier MCP server");

    // Serve over stdio
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to start MCP service: {}", e);
        })?;

    tracing::info!("Atelier MCP server running");

    // Wait for the service to complete
    service.waiting().await?;

    tracing::info!("Atelier MCP server shutting down");

    Ok(())
}
