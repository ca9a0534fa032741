//! Capsule CRM MCP Server - CRM tools via the Model Context Protocol
//!
//! # Usage
//!
//! ## stdio transport (for Claude Desktop, local use)
//! ```bash
//! CAPSULE_API_TOKEN=... capsule-mcp-server
//! ```
//!
//! ## HTTP transport (for remote hosting)
//! ```bash
//! CAPSULE_API_TOKEN=... capsule-mcp-server --http --port 8080
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use capsule_client::{CapsuleClient, CapsuleConfig};
use capsule_mcp::CapsuleMcpServer;

/// Capsule CRM MCP Server
#[derive(Parser, Debug)]
#[command(name = "capsule-mcp-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use HTTP transport instead of stdio (for remote hosting)
    #[arg(long)]
    http: bool,

    /// HTTP port (only used with --http)
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// HTTP host to bind to (only used with --http)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("capsule_mcp=debug,capsule_client=debug,rmcp=debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("capsule_mcp=info,rmcp=warn"))
    };

    // Only log to stderr for stdio transport to avoid corrupting the protocol
    if args.http {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Configuration is resolved up front so a missing token is a startup
    // error, not a failure on the first tool call.
    let config = CapsuleConfig::from_env().context("Capsule configuration")?;
    let client = Arc::new(CapsuleClient::new(config).context("Capsule API client")?);

    tracing::info!("Starting Capsule CRM MCP Server");

    if args.http {
        run_http_server(client, &args.host, args.port).await
    } else {
        run_stdio_server(client).await
    }
}

/// Run the server with stdio transport (for Claude Desktop)
async fn run_stdio_server(client: Arc<CapsuleClient>) -> anyhow::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    tracing::info!("Using stdio transport");

    let service = CapsuleMcpServer::new(client).serve(stdio()).await?;

    tracing::info!("Capsule CRM MCP Server ready");
    tracing::info!(
        "Available tools: list_contacts, search_contacts, get_contact, create_person, \
         add_note, list_entries, list_opportunities, list_open_opportunities, list_cases, \
         list_tasks, list_projects, list_tags, list_users, list_pipelines, \
         calculate_sold_project_days, and more"
    );

    service.waiting().await?;

    Ok(())
}

/// Run the server with HTTP transport (for remote hosting)
#[cfg(feature = "http")]
async fn run_http_server(
    client: Arc<CapsuleClient>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    use axum::Router;
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    };
    use tower_http::cors::{Any, CorsLayer};

    tracing::info!("Using HTTP transport on {}:{}", host, port);

    let mcp_service = StreamableHttpService::new(
        move || Ok(CapsuleMcpServer::new(client.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    // Configure CORS for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .nest_service("/mcp", mcp_service)
        .route("/health", axum::routing::get(health_check))
        .layer(cors);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Capsule CRM MCP Server listening on http://{}/mcp", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C handler");
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}

/// Health check endpoint for HTTP transport
#[cfg(feature = "http")]
async fn health_check() -> &'static str {
    "OK"
}

/// Fallback when HTTP feature is not enabled
#[cfg(not(feature = "http"))]
async fn run_http_server(
    _client: Arc<CapsuleClient>,
    _host: &str,
    _port: u16,
) -> anyhow::Result<()> {
    anyhow::bail!("HTTP transport not available. Rebuild with: cargo build --features http")
}
