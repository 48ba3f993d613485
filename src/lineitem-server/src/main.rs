//! Line item KV server: in-memory targeting and pacing registry over HTTP.
//!
//! Main entry point that loads configuration, builds the registry and starts
//! the server.

use clap::Parser;
use lineitem_api::ApiServer;
use lineitem_core::config::AppConfig;
use lineitem_engine::{Registry, SystemClock};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "lineitem-server")]
#[command(about = "In-memory line item targeting and pacing server")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "LINEITEM_KV__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "LINEITEM_KV__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "LINEITEM_KV__METRICS__PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lineitem_server=info,lineitem_engine=info,lineitem_api=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Line item server starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }

    config.engine.validate()?;

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        slot_minutes = config.engine.slot_minutes,
        max_batch_size = config.engine.max_batch_size,
        "Configuration loaded"
    );

    let registry = Arc::new(Registry::with_config(Arc::new(SystemClock), config.engine));

    let api_server = ApiServer::new(config, registry);

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Line item server is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
