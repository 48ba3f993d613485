//! API server: HTTP surface and Prometheus exporter.

use crate::handlers::KvState;
use crate::router::kv_router;
use lineitem_core::config::AppConfig;
use lineitem_engine::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    registry: Arc<Registry>,
}

impl ApiServer {
    pub fn new(config: AppConfig, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = KvState::new(self.registry.clone(), self.config.node_id.clone());
        let app = kv_router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
