//! API server: REST routes plus the Prometheus exporter.

use crate::rest::{self, AppState};
use crate::segment_rest;
use axum::routing::{delete, get, post};
use axum::Router;
use crm_core::config::AppConfig;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Route table without middleware. Tests drive this directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Segments
        .route(
            "/api/segments",
            get(segment_rest::list_segments).post(segment_rest::create_segment),
        )
        .route("/api/segments/preview", post(segment_rest::preview_segment))
        .route("/api/segments/:id", delete(segment_rest::delete_segment))
        .route("/api/segments/:id/export", get(segment_rest::export_segment))
        // Activity feed
        .route("/api/activities", get(segment_rest::list_activities))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Install the metrics recorder and serve `/metrics` on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
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
