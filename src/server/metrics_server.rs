// src/server/metrics_server.rs

//! Serves Prometheus text-format metrics on a separate port (ambient
//! stack), independent of the main API port so scraping never contends with
//! cluster-hop or console-WS traffic.

use super::context::ServerState;
use crate::core::metrics::gather_metrics;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

async fn metrics_handler(state: Arc<ServerState>) -> impl IntoResponse {
    crate::core::metrics::RAFT_TERM.set(state.cluster.current_term() as f64);
    crate::core::metrics::RAFT_IS_LEADER.set(if state.cluster.is_leader() { 1.0 } else { 0.0 });

    let body = gather_metrics();
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}

pub async fn run(state: Arc<ServerState>, mut shutdown: watch::Receiver<bool>) {
    let port = {
        let config = state.config.lock().await;
        config.metrics.port
    };

    let app = Router::new().route("/metrics", get(move || metrics_handler(state.clone())));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(port, "failed to bind metrics server: {e}");
            return;
        }
    };
    info!("metrics server listening on http://{addr}/metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("metrics server shutting down");
        })
        .await
        .unwrap_or_else(|e| error!("metrics server exited with error: {e}"));
}
