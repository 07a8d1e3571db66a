//! HTTP endpoint exposing the indexer's Prometheus registry.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use govmirror_indexer::IndexerMetrics;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

pub fn router(metrics: Arc<IndexerMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<Arc<IndexerMetrics>>) -> impl IntoResponse {
    match metrics.encode_text() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Serve `/metrics` on `port` until `shutdown` fires.
pub async fn serve(
    port: u16,
    metrics: Arc<IndexerMetrics>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn exposes_registered_series() {
        let metrics = Arc::new(IndexerMetrics::new().unwrap());
        metrics.observe_failed_cycle("kusama");

        let response = metrics_handler(State(metrics)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("govmirror_cycle_errors_total{network=\"kusama\"} 1"));
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let metrics = Arc::new(IndexerMetrics::new().unwrap());
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(0, metrics, shutdown.clone()));
        shutdown.cancel();
        server.await.unwrap().unwrap();
    }
}
