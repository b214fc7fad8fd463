use anyhow::Context;
use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
}

pub async fn bind(port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
    tracing::info!(%addr, "health endpoint listening");
    Ok(listener)
}

pub async fn serve(
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("health endpoint failed")?;
    Ok(())
}

async fn root() -> &'static str {
    "Stock alert bot is running"
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_liveness_bodies() {
        assert_eq!(root().await, "Stock alert bot is running");
        assert_eq!(healthz().await, "ok");
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let listener = bind(0).await.unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(listener, shutdown.clone()));
        shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
