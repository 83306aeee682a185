//! Liveness endpoint.
//!
//! Serves `GET /healthy` on HEALTH_PORT (default 5000) in its own task,
//! independent of the Telegram dispatcher.

use axum::{response::Html, routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Static payload returned by the liveness check.
pub const HEALTH_PAYLOAD: &str = "<b>Bot is alive🎉🥳</b>";

/// Builds the router. Split out so tests can drive it without a socket.
pub fn router() -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/healthy", get(health_handler))
}

/// Start the liveness server.
pub async fn start_health_server(port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Starting health server on http://{}", addr);
    log::info!("  /healthy    - Liveness check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

async fn health_handler() -> Html<&'static str> {
    Html(HEALTH_PAYLOAD)
}
