mod config;
mod room;
mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

/// Routes of the relay: a single WebSocket endpoint at `/ws`.
pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(service)
}

/// Binds `config.bind_addr` and serves the relay until the task is dropped.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    serve_on(listener, config).await
}

pub async fn serve_on(listener: TcpListener, config: ServerConfig) -> anyhow::Result<()> {
    let service = SignalingService::new(&config);
    info!("Relay listening on ws://{}/ws", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}
