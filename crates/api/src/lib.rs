mod auth;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::Result;
use engine::{EmergencyKillSwitch, TradingEngine};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TradingEngine>,
    pub kill_switch: Arc<EmergencyKillSwitch>,
    pub dashboard_token: String,
}

/// The operator router: `/healthz` is open, everything under `/api` needs the
/// bearer token.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Bind the operator API port. Done before any task is spawned so a taken
/// port fails startup.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Operator API listening");
    Ok(listener)
}

/// Serve the operator API on `listener` until `shutdown` resolves.
pub async fn serve<F>(state: AppState, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Operator API stopped");
    Ok(())
}
