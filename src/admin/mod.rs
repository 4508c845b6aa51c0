//! Admin API.
//!
//! Read-only views of the running server plus lifting bans. Every route
//! requires `Authorization: Bearer <api_key>`.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::bridge::RemotePublisher;
use crate::http::ConnectionGate;
use crate::lifecycle::Shutdown;
use crate::observability::stats::ServiceStats;
use crate::plugins::PluginRegistry;
use crate::scheduler::WorkerPool;

/// Everything the admin handlers can look at.
#[derive(Clone)]
pub struct AdminState {
    pub gate: Arc<ConnectionGate>,
    pub pool: WorkerPool,
    pub registry: Arc<PluginRegistry>,
    pub stats: Arc<ServiceStats>,
    pub publisher: Option<Arc<RemotePublisher>>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routes", get(get_routes))
        .route("/admin/bans", get(get_bans))
        .route("/admin/bans/{ip}", delete(lift_ban))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    listener: tokio::net::TcpListener,
    state: AdminState,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown.signalled())
        .await
}
