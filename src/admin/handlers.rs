use std::net::IpAddr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::admin::AdminState;
use crate::net::ClientId;
use crate::observability::stats::StatsSnapshot;
use crate::plugins::RouteInfo;
use crate::security::BanEntry;

#[derive(Serialize)]
pub struct WorkerStatus {
    pub capacity: usize,
    pub active: usize,
}

#[derive(Serialize)]
pub struct ClientLoad {
    pub client: ClientId,
    pub outstanding: usize,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub mode: &'static str,
    pub workers: WorkerStatus,
    pub pending_connections: usize,
    pub awaiting_remote: usize,
    pub bridge_closed: bool,
    pub clients: Vec<ClientLoad>,
    pub routes: usize,
    pub bans: usize,
    pub stats: StatsSnapshot,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        mode: if state.publisher.is_some() { "remote" } else { "local" },
        workers: WorkerStatus {
            capacity: state.pool.capacity(),
            active: state.pool.active(),
        },
        pending_connections: state.gate.queue().len(),
        awaiting_remote: state.publisher.as_ref().map_or(0, |p| p.pending()),
        bridge_closed: state.publisher.as_ref().is_some_and(|p| p.is_closed()),
        clients: state
            .gate
            .outstanding_all()
            .into_iter()
            .map(|(client, outstanding)| ClientLoad { client, outstanding })
            .collect(),
        routes: state.registry.len(),
        bans: state.gate.bans().len(),
        stats: state.stats.snapshot(),
    })
}

pub async fn get_routes(State(state): State<AdminState>) -> Json<Vec<RouteInfo>> {
    Json(state.registry.routes())
}

pub async fn get_bans(State(state): State<AdminState>) -> Json<Vec<BanEntry>> {
    Json(state.gate.bans())
}

pub async fn lift_ban(
    State(state): State<AdminState>,
    Path(ip): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("'{ip}' is not an IP address") })),
        );
    };

    if state.gate.lift_ban(ClientId::from(ip)) {
        (StatusCode::OK, Json(json!({ "client": ip, "lifted": true })))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "client": ip, "lifted": false })),
        )
    }
}
