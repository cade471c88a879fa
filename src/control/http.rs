//! The Session Registrar: a small `axum` HTTP surface letting the external
//! call-control adapter bind a session id to a peer address ahead of RTP,
//! and tear a session down by id.

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::UdpSocket;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    config::Config,
    session::{session::MediaSession, state::SessionIdentity, SessionRegistry},
};

/// State shared across every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub rtp_socket: Arc<UdpSocket>,
}

/// Builds the registrar's router, ready to be served on `config.http_listen_addr`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/unregister", post(unregister))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() })))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (ip, port, session_uuid) = match (
        body.get("ip").and_then(|v| v.as_str()),
        body.get("port").and_then(|v| v.as_u64()),
        body.get("session_uuid").and_then(|v| v.as_str()),
    ) {
        (Some(ip), Some(port), Some(uuid)) => (ip, port, uuid),
        _ => return bad_request("missing required field(s): ip, port, session_uuid"),
    };

    let ip: IpAddr = match ip.parse() {
        Ok(v) => v,
        Err(_) => return bad_request("invalid ip"),
    };
    let port: u16 = match u16::try_from(port) {
        Ok(v) => v,
        Err(_) => return bad_request("invalid port"),
    };
    let session_uuid: Uuid = match Uuid::parse_str(session_uuid) {
        Ok(v) => v,
        Err(_) => return bad_request("invalid session_uuid"),
    };

    let peer_addr = SocketAddr::new(ip, port);

    if state.registry.rebind_peer(peer_addr, session_uuid) {
        tracing::info!(%peer_addr, %session_uuid, "re-registered peer under new session id");
        return (
            StatusCode::OK,
            Json(json!({ "status": "registered", "session_uuid": session_uuid.to_string() })),
        );
    }

    state.registry.pre_register(peer_addr, session_uuid);
    let identity = SessionIdentity {
        session_id: session_uuid,
        peer_addr,
    };
    let session = MediaSession::spawn(identity, state.config.clone(), state.rtp_socket.clone());
    state.registry.insert(session.clone());
    session.send_priming_packet();
    tracing::info!(%peer_addr, %session_uuid, "registered new session and sent priming packet");

    (
        StatusCode::OK,
        Json(json!({ "status": "registered", "session_uuid": session_uuid.to_string() })),
    )
}

async fn unregister(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let session_uuid = match body.get("session_uuid").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return bad_request("missing required field: session_uuid"),
    };
    let session_uuid: Uuid = match Uuid::parse_str(session_uuid) {
        Ok(v) => v,
        Err(_) => return bad_request("invalid session_uuid"),
    };

    match state.registry.remove_by_id(session_uuid) {
        Some(session) => {
            session.shutdown().await;
            tracing::info!(%session_uuid, "session unregistered and torn down");
            (
                StatusCode::OK,
                Json(json!({ "status": "unregistered", "removed_count": 1 })),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "unregistered", "removed_count": 0 })),
        ),
    }
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "active_sessions": state.registry.active_count() }))
}
