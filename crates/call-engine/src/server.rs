//! HTTP surface: provider webhooks, the authenticated control plane, and
//! resync reads.
//!
//! The control routes act on behalf of the agent identified by the
//! `x-agent-id` header (session issuance itself lives outside this crate;
//! the auth layer in front of the engine sets the header). Every control
//! route is idempotent on repeat delivery and ownership-checked by the
//! engine. `/events` exposes the relay over a websocket, notification
//! only; reconnecting clients resync from `/calls/active` and `/agents`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use serde::Deserialize;
use serde_json::json;

use dialwave_relay_core::{
    AgentId, AgentInfo, AgentStatus, ConferenceSid, ProviderWebhook, TransferMode,
};

use crate::error::EngineError;
use crate::orchestrator::OrchestratorEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<OrchestratorEngine>,
}

/// Build the engine's router.
pub fn router(engine: Arc<OrchestratorEngine>) -> Router {
    Router::new()
        .route("/webhooks/provider", post(provider_webhook))
        .route("/webhooks/inbound", post(inbound_call))
        .route("/calls/dial", post(dial))
        .route("/calls/hold", post(hold))
        .route("/calls/transfer", post(transfer))
        .route("/calls/transfer/complete", post(transfer_complete))
        .route("/calls/hangup", post(hangup))
        .route("/calls/active", get(active_calls))
        .route("/calls/log/:conference_sid", get(call_log))
        .route("/agents", get(list_agents).post(upsert_agent))
        .route("/agents/:agent_id/status", post(set_agent_status))
        .route("/events", get(events))
        .with_state(AppState { engine })
}

/// Serve the router on an already-bound listener.
pub async fn serve(
    engine: Arc<OrchestratorEngine>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    axum::serve(listener, router(engine)).await
}

/// The authenticated agent a control request acts for.
pub struct AgentIdentity(pub AgentId);

#[async_trait]
impl<S> FromRequestParts<S> for AgentIdentity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get("x-agent-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());
        match value {
            Some(v) => Ok(AgentIdentity(AgentId::new(v))),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "missing x-agent-id header" })),
            )
                .into_response()),
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
            EngineError::Authorization { .. } => StatusCode::FORBIDDEN,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Provider { .. } => StatusCode::BAD_GATEWAY,
            EngineError::Database(_) | EngineError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ===== webhook + inbound =====

async fn provider_webhook(
    State(state): State<AppState>,
    Json(webhook): Json<ProviderWebhook>,
) -> Result<StatusCode, EngineError> {
    state.engine.handle_webhook(webhook).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct InboundRequest {
    from_number: String,
}

async fn inbound_call(
    State(state): State<AppState>,
    Json(req): Json<InboundRequest>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let conference = state.engine.ring_inbound(&req.from_number).await?;
    Ok(Json(json!({ "conference_sid": conference })))
}

// ===== control plane =====

#[derive(Debug, Deserialize)]
struct DialRequest {
    to_number: String,
}

async fn dial(
    State(state): State<AppState>,
    AgentIdentity(agent): AgentIdentity,
    Json(req): Json<DialRequest>,
) -> Result<Json<serde_json::Value>, EngineError> {
    let conference = state.engine.dial_outbound(&agent, &req.to_number).await?;
    Ok(Json(json!({ "conference_sid": conference })))
}

#[derive(Debug, Deserialize)]
struct HoldRequest {
    conference_sid: ConferenceSid,
    on_hold: bool,
}

async fn hold(
    State(state): State<AppState>,
    AgentIdentity(agent): AgentIdentity,
    Json(req): Json<HoldRequest>,
) -> Result<StatusCode, EngineError> {
    state
        .engine
        .set_hold(&agent, &req.conference_sid, req.on_hold)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TransferRequest {
    conference_sid: ConferenceSid,
    target_agent_id: AgentId,
    mode: TransferMode,
}

async fn transfer(
    State(state): State<AppState>,
    AgentIdentity(agent): AgentIdentity,
    Json(req): Json<TransferRequest>,
) -> Result<StatusCode, EngineError> {
    state
        .engine
        .begin_transfer(&agent, &req.conference_sid, &req.target_agent_id, req.mode)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ConferenceRequest {
    conference_sid: ConferenceSid,
}

async fn transfer_complete(
    State(state): State<AppState>,
    AgentIdentity(agent): AgentIdentity,
    Json(req): Json<ConferenceRequest>,
) -> Result<StatusCode, EngineError> {
    state
        .engine
        .complete_transfer(&agent, &req.conference_sid)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn hangup(
    State(state): State<AppState>,
    AgentIdentity(agent): AgentIdentity,
    Json(req): Json<ConferenceRequest>,
) -> Result<StatusCode, EngineError> {
    state.engine.hangup(&agent, &req.conference_sid).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== resync reads =====

async fn active_calls(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::database::ActiveCallRow>>, EngineError> {
    Ok(Json(state.engine.active_calls().await?))
}

async fn call_log(
    State(state): State<AppState>,
    Path(conference_sid): Path<String>,
) -> Result<Json<crate::database::CallLogRow>, EngineError> {
    let sid = ConferenceSid::new(conference_sid);
    state
        .engine
        .call_log(&sid)
        .await?
        .map(Json)
        .ok_or_else(|| EngineError::not_found(format!("call log for {}", sid)))
}

// ===== agent directory =====

async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::database::AgentRow>>, EngineError> {
    Ok(Json(state.engine.agents().await?))
}

async fn upsert_agent(
    State(state): State<AppState>,
    Json(agent): Json<AgentInfo>,
) -> Result<StatusCode, EngineError> {
    state.engine.store().upsert_agent(&agent).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AgentStatusRequest {
    status: AgentStatus,
}

async fn set_agent_status(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<AgentStatusRequest>,
) -> Result<StatusCode, EngineError> {
    let agent = AgentId::new(agent_id);
    state.engine.flip_presence(&agent, req.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== real-time channel =====

async fn events(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let rx = state.engine.relay().subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, rx))
}

async fn stream_events(
    mut socket: WebSocket,
    mut rx: tokio::sync::broadcast::Receiver<dialwave_relay_core::ChannelEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let Ok(payload) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(payload)).await.is_err() {
                    return;
                }
            }
            // Dropped events are not replayed; the client resyncs via reads.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event stream lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}
