//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde::Deserialize;

use super::session::run_session;
use crate::app_state::AppState;
use crate::error::RelayError;

/// Query string of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Access token of the connecting user.
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /ws?token=<credential>` — Upgrade HTTP connection to WebSocket.
///
/// The token is verified before the upgrade is accepted; on failure the
/// request is answered with `401` and a JSON error body.
///
/// # Errors
///
/// Returns [`RelayError`] if the token is missing, invalid or not an
/// access token.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, RelayError> {
    let claims = state.token_gate.verify(query.token.as_deref())?;
    let user_id = claims.require_access()?.clone();

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let delivery = Arc::clone(&state.delivery);
    let capacity = state.outbound_queue_capacity;
    tracing::debug!(%user_id, "upgrading connection");

    Ok(ws.on_upgrade(move |socket| {
        let (sink, stream) = socket.split();
        run_session(sink, stream, user_id, delivery, capacity)
    }))
}
