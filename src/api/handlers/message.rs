//! Message handlers: send, edit and conversation history.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{
    HistoryRequest, MessageDto, SendMessageRequest, SendMessageResponse, UpdateMessageRequest,
    UpdateMessageResponse,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ErrorResponse, RelayError};

/// `POST /message` — Send a message over REST.
///
/// Follows the same path as a socket frame: the message is persisted first,
/// then handed to the recipient's session if they are connected.
///
/// # Errors
///
/// Returns [`RelayError`] on bad credentials, an unknown recipient, a
/// self-send or a persistence failure.
#[utoipa::path(
    post,
    path = "/message",
    tag = "Messages",
    summary = "Send a message",
    description = "Persists a message for the owner of `receiver_number` and delivers it live if they are connected.",
    request_body = SendMessageRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Message stored", body = SendMessageResponse),
        (status = 400, description = "Malformed body or self-send", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Recipient not found", body = ErrorResponse),
        (status = 500, description = "Persistence failed", body = ErrorResponse),
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(sender): AuthUser,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let Json(req) = payload?;
    let sent = state
        .delivery
        .send(&sender, &req.receiver_number, req.message)
        .await?;

    Ok(Json(SendMessageResponse {
        id: *sent.message.id.as_uuid(),
        created_at: sent.message.created_at,
        message: sent.message.text,
        status: "Message sent successfully".to_string(),
    }))
}

/// `POST /update_message` — Edit a message the caller sent.
///
/// # Errors
///
/// Returns [`RelayError::Unauthorized`] if the caller did not send a
/// message with that id.
#[utoipa::path(
    post,
    path = "/update_message",
    tag = "Messages",
    summary = "Edit a message",
    description = "Replaces the text of a message. Only its sender may edit it; unknown ids and foreign messages are rejected alike.",
    request_body = UpdateMessageRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Message updated", body = UpdateMessageResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "No matching message or not the sender", body = ErrorResponse),
    )
)]
pub async fn update_message(
    State(state): State<AppState>,
    AuthUser(editor): AuthUser,
    payload: Result<Json<UpdateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let Json(req) = payload?;
    state
        .delivery
        .update_message(&req.id, &editor, &req.new_message)
        .await?;

    Ok(Json(UpdateMessageResponse {
        status: "Message updated successfully".to_string(),
    }))
}

/// `POST /get_message` — Conversation history with one partner.
///
/// # Errors
///
/// Returns [`RelayError::RecipientNotFound`] if the number is unknown.
#[utoipa::path(
    post,
    path = "/get_message",
    tag = "Messages",
    summary = "Conversation history",
    description = "Returns every message exchanged between the caller and the owner of `sender_number`, oldest first.",
    request_body = HistoryRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<MessageDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Partner not found", body = ErrorResponse),
    )
)]
pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let Json(req) = payload?;
    let messages = state.delivery.history(&user, &req.sender_number).await?;
    let data: Vec<MessageDto> = messages.into_iter().map(MessageDto::from).collect();
    Ok(Json(data))
}

/// Message routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/message", post(send_message))
        .route("/update_message", post(update_message))
        .route("/get_message", post(history))
}
