//! Chat list handler.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ChatListEntryDto;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ErrorResponse, RelayError};

/// `GET /chat_list` — Latest message with every partner of the caller.
///
/// # Errors
///
/// Returns [`RelayError`] on bad credentials or a persistence failure.
#[utoipa::path(
    get,
    path = "/chat_list",
    tag = "Chats",
    summary = "List chats",
    description = "One entry per conversation partner with the most recent message, most recent first.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Chat list", body = Vec<ChatListEntryDto>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Persistence failed", body = ErrorResponse),
    )
)]
pub async fn chat_list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, RelayError> {
    let items = state.delivery.chat_list(&user).await?;
    let data: Vec<ChatListEntryDto> = items.into_iter().map(ChatListEntryDto::from).collect();
    Ok(Json(data))
}

/// Chat routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/chat_list", get(chat_list))
}
