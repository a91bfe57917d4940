//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Chat endpoints sit at the root (`/message`, `/chat_list`, ...) and take
//! a bearer access token. The OpenAPI document is served at
//! `/api-docs/openapi.json`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "chat-relay", description = "Real-time chat delivery layer"),
    paths(
        handlers::message::send_message,
        handlers::message::update_message,
        handlers::message::history,
        handlers::chat::chat_list,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::SendMessageRequest,
        dto::SendMessageResponse,
        dto::UpdateMessageRequest,
        dto::UpdateMessageResponse,
        dto::HistoryRequest,
        dto::MessageDto,
        dto::ChatListEntryDto,
        handlers::system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Messages", description = "Send, edit and read messages"),
        (name = "Chats", description = "Conversation overview"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by the handlers.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Builds the complete API router with all REST endpoints and the
/// OpenAPI document.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .merge(docs_router())
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    use utoipa_swagger_ui::SwaggerUi;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
