//! # chat-relay
//!
//! Real-time delivery layer of a chat service.
//!
//! Authenticated users hold a WebSocket session; messages sent over the
//! socket or over REST are persisted first and then pushed to the
//! recipient's session if they are connected. Offline recipients read
//! them later through the history endpoints.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── Token Gate (auth/)
//!     ├── REST Handlers (api/)
//!     ├── WS Handler + Session loops (ws/)
//!     │
//!     ├── DeliveryService (service/)
//!     │
//!     ├── Hub + SessionHandle (domain/)
//!     │
//!     └── IdentityDirectory / MessageStore (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the full application router: REST endpoints, the `/ws` upgrade
/// endpoint and the HTTP middleware stack.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws::handler::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
