//! REST endpoint handlers organized by resource.

pub mod chat;
pub mod message;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(message::routes())
        .merge(chat::routes())
        .merge(system::routes())
}
