//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenGate;
use crate::service::DeliveryService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Delivery pipeline shared by REST and socket paths.
    pub delivery: Arc<DeliveryService>,
    /// Verifies credentials on upgrade and on REST calls.
    pub token_gate: TokenGate,
    /// Outbound queue capacity of each new session.
    pub outbound_queue_capacity: usize,
}
