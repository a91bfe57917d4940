//! Connection registry: which user is live on which session.
//!
//! [`Hub`] maps each [`UserId`] to at most one [`SessionHandle`]. The map
//! sits behind a [`tokio::sync::RwLock`]: lookups for delivery share the
//! read lock, registration and removal take the write lock. No lock is
//! held across an I/O suspension point; delivery clones the handle out of
//! the map and enqueues after the guard is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::session_handle::{EnqueueOutcome, SessionHandle};
use super::{ConnectionId, Message, UserId};

/// Outcome of a live-delivery attempt.
///
/// None of these are errors: the message is already durable and reaches
/// the recipient on their next history fetch if it was not delivered live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued on the recipient's session.
    Delivered,
    /// The recipient has no active session.
    Offline,
    /// The recipient's outbound queue is saturated.
    QueueFull,
    /// The recipient's session is shutting down.
    Closed,
}

/// Process-wide directory of connected users.
///
/// # Concurrency
///
/// - Concurrent lookups never block each other.
/// - A lookup never races with a registration or removal.
/// - Registering a user that already has a session replaces it and
///   closes the previous session.
#[derive(Debug, Default)]
pub struct Hub {
    sessions: RwLock<HashMap<UserId, Arc<SessionHandle>>>,
}

impl Hub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `session` as the live session of its user.
    ///
    /// If the user already had a session it is removed from the map and
    /// closed, and returned to the caller.
    pub async fn register(&self, session: Arc<SessionHandle>) -> Option<Arc<SessionHandle>> {
        let user_id = session.user_id().clone();
        let connection_id = session.connection_id();
        let previous = {
            let mut map = self.sessions.write().await;
            map.insert(user_id.clone(), session)
        };

        if let Some(old) = &previous {
            old.close_replaced();
            tracing::info!(
                %user_id,
                old_connection = %old.connection_id(),
                new_connection = %connection_id,
                "session replaced"
            );
        } else {
            tracing::debug!(%user_id, %connection_id, "session registered");
        }
        previous
    }

    /// Removes whatever session is registered for `user_id`.
    ///
    /// Idempotent: removing an absent user is a no-op. Returns `true` if an
    /// entry was removed.
    pub async fn unregister(&self, user_id: &UserId) -> bool {
        let removed = self.sessions.write().await.remove(user_id);
        if removed.is_some() {
            tracing::debug!(%user_id, "session unregistered");
        }
        removed.is_some()
    }

    /// Removes the entry for `user_id` only if it still belongs to
    /// `connection_id`.
    ///
    /// A session tearing itself down uses this so it never evicts the
    /// session that replaced it.
    pub async fn release(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let mut map = self.sessions.write().await;
        let owned = map
            .get(user_id)
            .is_some_and(|current| current.connection_id() == connection_id);
        if owned {
            map.remove(user_id);
            tracing::debug!(%user_id, %connection_id, "session released");
        }
        owned
    }

    /// Returns the live session of `user_id`, if any.
    pub async fn lookup(&self, user_id: &UserId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Attempts a non-blocking live delivery of `message` to `user_id`.
    pub async fn deliver(&self, user_id: &UserId, message: Message) -> DeliveryOutcome {
        let Some(session) = self.lookup(user_id).await else {
            return DeliveryOutcome::Offline;
        };
        match session.try_enqueue(message) {
            EnqueueOutcome::Queued => DeliveryOutcome::Delivered,
            EnqueueOutcome::Full => {
                tracing::warn!(
                    %user_id,
                    connection_id = %session.connection_id(),
                    "outbound queue full, skipping live delivery"
                );
                DeliveryOutcome::QueueFull
            }
            EnqueueOutcome::Closed => DeliveryOutcome::Closed,
        }
    }

    /// Returns the number of connected users.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no user is connected.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
