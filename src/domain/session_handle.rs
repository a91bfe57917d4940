//! Shared handle to one live client session.
//!
//! The [`SessionHandle`] is the part of a session that other tasks may
//! touch: the producer side of its bounded outbound queue, its shutdown
//! signal and its lifecycle state. The transport itself stays owned by the
//! session's own loops (see [`crate::ws::session`]).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Message, UserId};

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    /// Handshake done, registry insertion in progress.
    Connecting = 0,
    /// Read and write loops running.
    Active = 1,
    /// A loop exited or a close was requested; teardown pending.
    Closing = 2,
    /// Transport released and unregistered.
    Closed = 3,
}

impl SessionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Result of a non-blocking enqueue onto a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message is queued for the write loop.
    Queued,
    /// The queue is at capacity; the message was not queued.
    Full,
    /// The write loop is gone.
    Closed,
}

/// Handle shared between the [`super::Hub`] and a session's loops.
#[derive(Debug)]
pub struct SessionHandle {
    connection_id: ConnectionId,
    user_id: UserId,
    outbound: mpsc::Sender<Message>,
    shutdown: watch::Sender<bool>,
    state: AtomicU8,
    replaced: AtomicBool,
}

impl SessionHandle {
    /// Creates a handle in the `Connecting` state together with the
    /// consumer end of its outbound queue.
    ///
    /// A `capacity` of zero is raised to one.
    #[must_use]
    pub fn new(user_id: UserId, capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        let handle = Self {
            connection_id: ConnectionId::new(),
            user_id,
            outbound,
            shutdown,
            state: AtomicU8::new(SessionState::Connecting as u8),
            replaced: AtomicBool::new(false),
        };
        (handle, rx)
    }

    /// Identifier of this connection.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Owning user. Immutable for the session's lifetime.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves the session forward to `next`. Backward moves are ignored.
    pub fn advance(&self, next: SessionState) {
        self.state.fetch_max(next as u8, Ordering::AcqRel);
    }

    /// Attempts to queue `message` without waiting for capacity.
    pub fn try_enqueue(&self, message: Message) -> EnqueueOutcome {
        match self.outbound.try_send(message) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Requests shutdown of both session loops.
    ///
    /// Idempotent: returns `true` only for the call that flipped the flag.
    pub fn close(&self) -> bool {
        let flipped = self.shutdown.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        });
        if flipped {
            self.advance(SessionState::Closing);
        }
        flipped
    }

    /// Closes the session because a newer connection of the same user took
    /// its place in the hub.
    pub fn close_replaced(&self) -> bool {
        self.replaced.store(true, Ordering::Release);
        self.close()
    }

    /// Returns `true` if the session was closed by a replacement.
    #[must_use]
    pub fn was_replaced(&self) -> bool {
        self.replaced.load(Ordering::Acquire)
    }

    /// Returns `true` once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Subscribes to the shutdown flag.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
