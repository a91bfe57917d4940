//! Domain layer: identifiers, the message record, session handles and the
//! connection hub.
//!
//! This module contains the server-side model of who is connected and what
//! gets delivered: [`UserId`], [`Message`], the per-connection
//! [`SessionHandle`] and the process-wide [`Hub`].

pub mod hub;
pub mod message;
pub mod session_handle;
pub mod user_id;

pub use hub::{DeliveryOutcome, Hub};
pub use message::{Message, MessageId};
pub use session_handle::{EnqueueOutcome, SessionHandle, SessionState};
pub use user_id::{ConnectionId, UserId};
