//! Service layer: the delivery pipeline.
//!
//! [`DeliveryService`] is the single path every chat message takes,
//! whether it arrived over a socket or over REST.

pub mod delivery_service;

pub use delivery_service::{ChatListItem, DeliveryService, Sent};
