//! WebSocket layer: upgrade handler, frame types and the per-connection
//! session loops.
//!
//! The endpoint at `/ws` authenticates the caller from the `token` query
//! parameter, then hands the upgraded socket to [`session::run_session`].

pub mod handler;
pub mod messages;
pub mod session;
