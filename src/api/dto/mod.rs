//! Data Transfer Objects for REST request/response serialization.

pub mod chat_dto;
pub mod message_dto;

pub use chat_dto::*;
pub use message_dto::*;
