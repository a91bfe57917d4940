//! Authentication: credential verification and the REST bearer extractor.

pub mod extractor;
pub mod token_gate;

pub use extractor::AuthUser;
pub use token_gate::{Claims, TokenGate, TokenKind};
