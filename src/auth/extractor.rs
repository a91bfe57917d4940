//! Bearer-token extractor for REST handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::RelayError;

/// The authenticated caller of a REST endpoint.
///
/// Extracted from `Authorization: Bearer <token>`; a bare token without
/// the `Bearer ` prefix is accepted too. Only access tokens pass.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RelayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = header.map(|h| h.strip_prefix("Bearer ").unwrap_or(h));

        let claims = state.token_gate.verify(token)?;
        let user_id = claims.require_access()?.clone();
        Ok(Self(user_id))
    }
}
