//! Credential verification for socket upgrades and REST calls.
//!
//! [`TokenGate`] checks an HMAC-signed JWT's signature and expiry and
//! yields [`Claims`]. It does not check the token kind: callers that need
//! an access token call [`Claims::require_access`].

use std::fmt;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::RelayError;

/// Purpose a credential was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived token for message operations.
    Access,
    /// Long-lived token used only to obtain new access tokens.
    Refresh,
    /// Any other or missing `token_type` claim.
    Other(String),
}

impl TokenKind {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("access") => Self::Access,
            Some(s) if s.eq_ignore_ascii_case("refresh") => Self::Refresh,
            Some(s) => Self::Other(s.to_string()),
            None => Self::Other(String::new()),
        }
    }

    /// Wire value written into the `token_type` claim.
    #[must_use]
    pub fn as_claim(&self) -> &str {
        match self {
            Self::Access => "Access",
            Self::Refresh => "refresh",
            Self::Other(s) => s,
        }
    }
}

/// Verified fields of a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (the authenticated user).
    pub subject: UserId,
    /// Purpose of the token.
    pub kind: TokenKind,
    /// Expiry as a Unix timestamp (seconds).
    pub expires_at: i64,
}

impl Claims {
    /// Returns the subject if this is an access token.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidTokenKind`] for any other kind.
    pub fn require_access(&self) -> Result<&UserId, RelayError> {
        match self.kind {
            TokenKind::Access => Ok(&self.subject),
            _ => Err(RelayError::InvalidTokenKind),
        }
    }
}

/// Claim set as it appears inside the JWT.
///
/// The subject is read from `id`, falling back to the registered `sub`
/// claim. Both are loosely typed; a non-string subject is malformed.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    exp: i64,
}

/// Verifies (and, for tooling, issues) HMAC-signed credentials.
#[derive(Clone)]
pub struct TokenGate {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGate").finish_non_exhaustive()
    }
}

impl TokenGate {
    /// Creates a gate for tokens signed with `secret`.
    ///
    /// HS256, HS384 and HS512 signatures are accepted; expiry is enforced
    /// with no leeway.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verifies a credential and extracts its claims.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Unauthenticated`] if the credential is missing,
    ///   malformed, expired or badly signed.
    /// - [`RelayError::MalformedClaims`] if the subject id is absent.
    pub fn verify(&self, credential: Option<&str>) -> Result<Claims, RelayError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::Unauthenticated("no token provided".to_string()))?;

        let data = decode::<WireClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidSignature => "bad signature",
                _ => "invalid token",
            };
            RelayError::Unauthenticated(reason.to_string())
        })?;

        let wire = data.claims;
        let subject = match wire.id.or(wire.sub) {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id,
            None | Some(serde_json::Value::String(_) | serde_json::Value::Null) => {
                return Err(RelayError::MalformedClaims("subject id missing".to_string()));
            }
            Some(_) => {
                return Err(RelayError::MalformedClaims(
                    "subject id is not a string".to_string(),
                ));
            }
        };

        Ok(Claims {
            subject: UserId::new(subject),
            kind: TokenKind::parse(wire.token_type.as_deref()),
            expires_at: wire.exp,
        })
    }

    /// Signs a token for `subject` of the given kind, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if signing fails.
    pub fn issue(
        &self,
        subject: &UserId,
        kind: &TokenKind,
        ttl: chrono::Duration,
    ) -> Result<String, RelayError> {
        let claims = WireClaims {
            id: Some(serde_json::Value::String(subject.as_str().to_string())),
            sub: None,
            token_type: Some(kind.as_claim().to_string()),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding)
            .map_err(|e| RelayError::Internal(format!("token signing failed: {e}")))
    }
}
