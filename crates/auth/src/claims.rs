use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use campusdesk_core::InstituteId;

/// Bearer-token claims, after signature verification.
///
/// Timestamps are seconds since the epoch, as issued at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: InstituteId,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token issued by '{0}'")]
    WrongIssuer(String),
}

/// Deterministically validate claims against an issuer and a clock.
pub fn validate_claims(
    claims: &Claims,
    issuer: &str,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.iss != issuer {
        return Err(TokenValidationError::WrongIssuer(claims.iss.clone()));
    }
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
