use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{UserId, WarehouseId};

use crate::Role;

/// JWT claims model (transport-agnostic).
///
/// This is the set of claims the service expects once a token has been
/// decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Caller identity.
    pub user_id: UserId,

    pub role: Role,

    /// Home warehouse of the caller; absent for admins.
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,

    /// Issued-at timestamp (`iat`, seconds since epoch).
    #[serde(
        rename = "iat",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<DateTime<Utc>>,

    /// Expiration timestamp (`exp`, seconds since epoch).
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token is malformed or its signature is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token subject is not a valid user id")]
    InvalidSubject,
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::JwtValidator`] implementations.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.user_id.get() <= 0 {
        return Err(TokenValidationError::InvalidSubject);
    }
    if let Some(issued_at) = claims.issued_at {
        if claims.expires_at <= issued_at {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < issued_at {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
