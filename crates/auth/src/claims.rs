use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{TenantId, UserId};

/// Access-token claims.
///
/// Timestamps are unix seconds (`iat`/`nbf`/`exp`), as on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user id.
    pub sub: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Flattened, de-duplicated permission codes across all roles.
    #[serde(default)]
    pub perms: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of decoded claims against `now`.
///
/// Signature, issuer and audience are checked by [`crate::TokenService`].
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.nbf.max(claims.iat) {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn claims(iat: i64, exp: i64) -> AccessClaims {
        AccessClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            email: "ana@example.com".into(),
            roles: vec![],
            perms: vec![],
            iss: "backoffice".into(),
            aud: "backoffice".into(),
            iat,
            nbf: iat,
            exp,
            jti: "j".into(),
        }
    }

    #[test]
    fn window_checks() {
        let now = Utc.with_ymd_and_hms(2026, 2, 4, 12, 0, 0).unwrap();
        let t = now.timestamp();

        assert_eq!(validate_claims(&claims(t - 10, t + 10), now), Ok(()));
        assert_eq!(validate_claims(&claims(t - 20, t), now), Err(TokenValidationError::Expired));
        assert_eq!(validate_claims(&claims(t + 5, t + 50), now), Err(TokenValidationError::NotYetValid));
        assert_eq!(
            validate_claims(&claims(t, t), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
