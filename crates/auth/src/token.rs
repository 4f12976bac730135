//! Access-token signing (HS256) and opaque refresh-token generation.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use backoffice_core::{Clock, DomainError, DomainResult, RefreshTokenId, TenantId, TenantScoped, UserId};

use crate::{AccessClaims, JwtConfig, RefreshToken, UserAccount, UserGrants, validate_claims};

/// Bytes of randomness in a refresh token (512 bits).
pub const REFRESH_TOKEN_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenService {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: JwtConfig, clock: Arc<dyn Clock>) -> DomainResult<Self> {
        if config.secret.is_empty() {
            return Err(DomainError::validation("jwt secret must not be empty"));
        }
        if config.access_token_minutes <= 0 || config.refresh_token_days <= 0 {
            return Err(DomainError::validation("token lifetimes must be positive"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked against the injected clock in `validate_claims`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue_access_token(
        &self,
        user: &UserAccount,
        tenant_id: TenantId,
        grants: &UserGrants,
    ) -> DomainResult<AccessToken> {
        let now = self.clock.now();
        let expires_at = now + Duration::minutes(self.config.access_token_minutes);
        let claims = AccessClaims {
            sub: user.id,
            tenant_id,
            email: user.email.clone(),
            roles: grants.roles.clone(),
            perms: grants.permissions.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::now_v7().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::internal(format!("failed to sign access token: {e}")))?;

        Ok(AccessToken { token, expires_at })
    }

    /// Verify signature, issuer, audience and time window. Stateless: no
    /// revocation list is consulted for access tokens.
    pub fn validate_access_token(&self, token: &str) -> DomainResult<AccessClaims> {
        let data = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "access token rejected");
            DomainError::unauthorized("invalid access token")
        })?;

        validate_claims(&data.claims, self.clock.now())
            .map_err(|e| DomainError::unauthorized(e.to_string()))?;

        Ok(data.claims)
    }

    /// Mint an opaque refresh token and its unpersisted record.
    ///
    /// The record's tenant is left unassigned; the store stamps it from the
    /// request scope on insert.
    pub fn issue_refresh_token(&self, user_id: UserId) -> (String, RefreshToken) {
        let raw = generate_opaque_token();
        let now = self.clock.now();
        let record = RefreshToken {
            id: RefreshTokenId::new(),
            tenant: TenantScoped::unassigned(),
            user_id,
            token_hash: hash_refresh_token(&raw),
            expires_at: now + Duration::days(self.config.refresh_token_days),
            revoked_at: None,
            replaced_by_hash: None,
            created_at: now,
        };
        (raw, record)
    }
}

/// 512 random bits, URL-safe base64 without padding.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 digest used as the stored lookup key.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.trim().as_bytes());
    hex::encode(hasher.finalize())
}
