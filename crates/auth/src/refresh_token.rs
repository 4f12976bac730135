use chrono::{DateTime, Utc};

use backoffice_core::{DomainError, DomainResult, RefreshTokenId, Stampable, TenantId, TenantScoped, UserId};

/// Server-side record of an issued refresh token.
///
/// Only the SHA-256 digest of the opaque token is stored. A record is either
/// usable (not revoked, not expired) or terminal (revoked); a revoked record
/// with `replaced_by_hash` set was consumed by rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: RefreshTokenId,
    pub tenant: TenantScoped,
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn tenant_id(&self) -> DomainResult<TenantId> {
        self.tenant
            .tenant_id()
            .ok_or_else(|| DomainError::internal(format!("refresh token {} has no tenant", self.id)))
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }

    /// Revoked because it was exchanged for a newer token.
    pub fn was_rotated(&self) -> bool {
        self.is_revoked() && self.replaced_by_hash.is_some()
    }

    /// Idempotent.
    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(at);
        }
    }

    pub fn rotate_to(&mut self, at: DateTime<Utc>, replacement_hash: impl Into<String>) {
        self.revoke(at);
        self.replaced_by_hash = Some(replacement_hash.into());
    }
}

impl Stampable for RefreshToken {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }
}
