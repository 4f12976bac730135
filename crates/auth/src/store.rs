use async_trait::async_trait;
use chrono::{DateTime, Utc};

use backoffice_core::{DomainResult, UserId};
use backoffice_tenancy::{PlatformBypass, RequestScope, TenantContext};

use crate::{RefreshToken, RoleGrant, UserAccount};

/// Persistence seam for users, role grants and refresh tokens.
///
/// Tenant-scoped methods take the resolved tenant as their first argument and
/// never return rows of another tenant. The refresh-token methods that run
/// before a tenant is known require a [`PlatformBypass`].
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// `email` is already normalized.
    async fn find_user_by_email(
        &self,
        tenant: &TenantContext,
        email: &str,
    ) -> DomainResult<Option<UserAccount>>;

    async fn find_user(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Option<UserAccount>>;

    /// Roles currently assigned to the user, each with its permission codes.
    async fn role_grants(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Vec<RoleGrant>>;

    async fn record_login(&self, scope: &RequestScope, user_id: UserId, at: DateTime<Utc>) -> DomainResult<()>;

    async fn insert_refresh_token(&self, scope: &RequestScope, token: RefreshToken) -> DomainResult<()>;

    async fn find_refresh_token(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
    ) -> DomainResult<Option<RefreshToken>>;

    /// Atomically revoke `presented_hash`, point it at `replacement` and insert
    /// `replacement`. Either all of it commits or none of it does.
    ///
    /// Fails `unauthorized` if the presented token is no longer usable at commit
    /// time, so two concurrent rotations cannot both succeed.
    async fn rotate_refresh_token(
        &self,
        scope: &RequestScope,
        presented_hash: &str,
        replacement: RefreshToken,
        at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Returns whether a matching token existed. Already revoked tokens keep
    /// their original revocation time.
    async fn revoke_refresh_token(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Revoke every token reachable from `token_hash` via replacement pointers.
    /// Returns how many were newly revoked.
    async fn revoke_refresh_chain(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<usize>;
}
