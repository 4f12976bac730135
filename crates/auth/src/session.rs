//! Login, refresh-token rotation and logout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use backoffice_core::{Clock, DomainError, DomainResult};
use backoffice_tenancy::{
    BypassReason, PlatformBypass, RequestScope, Tenant, TenantContext, TenantLookup, TenantSource,
};

use crate::token::hash_refresh_token;
use crate::{IdentityStore, PasswordVerifier, TokenService, UserAccount, UserGrants, UserSummary, normalize_email};

const INVALID_CREDENTIALS: &str = "invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "invalid refresh token";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub tokens: SessionTokens,
    pub user: UserSummary,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    tenants: Arc<dyn TenantLookup>,
    passwords: Arc<dyn PasswordVerifier>,
    tokens: Arc<TokenService>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        tenants: Arc<dyn TenantLookup>,
        passwords: Arc<dyn PasswordVerifier>,
        tokens: Arc<TokenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            tenants,
            passwords,
            tokens,
            clock,
        }
    }

    /// Authenticate within the request's resolved tenant, or the tenant named
    /// by `tenant_slug` when none was resolved.
    pub async fn login(
        &self,
        request: LoginRequest,
        resolved: Option<&TenantContext>,
    ) -> DomainResult<LoginOutcome> {
        let tenant = self.login_tenant(&request, resolved).await?;
        if !tenant.is_active() {
            return Err(DomainError::forbidden("tenant is suspended"));
        }
        let source = resolved.map_or(TenantSource::LoginSlug, TenantContext::source);
        let ctx = TenantContext::with_slug(tenant.id, tenant.slug.clone(), source);

        let email = normalize_email(&request.email);
        let user = self
            .store
            .find_user_by_email(&ctx, &email)
            .await?
            .ok_or_else(|| DomainError::unauthorized(INVALID_CREDENTIALS))?;

        if !self.passwords.verify(&request.password, &user.password_hash) {
            tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "login rejected: bad password");
            return Err(DomainError::unauthorized(INVALID_CREDENTIALS));
        }
        if !user.is_active {
            return Err(DomainError::forbidden("user is inactive"));
        }

        let now = self.clock.now();
        let scope = RequestScope::new(ctx, Some(user.id));
        self.store.record_login(&scope, user.id, now).await?;

        let grants = UserGrants::collect(self.store.role_grants(scope.tenant(), user.id).await?);
        let tokens = self.issue(&scope, &user, &grants).await?;

        tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "user logged in");

        Ok(LoginOutcome {
            user: user.summary(&grants),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token becomes
    /// permanently unusable.
    pub async fn refresh(&self, raw_token: &str) -> DomainResult<SessionTokens> {
        let presented_hash = hash_refresh_token(raw_token);
        let bypass = PlatformBypass::new(BypassReason::RefreshTokenLookup);
        let now = self.clock.now();

        let stored = self
            .store
            .find_refresh_token(&bypass, &presented_hash)
            .await?
            .ok_or_else(|| DomainError::unauthorized(INVALID_REFRESH_TOKEN))?;

        if stored.was_rotated() {
            let revoked = self
                .store
                .revoke_refresh_chain(&bypass, &presented_hash, now)
                .await?;
            tracing::warn!(
                user_id = %stored.user_id,
                tenant_id = ?stored.tenant.tenant_id(),
                revoked,
                "rotated refresh token presented again; descendant chain revoked"
            );
            return Err(DomainError::unauthorized(INVALID_REFRESH_TOKEN));
        }
        if !stored.is_usable(now) {
            return Err(DomainError::unauthorized(INVALID_REFRESH_TOKEN));
        }

        let ctx = TenantContext::new(stored.tenant_id()?, TenantSource::RefreshToken);
        let user = self
            .store
            .find_user(&ctx, stored.user_id)
            .await?
            .ok_or_else(|| DomainError::unauthorized(INVALID_REFRESH_TOKEN))?;
        if !user.is_active {
            return Err(DomainError::forbidden("user is inactive"));
        }

        // Current grants, so role changes apply on the next refresh.
        let grants = UserGrants::collect(self.store.role_grants(&ctx, user.id).await?);
        let access = self.tokens.issue_access_token(&user, ctx.tenant_id(), &grants)?;
        let (raw, replacement) = self.tokens.issue_refresh_token(user.id);
        let refresh_expires_at = replacement.expires_at;

        let scope = RequestScope::new(ctx, Some(user.id));
        self.store
            .rotate_refresh_token(&scope, &presented_hash, replacement, now)
            .await?;

        tracing::debug!(tenant_id = %scope.tenant_id(), user_id = %user.id, "refresh token rotated");

        Ok(SessionTokens {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: raw,
            refresh_token_expires_at: refresh_expires_at,
        })
    }

    /// Revoke the token if it exists. Unknown tokens are a silent no-op.
    pub async fn logout(&self, raw_token: &str) -> DomainResult<()> {
        let bypass = PlatformBypass::new(BypassReason::RefreshTokenLookup);
        let existed = self
            .store
            .revoke_refresh_token(&bypass, &hash_refresh_token(raw_token), self.clock.now())
            .await?;
        tracing::debug!(existed, "logout processed");
        Ok(())
    }

    async fn login_tenant(
        &self,
        request: &LoginRequest,
        resolved: Option<&TenantContext>,
    ) -> DomainResult<Tenant> {
        let found = match (resolved, request.tenant_slug.as_deref().map(str::trim)) {
            (Some(ctx), _) => self.tenants.find_tenant(ctx.tenant_id()).await?,
            (None, Some(slug)) if !slug.is_empty() => {
                self.tenants
                    .find_tenant_by_slug(&slug.to_ascii_lowercase())
                    .await?
            }
            _ => return Err(DomainError::unauthorized("tenant could not be resolved")),
        };
        found.ok_or_else(|| DomainError::unauthorized("tenant not found"))
    }

    async fn issue(
        &self,
        scope: &RequestScope,
        user: &UserAccount,
        grants: &UserGrants,
    ) -> DomainResult<SessionTokens> {
        let access = self.tokens.issue_access_token(user, scope.tenant_id(), grants)?;
        let (raw, record) = self.tokens.issue_refresh_token(user.id);
        let refresh_expires_at = record.expires_at;
        self.store.insert_refresh_token(scope, record).await?;

        Ok(SessionTokens {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: raw,
            refresh_token_expires_at: refresh_expires_at,
        })
    }
}
