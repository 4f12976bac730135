use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use backoffice_auth::{IdentityStore, RefreshToken, RoleGrant, UserAccount};
use backoffice_core::{DomainError, DomainResult, UserId};
use backoffice_tenancy::{PlatformBypass, RequestScope, TenantContext};

use super::InMemoryStore;

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_user_by_email(
        &self,
        tenant: &TenantContext,
        email: &str,
    ) -> DomainResult<Option<UserAccount>> {
        let state = self.read()?;
        Ok(state
            .users
            .rows(tenant.tenant_id())
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Option<UserAccount>> {
        let state = self.read()?;
        Ok(state.users.get(tenant.tenant_id(), &user_id).cloned())
    }

    async fn role_grants(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Vec<RoleGrant>> {
        let state = self.read()?;
        let tenant_id = tenant.tenant_id();
        let grants = state
            .user_roles
            .rows(tenant_id)
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| state.roles.get(tenant_id, &ur.role_id))
            .map(|role| RoleGrant {
                role: role.name.clone(),
                permissions: state
                    .role_permissions
                    .rows(tenant_id)
                    .filter(|rp| rp.role_id == role.id)
                    .filter_map(|rp| state.permissions.get(&rp.permission_id).cloned())
                    .collect(),
            })
            .collect();
        Ok(grants)
    }

    async fn record_login(&self, scope: &RequestScope, user_id: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut state = self.write()?;
        let user = state
            .users
            .get_mut(scope.tenant_id(), &user_id)
            .ok_or_else(|| DomainError::not_found("user not found"))?;
        user.last_login_at = Some(at);
        self.stamper.on_update(scope, user)
    }

    async fn insert_refresh_token(&self, scope: &RequestScope, mut token: RefreshToken) -> DomainResult<()> {
        self.stamper.on_insert(scope, &mut token)?;
        let mut state = self.write()?;
        state
            .refresh_tokens
            .insert(scope.tenant_id(), token.token_hash.clone(), token);
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
    ) -> DomainResult<Option<RefreshToken>> {
        let state = self.read()?;
        Ok(state
            .refresh_tokens
            .get_bypassing(bypass, &token_hash.to_string())
            .map(|(_, token)| token.clone()))
    }

    async fn rotate_refresh_token(
        &self,
        scope: &RequestScope,
        presented_hash: &str,
        mut replacement: RefreshToken,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.stamper.on_insert(scope, &mut replacement)?;
        let mut state = self.write()?;
        let presented = state
            .refresh_tokens
            .get_mut(scope.tenant_id(), &presented_hash.to_string())
            .filter(|t| t.is_usable(at))
            .ok_or_else(|| DomainError::unauthorized("invalid refresh token"))?;
        presented.rotate_to(at, replacement.token_hash.clone());
        state
            .refresh_tokens
            .insert(scope.tenant_id(), replacement.token_hash.clone(), replacement);
        Ok(())
    }

    async fn revoke_refresh_token(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let mut state = self.write()?;
        match state
            .refresh_tokens
            .get_mut_bypassing(bypass, &token_hash.to_string())
        {
            Some((_, token)) => {
                token.revoke(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_refresh_chain(
        &self,
        bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<usize> {
        let mut state = self.write()?;
        let mut seen = HashSet::new();
        let mut revoked = 0;
        let mut next = Some(token_hash.to_string());
        while let Some(hash) = next.take() {
            if !seen.insert(hash.clone()) {
                break;
            }
            let Some((_, token)) = state.refresh_tokens.get_mut_bypassing(bypass, &hash) else {
                break;
            };
            if !token.is_revoked() {
                token.revoke(at);
                revoked += 1;
            }
            next = token.replaced_by_hash.clone();
        }
        Ok(revoked)
    }
}
