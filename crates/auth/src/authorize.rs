use thiserror::Error;

use backoffice_core::{DomainError, TenantId, UserId};

use crate::permissions::PLATFORM_ADMIN;
use crate::{AccessClaims, Permission, Role};

/// Authenticated caller, derived from validated access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            email: claims.email.clone(),
            roles: claims.roles.iter().cloned().map(Role::new).collect(),
            permissions: claims.perms.iter().cloned().map(Permission::new).collect(),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.roles.iter().any(Role::is_owner)
    }

    /// Explicit platform operator grant. The tenant-local `*` wildcard does
    /// not count.
    pub fn is_platform_admin(&self) -> bool {
        self.permissions.contains(&PLATFORM_ADMIN)
    }

    pub fn holds(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("missing permission {0}")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::forbidden(value.to_string())
    }
}

/// The principal may act within `active_tenant`: it is their own tenant, or
/// they are a platform administrator.
pub fn ensure_tenant_access(principal: &Principal, active_tenant: TenantId) -> Result<(), AuthzError> {
    if principal.tenant_id == active_tenant || principal.is_platform_admin() {
        Ok(())
    } else {
        Err(AuthzError::TenantMismatch)
    }
}

/// Authorize a principal within the active tenant.
///
/// - No IO
/// - No panics
/// - Owner roles and the `*` wildcard pass every permission check
pub fn authorize(
    principal: &Principal,
    active_tenant: TenantId,
    required: &Permission,
) -> Result<(), AuthzError> {
    ensure_tenant_access(principal, active_tenant)?;

    if principal.is_owner() || principal.holds(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
