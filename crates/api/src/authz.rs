//! API-side authorization guard.
//!
//! Enforced at the handler boundary, before any engine call, so the domain
//! crates stay auth-agnostic.

use backoffice_auth::{Permission, Principal, authorize};
use backoffice_tenancy::TenantContext;

use crate::app::errors::ApiError;

pub fn require_permission(
    tenant: &TenantContext,
    principal: &Principal,
    permission: &Permission,
) -> Result<(), ApiError> {
    authorize(principal, tenant.tenant_id(), permission).map_err(|e| {
        tracing::debug!(
            tenant_id = %tenant.tenant_id(),
            user_id = %principal.user_id,
            permission = %permission,
            "permission denied"
        );
        ApiError::from(e)
    })
}
