use backoffice_auth::Principal;
use backoffice_tenancy::{RequestScope, TenantContext};

/// Correlation id of the current request, echoed as `X-Correlation-Id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub const HEADER: &'static str = "x-correlation-id";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Write scope for a tenant-required route: resolved tenant plus acting user.
pub fn request_scope(tenant: &TenantContext, principal: &Principal) -> RequestScope {
    RequestScope::new(tenant.clone(), Some(principal.user_id))
}
