use backoffice_core::{TenantId, UserId};

/// Where the tenant of a request came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TenantSource {
    IdHeader,
    SlugHeader,
    Subdomain,
    Claim,
    /// Login by slug in the request body.
    LoginSlug,
    /// Taken from a stored refresh token during rotation.
    RefreshToken,
}

/// Tenant context for a request.
///
/// Built once per request by the resolver (or the session manager) and never
/// mutated afterwards. There is deliberately no setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    slug: Option<String>,
    source: TenantSource,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, source: TenantSource) -> Self {
        Self {
            tenant_id,
            slug: None,
            source,
        }
    }

    pub fn with_slug(tenant_id: TenantId, slug: impl Into<String>, source: TenantSource) -> Self {
        Self {
            tenant_id,
            slug: Some(slug.into()),
            source,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn source(&self) -> TenantSource {
        self.source
    }
}

/// Tenant plus acting user: what a write needs for stamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    tenant: TenantContext,
    actor: Option<UserId>,
}

impl RequestScope {
    pub fn new(tenant: TenantContext, actor: Option<UserId>) -> Self {
        Self { tenant, actor }
    }

    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant.tenant_id()
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }
}
