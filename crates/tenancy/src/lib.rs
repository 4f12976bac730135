//! `backoffice-tenancy`: tenant model, per-request tenant context and the
//! isolation primitives every tenant-scoped store is written against.
//!
//! - [`TenantResolver`] turns request inputs into at most one [`TenantContext`].
//! - [`RequestScope`] (tenant + actor) is the mandatory first argument of every
//!   tenant-scoped write; [`TenantContext`] of every tenant-scoped read.
//! - [`PlatformBypass`] is the only way to reach across tenants, and every
//!   construction of one is logged with its [`BypassReason`].
//! - [`AuditStamper`] stamps tenant and created/updated metadata on writes.

pub mod bypass;
pub mod context;
pub mod resolver;
pub mod stamp;
pub mod tenant;

pub use bypass::{BypassReason, PlatformBypass};
pub use context::{RequestScope, TenantContext, TenantSource};
pub use resolver::{
    ResolutionRequest, TenantLookup, TenantResolutionMode, TenantResolver, TenantResolverConfig,
};
pub use stamp::AuditStamper;
pub use tenant::{Tenant, TenantSettings, TenantSettingsSource, TenantStatus, normalize_slug};
