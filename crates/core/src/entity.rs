//! The two capability structs every persisted record can embed: [`TenantScoped`] and [`Audited`].
//!
//! Repositories check these at their boundary; nothing inspects types at runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{TenantId, UserId};

/// Owning tenant of a record. Starts unassigned and is set exactly once.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantScoped {
    tenant_id: Option<TenantId>,
}

impl TenantScoped {
    pub fn unassigned() -> Self {
        Self { tenant_id: None }
    }

    pub fn assigned(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id == Some(tenant_id)
    }

    /// Bind the record to `resolved`.
    ///
    /// An unassigned record takes the tenant; a record already bound to the same
    /// tenant is left alone; a record bound elsewhere is rejected.
    pub fn stamp(&mut self, resolved: TenantId) -> DomainResult<()> {
        match self.tenant_id {
            None => {
                self.tenant_id = Some(resolved);
                Ok(())
            }
            Some(existing) if existing == resolved => Ok(()),
            Some(_) => Err(DomainError::forbidden(
                "record belongs to a different tenant than the current request",
            )),
        }
    }
}

/// Created/updated timestamps and actors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audited {
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

impl Audited {
    pub fn mark_created(&mut self, at: DateTime<Utc>, by: Option<UserId>) {
        self.created_at = at;
        self.created_by = by;
    }

    pub fn mark_updated(&mut self, at: DateTime<Utc>, by: Option<UserId>) {
        self.updated_at = Some(at);
        self.updated_by = by;
    }
}

/// Implemented by every record that goes through a tenant-scoped write path.
pub trait Stampable {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped;

    /// `None` for records that only carry a tenant (e.g. join rows).
    fn audit_mut(&mut self) -> Option<&mut Audited> {
        None
    }
}
