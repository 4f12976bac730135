use std::sync::Arc;

use backoffice_core::{Clock, DomainResult, Stampable, TenantId, UserId};

use crate::{PlatformBypass, RequestScope};

/// Stamps tenant ownership and audit metadata on every persisted write.
///
/// Stores call this immediately before persisting, so it runs exactly once per
/// write and always against the request's own tenant.
#[derive(Clone)]
pub struct AuditStamper {
    clock: Arc<dyn Clock>,
}

impl AuditStamper {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn on_insert<E: Stampable>(&self, scope: &RequestScope, entity: &mut E) -> DomainResult<()> {
        self.insert_for(scope.tenant_id(), scope.actor(), entity)
    }

    pub fn on_update<E: Stampable>(&self, scope: &RequestScope, entity: &mut E) -> DomainResult<()> {
        entity.tenant_scope_mut().stamp(scope.tenant_id())?;
        let now = self.clock.now();
        if let Some(audit) = entity.audit_mut() {
            audit.mark_updated(now, scope.actor());
        }
        Ok(())
    }

    /// Insert on behalf of an explicit tenant (platform provisioning).
    pub fn on_insert_bypassing<E: Stampable>(
        &self,
        _bypass: &PlatformBypass,
        tenant_id: TenantId,
        actor: Option<UserId>,
        entity: &mut E,
    ) -> DomainResult<()> {
        self.insert_for(tenant_id, actor, entity)
    }

    fn insert_for<E: Stampable>(
        &self,
        tenant_id: TenantId,
        actor: Option<UserId>,
        entity: &mut E,
    ) -> DomainResult<()> {
        entity.tenant_scope_mut().stamp(tenant_id)?;
        let now = self.clock.now();
        if let Some(audit) = entity.audit_mut() {
            audit.mark_created(now, actor);
        }
        Ok(())
    }
}
