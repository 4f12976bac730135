//! In-process store for tests and local development.
//!
//! A single lock guards every table, so multi-row writes (token rotation,
//! payment plus version bump) are atomic with respect to each other.

mod identity;
mod invoicing;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use backoffice_auth::{RefreshToken, RoleRecord, RolePermission, UserAccount, UserRole, permissions};
use backoffice_core::{
    Clock, CustomerId, DomainError, DomainResult, InvoiceId, MovementId, PermissionId, ProductId,
    RoleId, TenantId, TenantScoped, UserId,
};
use backoffice_invoicing::{CustomerRef, Invoice, ProductRef};
use backoffice_tenancy::{
    AuditStamper, BypassReason, PlatformBypass, Tenant, TenantContext, TenantLookup, TenantSettings,
    TenantSettingsSource, TenantStatus,
};

use crate::{StockMovement, TenantTable};

struct TenantRow {
    tenant: Tenant,
    settings: TenantSettings,
}

#[derive(Default)]
struct State {
    tenants: HashMap<TenantId, TenantRow>,
    permissions: HashMap<PermissionId, String>,
    users: TenantTable<UserId, UserAccount>,
    roles: TenantTable<RoleId, RoleRecord>,
    role_permissions: TenantTable<(RoleId, PermissionId), RolePermission>,
    user_roles: TenantTable<(UserId, RoleId), UserRole>,
    refresh_tokens: TenantTable<String, RefreshToken>,
    products: TenantTable<ProductId, ProductRef>,
    customers: TenantTable<CustomerId, CustomerRef>,
    invoices: TenantTable<InvoiceId, Invoice>,
    invoice_sequences: HashMap<TenantId, u64>,
    movements: TenantTable<MovementId, StockMovement>,
}

impl State {
    fn permission_id(&self, code: &str) -> Option<PermissionId> {
        self.permissions
            .iter()
            .find(|(_, c)| c.as_str() == code)
            .map(|(id, _)| *id)
    }
}

pub struct InMemoryStore {
    state: RwLock<State>,
    stamper: AuditStamper,
}

impl InMemoryStore {
    /// Empty store with the global permission catalog (and the `*` wildcard)
    /// already present.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut state = State::default();
        for code in permissions::CATALOG.iter().map(|p| p.code).chain(["*"]) {
            state.permissions.insert(PermissionId::new(), code.to_string());
        }
        Self {
            state: RwLock::new(state),
            stamper: AuditStamper::new(clock),
        }
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::internal("in-memory store lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::internal("in-memory store lock poisoned"))
    }

    // ──────────────────────────────────────────────────────────────────────
    // Provisioning (platform-level, outside any request tenant)
    // ──────────────────────────────────────────────────────────────────────

    pub fn insert_tenant(&self, tenant: Tenant, settings: TenantSettings) -> DomainResult<Tenant> {
        let mut state = self.write()?;
        if state.tenants.values().any(|row| row.tenant.slug == tenant.slug) {
            return Err(DomainError::conflict(format!("tenant slug '{}' is taken", tenant.slug)));
        }
        state.tenants.insert(
            tenant.id,
            TenantRow {
                tenant: tenant.clone(),
                settings,
            },
        );
        Ok(tenant)
    }

    pub fn set_tenant_status(&self, tenant_id: TenantId, status: TenantStatus) -> DomainResult<()> {
        let mut state = self.write()?;
        let row = state
            .tenants
            .get_mut(&tenant_id)
            .ok_or_else(|| DomainError::not_found("tenant not found"))?;
        row.tenant.status = status;
        Ok(())
    }

    pub fn update_settings(&self, tenant_id: TenantId, settings: TenantSettings) -> DomainResult<()> {
        let mut state = self.write()?;
        let row = state
            .tenants
            .get_mut(&tenant_id)
            .ok_or_else(|| DomainError::not_found("tenant not found"))?;
        row.settings = settings;
        Ok(())
    }

    pub fn insert_user(&self, tenant_id: TenantId, mut user: UserAccount) -> DomainResult<UserAccount> {
        let bypass = PlatformBypass::new(BypassReason::PlatformAdministration);
        let mut state = self.write()?;
        ensure_tenant(&state, tenant_id)?;
        if state.users.rows(tenant_id).any(|u| u.email == user.email) {
            return Err(DomainError::conflict(format!("email '{}' already registered", user.email)));
        }
        self.stamper.on_insert_bypassing(&bypass, tenant_id, None, &mut user)?;
        state.users.insert(tenant_id, user.id, user.clone());
        Ok(user)
    }

    pub fn set_user_active(&self, tenant_id: TenantId, user_id: UserId, active: bool) -> DomainResult<()> {
        let mut state = self.write()?;
        let user = state
            .users
            .get_mut(tenant_id, &user_id)
            .ok_or_else(|| DomainError::not_found("user not found"))?;
        user.is_active = active;
        Ok(())
    }

    pub fn insert_role(&self, tenant_id: TenantId, mut role: RoleRecord) -> DomainResult<RoleRecord> {
        let bypass = PlatformBypass::new(BypassReason::PlatformAdministration);
        let mut state = self.write()?;
        ensure_tenant(&state, tenant_id)?;
        if state.roles.rows(tenant_id).any(|r| r.name == role.name) {
            return Err(DomainError::conflict(format!("role '{}' already exists", role.name)));
        }
        self.stamper.on_insert_bypassing(&bypass, tenant_id, None, &mut role)?;
        state.roles.insert(tenant_id, role.id, role.clone());
        Ok(role)
    }

    pub fn grant_permission(&self, tenant_id: TenantId, role_id: RoleId, code: &str) -> DomainResult<()> {
        let bypass = PlatformBypass::new(BypassReason::PlatformAdministration);
        let mut state = self.write()?;
        if !state.roles.contains(tenant_id, &role_id) {
            return Err(DomainError::not_found("role not found"));
        }
        let permission_id = state
            .permission_id(code)
            .ok_or_else(|| DomainError::validation(format!("unknown permission '{code}'")))?;
        if state.role_permissions.contains(tenant_id, &(role_id, permission_id)) {
            return Err(DomainError::conflict(format!("permission '{code}' already granted")));
        }
        let mut row = RolePermission {
            tenant: TenantScoped::unassigned(),
            role_id,
            permission_id,
        };
        self.stamper.on_insert_bypassing(&bypass, tenant_id, None, &mut row)?;
        state.role_permissions.insert(tenant_id, (role_id, permission_id), row);
        Ok(())
    }

    pub fn assign_role(&self, tenant_id: TenantId, user_id: UserId, role_id: RoleId) -> DomainResult<()> {
        let bypass = PlatformBypass::new(BypassReason::PlatformAdministration);
        let mut state = self.write()?;
        if !state.users.contains(tenant_id, &user_id) {
            return Err(DomainError::not_found("user not found"));
        }
        if !state.roles.contains(tenant_id, &role_id) {
            return Err(DomainError::not_found("role not found"));
        }
        let mut row = UserRole {
            tenant: TenantScoped::unassigned(),
            user_id,
            role_id,
        };
        self.stamper.on_insert_bypassing(&bypass, tenant_id, None, &mut row)?;
        state.user_roles.insert(tenant_id, (user_id, role_id), row);
        Ok(())
    }

    pub fn insert_product(&self, tenant_id: TenantId, product: ProductRef) -> DomainResult<()> {
        let mut state = self.write()?;
        ensure_tenant(&state, tenant_id)?;
        state.products.insert(tenant_id, product.id, product);
        Ok(())
    }

    pub fn insert_customer(&self, tenant_id: TenantId, customer: CustomerRef) -> DomainResult<()> {
        let mut state = self.write()?;
        ensure_tenant(&state, tenant_id)?;
        state.customers.insert(tenant_id, customer.id, customer);
        Ok(())
    }

    /// Inventory movements recorded for the tenant, oldest first.
    pub fn movements(&self, tenant: &TenantContext) -> DomainResult<Vec<StockMovement>> {
        let state = self.read()?;
        let mut rows: Vec<_> = state.movements.rows(tenant.tenant_id()).cloned().collect();
        rows.sort_by_key(|m| (m.audit.created_at, m.id));
        Ok(rows)
    }
}

fn ensure_tenant(state: &State, tenant_id: TenantId) -> DomainResult<()> {
    if state.tenants.contains_key(&tenant_id) {
        Ok(())
    } else {
        Err(DomainError::not_found("tenant not found"))
    }
}

#[async_trait]
impl TenantLookup for InMemoryStore {
    async fn find_tenant_by_slug(&self, slug: &str) -> DomainResult<Option<Tenant>> {
        let state = self.read()?;
        Ok(state
            .tenants
            .values()
            .find(|row| row.tenant.slug == slug)
            .map(|row| row.tenant.clone()))
    }

    async fn find_tenant(&self, tenant_id: TenantId) -> DomainResult<Option<Tenant>> {
        let state = self.read()?;
        Ok(state.tenants.get(&tenant_id).map(|row| row.tenant.clone()))
    }
}

#[async_trait]
impl TenantSettingsSource for InMemoryStore {
    async fn tenant_settings(&self, tenant: &TenantContext) -> DomainResult<TenantSettings> {
        let state = self.read()?;
        Ok(state
            .tenants
            .get(&tenant.tenant_id())
            .map(|row| row.settings.clone())
            .unwrap_or_default())
    }
}
