use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use backoffice_core::{Audited, PermissionId, RoleId, Stampable, TenantScoped, UserId};

/// Role name used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const TENANT_OWNER: &'static str = "TenantOwner";
    pub const ADMIN: &'static str = "ADMIN";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Owner roles bypass individual permission checks inside their tenant.
    pub fn is_owner(&self) -> bool {
        matches!(self.as_str(), Self::TENANT_OWNER | Self::ADMIN)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored role, owned by a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: RoleId,
    pub tenant: TenantScoped,
    pub name: String,
    pub is_system: bool,
    pub audit: Audited,
}

impl RoleRecord {
    pub fn new(name: impl Into<String>, is_system: bool) -> Self {
        Self {
            id: RoleId::new(),
            tenant: TenantScoped::unassigned(),
            name: name.into(),
            is_system,
            audit: Audited::default(),
        }
    }
}

impl Stampable for RoleRecord {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }

    fn audit_mut(&mut self) -> Option<&mut Audited> {
        Some(&mut self.audit)
    }
}

/// Role → permission join row. `(role_id, permission_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermission {
    pub tenant: TenantScoped,
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

impl Stampable for RolePermission {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }
}

/// User → role join row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRole {
    pub tenant: TenantScoped,
    pub user_id: UserId,
    pub role_id: RoleId,
}

impl Stampable for UserRole {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }
}

/// One of a user's roles with the permission codes it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: String,
    pub permissions: Vec<String>,
}

/// Effective roles and the de-duplicated union of their permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserGrants {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl UserGrants {
    pub fn collect(grants: impl IntoIterator<Item = RoleGrant>) -> Self {
        let mut roles = BTreeSet::new();
        let mut permissions = BTreeSet::new();
        for grant in grants {
            roles.insert(grant.role);
            permissions.extend(grant.permissions);
        }
        Self {
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
        }
    }
}
