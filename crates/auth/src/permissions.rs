use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque capability codes (e.g. "invoices.write").
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const PRODUCTS_READ: Permission = Permission::from_static("products.read");
pub const PRODUCTS_WRITE: Permission = Permission::from_static("products.write");
pub const INVENTORY_WRITE: Permission = Permission::from_static("inventory.write");
pub const CUSTOMERS_READ: Permission = Permission::from_static("customers.read");
pub const CUSTOMERS_WRITE: Permission = Permission::from_static("customers.write");
pub const INVOICES_READ: Permission = Permission::from_static("invoices.read");
pub const INVOICES_WRITE: Permission = Permission::from_static("invoices.write");
pub const PAYMENTS_WRITE: Permission = Permission::from_static("payments.write");
pub const AR_READ: Permission = Permission::from_static("ar.read");
pub const REPORTS_READ: Permission = Permission::from_static("reports.read");
pub const USERS_MANAGE: Permission = Permission::from_static("users.manage");
pub const ROLES_MANAGE: Permission = Permission::from_static("roles.manage");
pub const TENANT_SETTINGS: Permission = Permission::from_static("tenant.settings");
/// Cross-tenant platform operator.
pub const PLATFORM_ADMIN: Permission = Permission::from_static("platform.admin");

/// Entry of the global (tenant-independent) permission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionSpec {
    pub code: &'static str,
    pub module: &'static str,
    pub description: &'static str,
}

pub const CATALOG: &[PermissionSpec] = &[
    PermissionSpec { code: "products.read", module: "products", description: "View products" },
    PermissionSpec { code: "products.write", module: "products", description: "Create and edit products" },
    PermissionSpec { code: "inventory.write", module: "inventory", description: "Record inventory movements" },
    PermissionSpec { code: "customers.read", module: "customers", description: "View customers" },
    PermissionSpec { code: "customers.write", module: "customers", description: "Create and edit customers" },
    PermissionSpec { code: "invoices.read", module: "invoices", description: "View invoices" },
    PermissionSpec { code: "invoices.write", module: "invoices", description: "Create invoices" },
    PermissionSpec { code: "payments.write", module: "payments", description: "Register payments" },
    PermissionSpec { code: "ar.read", module: "ar", description: "View accounts receivable" },
    PermissionSpec { code: "reports.read", module: "reports", description: "View reports" },
    PermissionSpec { code: "users.manage", module: "users", description: "Manage users" },
    PermissionSpec { code: "roles.manage", module: "roles", description: "Manage roles" },
    PermissionSpec { code: "tenant.settings", module: "tenant", description: "Edit tenant settings" },
    PermissionSpec { code: "platform.admin", module: "platform", description: "Operate across tenants" },
];

pub fn is_known(code: &str) -> bool {
    code == "*" || CATALOG.iter().any(|p| p.code == code)
}
