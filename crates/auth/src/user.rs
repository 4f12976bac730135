//! Tenant-scoped user accounts.
//!
//! Users are never deleted, only deactivated.

use chrono::{DateTime, Utc};
use serde::Serialize;

use backoffice_core::{Audited, DomainError, DomainResult, Stampable, TenantScoped, UserId};

use crate::UserGrants;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub tenant: TenantScoped,
    pub name: String,
    /// Always stored normalized (see [`normalize_email`]).
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub audit: Audited,
}

impl UserAccount {
    pub fn new(
        name: impl Into<String>,
        email: &str,
        password_hash: impl Into<String>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("user name is required"));
        }
        let email = normalize_email(email);
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(DomainError::validation("a valid email is required"));
        }
        Ok(Self {
            id: UserId::new(),
            tenant: TenantScoped::unassigned(),
            name: name.trim().to_string(),
            email,
            password_hash: password_hash.into(),
            is_active: true,
            last_login_at: None,
            audit: Audited::default(),
        })
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn summary(&self, grants: &UserGrants) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            roles: grants.roles.clone(),
            permissions: grants.permissions.clone(),
        }
    }
}

impl Stampable for UserAccount {
    fn tenant_scope_mut(&mut self) -> &mut TenantScoped {
        &mut self.tenant
    }

    fn audit_mut(&mut self) -> Option<&mut Audited> {
        Some(&mut self.audit)
    }
}

/// Trim + lowercase.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Public view of a user returned at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}
