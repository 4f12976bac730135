use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, TenantId};

use crate::TenantContext;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            other => Err(DomainError::validation(format!("unknown tenant status '{other}'"))),
        }
    }
}

/// Tenant identity. Not itself tenant-scoped: tenants live in the platform catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: &str, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: TenantId::new(),
            name: name.into(),
            slug: normalize_slug(slug)?,
            status: TenantStatus::Active,
            created_at,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Lowercase, trim and validate a tenant slug (`[a-z0-9-]`, 2..=63 chars).
pub fn normalize_slug(raw: &str) -> DomainResult<String> {
    let slug = raw.trim().to_ascii_lowercase();
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !(2..=63).contains(&slug.len()) || !valid_chars || slug.starts_with('-') || slug.ends_with('-') {
        return Err(DomainError::validation(format!("invalid tenant slug '{raw}'")));
    }
    Ok(slug)
}

/// Per-tenant business settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub currency: String,
    pub timezone: String,
    pub default_credit_days: u16,
    pub due_soon_threshold_days: u32,
    pub low_stock_threshold: u32,
    pub invoice_numbering_format: String,
}

impl TenantSettings {
    pub const MIN_DUE_SOON_DAYS: u32 = 1;
    pub const MAX_DUE_SOON_DAYS: u32 = 30;

    /// The due-soon threshold actually applied to status derivation.
    pub fn due_soon_threshold(&self) -> u32 {
        self.due_soon_threshold_days
            .clamp(Self::MIN_DUE_SOON_DAYS, Self::MAX_DUE_SOON_DAYS)
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            currency: "COP".to_string(),
            timezone: "America/Bogota".to_string(),
            default_credit_days: 15,
            due_soon_threshold_days: 5,
            low_stock_threshold: 5,
            invoice_numbering_format: "FAC-{0000}".to_string(),
        }
    }
}

/// Read access to the settings of the current tenant.
#[async_trait]
pub trait TenantSettingsSource: Send + Sync {
    /// Falls back to [`TenantSettings::default`] when nothing is stored.
    async fn tenant_settings(&self, tenant: &TenantContext) -> DomainResult<TenantSettings>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_normalized_and_checked() {
        assert_eq!(normalize_slug("  Demo-Shop ").unwrap(), "demo-shop");
        assert!(normalize_slug("a").is_err());
        assert!(normalize_slug("no spaces").is_err());
        assert!(normalize_slug("-edge").is_err());
    }

    #[test]
    fn threshold_is_clamped_when_applied() {
        let mut settings = TenantSettings::default();
        assert_eq!(settings.due_soon_threshold(), 5);
        settings.due_soon_threshold_days = 0;
        assert_eq!(settings.due_soon_threshold(), 1);
        settings.due_soon_threshold_days = 90;
        assert_eq!(settings.due_soon_threshold(), 30);
    }
}
