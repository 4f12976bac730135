//! Postgres-backed store.
//!
//! Every tenant-owned table carries `tenant_id` and every query in this module
//! filters on it, except the refresh-token lookups that take a
//! [`PlatformBypass`](backoffice_tenancy::PlatformBypass).
//!
//! ## Tables
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `tenants` | `id` | `slug` unique |
//! | `tenant_settings` | `tenant_id` | carries `invoice_sequence` |
//! | `permissions` | `id` | global catalog, `code` unique |
//! | `users` | `(tenant_id, id)` | `(tenant_id, email)` unique |
//! | `roles`, `role_permissions`, `user_roles` | `(tenant_id, ...)` | |
//! | `refresh_tokens` | `id` | `token_hash` unique |
//! | `products`, `customers` | `(tenant_id, id)` | |
//! | `invoices` | `(tenant_id, id)` | `(tenant_id, number)` unique, `version` for optimistic writes |
//! | `invoice_items`, `payments`, `inventory_movements` | `(tenant_id, id)` | |
//!
//! The schema lives in `migrations/0001_init.sql` and is applied by
//! [`PgStore::migrate`].
//!
//! ## Error mapping
//!
//! | SQLx error | Code | `DomainError` |
//! |------------|------|---------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Internal` |
//! | PoolClosed / other | n/a | `Internal` |

mod identity;
mod invoicing;
mod rows;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use backoffice_auth::permissions::CATALOG;
use backoffice_core::{Clock, DomainError, DomainResult, TenantId};
use backoffice_tenancy::{AuditStamper, Tenant, TenantContext, TenantLookup, TenantSettings, TenantSettingsSource};

use rows::{SettingsRow, TenantRow, decode};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    stamper: AuditStamper,
}

impl PgStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            stamper: AuditStamper::new(clock),
        }
    }

    pub async fn connect(url: &str, max_connections: u32, clock: Arc<dyn Clock>) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!(max_connections, "postgres pool ready");
        Ok(Self::new(pool, clock))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates missing tables and seeds the global permission catalog.
    /// Safe to run on every start.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;

        let codes = std::iter::once(("*", "platform", "Every tenant-local permission"))
            .chain(CATALOG.iter().map(|p| (p.code, p.module, p.description)));
        for (code, module, description) in codes {
            sqlx::query(
                "INSERT INTO permissions (id, code, module, description) VALUES ($1, $2, $3, $4) ON CONFLICT (code) DO NOTHING",
            )
            .bind(uuid::Uuid::now_v7())
            .bind(code)
            .bind(module)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("seed_permissions", e))?;
        }
        tracing::info!(permissions = CATALOG.len() + 1, "schema ready");
        Ok(())
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::conflict(format!("{operation}: duplicate record")),
                _ => {
                    tracing::error!(operation, error = %msg, "database error");
                    DomainError::internal(msg)
                }
            }
        }
        sqlx::Error::PoolClosed => DomainError::internal(format!("connection pool closed in {operation}")),
        other => {
            tracing::error!(operation, error = %other, "sqlx error");
            DomainError::internal(format!("sqlx error in {operation}: {other}"))
        }
    }
}

#[async_trait]
impl TenantLookup for PgStore {
    async fn find_tenant_by_slug(&self, slug: &str) -> DomainResult<Option<Tenant>> {
        let row = sqlx::query("SELECT id, name, slug, status, created_at FROM tenants WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_slug", e))?;
        row.map(|r| decode::<TenantRow>(&r)?.into_domain()).transpose()
    }

    async fn find_tenant(&self, tenant_id: TenantId) -> DomainResult<Option<Tenant>> {
        let row = sqlx::query("SELECT id, name, slug, status, created_at FROM tenants WHERE id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant", e))?;
        row.map(|r| decode::<TenantRow>(&r)?.into_domain()).transpose()
    }
}

#[async_trait]
impl TenantSettingsSource for PgStore {
    async fn tenant_settings(&self, tenant: &TenantContext) -> DomainResult<TenantSettings> {
        let row = sqlx::query(
            r#"
            SELECT currency, timezone, default_credit_days, due_soon_threshold_days,
                   low_stock_threshold, invoice_numbering_format
            FROM tenant_settings
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.tenant_id().as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("tenant_settings", e))?;

        match row {
            Some(r) => decode::<SettingsRow>(&r)?.into_domain(),
            None => Ok(TenantSettings::default()),
        }
    }
}
