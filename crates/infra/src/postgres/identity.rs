use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use backoffice_auth::{IdentityStore, RefreshToken, RoleGrant, UserAccount};
use backoffice_core::{DomainError, DomainResult, UserId};
use backoffice_tenancy::{PlatformBypass, RequestScope, TenantContext};

use super::rows::{REFRESH_COLUMNS, RefreshTokenRow, USER_COLUMNS, UserRow, decode};
use super::{PgStore, map_sqlx_error};

impl PgStore {
    async fn insert_refresh_row<'e, E>(&self, executor: E, token: &RefreshToken) -> DomainResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, tenant_id, user_id, token_hash, expires_at, revoked_at, replaced_by_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.tenant_id()?.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(&token.replaced_by_hash)
        .bind(token.created_at)
        .execute(executor)
        .await
        .map_err(|e| map_sqlx_error("insert_refresh_token", e))?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_user_by_email(
        &self,
        tenant: &TenantContext,
        email: &str,
    ) -> DomainResult<Option<UserAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND email = $2"
        ))
        .bind(tenant.tenant_id().as_uuid())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_domain))
            .transpose()
    }

    async fn find_user(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Option<UserAccount>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2"))
            .bind(tenant.tenant_id().as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_domain))
            .transpose()
    }

    async fn role_grants(&self, tenant: &TenantContext, user_id: UserId) -> DomainResult<Vec<RoleGrant>> {
        let rows = sqlx::query(
            r#"
            SELECT r.name AS role, p.code AS permission
            FROM user_roles ur
            JOIN roles r ON r.tenant_id = ur.tenant_id AND r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.tenant_id = r.tenant_id AND rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.tenant_id = $1 AND ur.user_id = $2
            "#,
        )
        .bind(tenant.tenant_id().as_uuid())
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_grants", e))?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let role: String = row.try_get("role").map_err(|e| map_sqlx_error("role_grants", e))?;
            let permission: Option<String> =
                row.try_get("permission").map_err(|e| map_sqlx_error("role_grants", e))?;
            grouped.entry(role).or_default().extend(permission);
        }
        Ok(grouped
            .into_iter()
            .map(|(role, permissions)| RoleGrant { role, permissions })
            .collect())
    }

    async fn record_login(&self, scope: &RequestScope, user_id: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut user = self
            .find_user(scope.tenant(), user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user not found"))?;
        self.stamper.on_update(scope, &mut user)?;

        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = $3, updated_at = $4, updated_by = $5
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(scope.tenant_id().as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .bind(user.audit.updated_at)
        .bind(user.audit.updated_by.map(|u| *u.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_login", e))?;
        Ok(())
    }

    async fn insert_refresh_token(&self, scope: &RequestScope, mut token: RefreshToken) -> DomainResult<()> {
        self.stamper.on_insert(scope, &mut token)?;
        self.insert_refresh_row(&self.pool, &token).await
    }

    async fn find_refresh_token(
        &self,
        _bypass: &PlatformBypass,
        token_hash: &str,
    ) -> DomainResult<Option<RefreshToken>> {
        let row = sqlx::query(&format!("SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"))
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_refresh_token", e))?;
        row.map(|r| decode::<RefreshTokenRow>(&r).map(RefreshTokenRow::into_domain))
            .transpose()
    }

    async fn rotate_refresh_token(
        &self,
        scope: &RequestScope,
        presented_hash: &str,
        mut replacement: RefreshToken,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.stamper.on_insert(scope, &mut replacement)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Only a live token can be consumed; a concurrent rotation loses here.
        let consumed = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $3, replaced_by_hash = $4
            WHERE tenant_id = $1 AND token_hash = $2 AND revoked_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(scope.tenant_id().as_uuid())
        .bind(presented_hash)
        .bind(at)
        .bind(&replacement.token_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("consume_refresh_token", e))?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::unauthorized("invalid refresh token"));
        }

        self.insert_refresh_row(&mut *tx, &replacement).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn revoke_refresh_token(
        &self,
        _bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = COALESCE(revoked_at, $2) WHERE token_hash = $1",
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke_refresh_token", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_refresh_chain(
        &self,
        _bypass: &PlatformBypass,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<usize> {
        let result = sqlx::query(
            r#"
            WITH RECURSIVE chain(token_hash, replaced_by_hash) AS (
                SELECT token_hash, replaced_by_hash FROM refresh_tokens WHERE token_hash = $1
                UNION
                SELECT t.token_hash, t.replaced_by_hash
                FROM refresh_tokens t
                JOIN chain c ON t.token_hash = c.replaced_by_hash
            )
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_hash IN (SELECT token_hash FROM chain) AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke_refresh_chain", e))?;
        Ok(result.rows_affected() as usize)
    }
}

