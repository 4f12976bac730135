use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use backoffice_auth::Principal;
use backoffice_core::{TenantId, UserId};
use backoffice_tenancy::TenantContext;

use crate::app::dto::Envelope;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    pub user_id: UserId,
    pub email: String,
    /// Tenant the access token was issued for.
    pub home_tenant_id: TenantId,
    /// Tenant this request was resolved to.
    pub tenant_id: TenantId,
    pub tenant_slug: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
) -> Json<Envelope<WhoAmI>> {
    Json(Envelope::data(WhoAmI {
        user_id: principal.user_id,
        email: principal.email,
        home_tenant_id: principal.tenant_id,
        tenant_id: tenant.tenant_id(),
        tenant_slug: tenant.slug().map(str::to_string),
        roles: principal.roles.iter().map(|r| r.as_str().to_string()).collect(),
        permissions: principal.permissions.iter().map(|p| p.as_str().to_string()).collect(),
    }))
}
