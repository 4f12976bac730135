//! Receivables endpoints. Every figure is aged against the current clock.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    routing::get,
    Json, Router,
};

use backoffice_auth::Principal;
use backoffice_auth::permissions::AR_READ;
use backoffice_invoicing::{ArItem, ArSummary};
use backoffice_tenancy::TenantContext;

use crate::app::dto::{ArParams, Envelope};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require_permission;

pub fn router() -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/due-soon", get(due_soon))
        .route("/overdue", get(overdue))
        .route("/open-items", get(open_items))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ArParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<ArSummary>>> {
    require_permission(&tenant, &principal, &AR_READ)?;
    let Query(params) = params?;
    let summary = services.receivables.summary(&tenant, &params.ar_query()?).await?;
    Ok(Json(Envelope::data(summary)))
}

pub async fn due_soon(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ArParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<ArItem>>>> {
    require_permission(&tenant, &principal, &AR_READ)?;
    let Query(params) = params?;
    let items = services.receivables.due_soon(&tenant, &params.ar_query()?).await?;
    Ok(Json(Envelope::data(items)))
}

pub async fn overdue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ArParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<ArItem>>>> {
    require_permission(&tenant, &principal, &AR_READ)?;
    let Query(params) = params?;
    let items = services.receivables.overdue(&tenant, &params.ar_query()?).await?;
    Ok(Json(Envelope::data(items)))
}

pub async fn open_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<ArParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<ArItem>>>> {
    require_permission(&tenant, &principal, &AR_READ)?;
    let Query(params) = params?;
    let page = services
        .receivables
        .open_items(&tenant, &params.open_items_query()?)
        .await?;
    Ok(Json(Envelope::page(page)))
}
