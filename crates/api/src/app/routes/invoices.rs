use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use backoffice_auth::Principal;
use backoffice_auth::permissions::{INVOICES_READ, INVOICES_WRITE, PAYMENTS_WRITE};
use backoffice_core::InvoiceId;
use backoffice_tenancy::TenantContext;

use crate::app::dto::{
    CreateInvoiceRequest, Envelope, InvoiceListParams, InvoiceResponse, PaymentResponse,
    RegisterPaymentRequest,
};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::request_scope;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(register_payment))
        .route("/:id/mark-paid", post(mark_paid))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateInvoiceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<InvoiceResponse>>)> {
    require_permission(&tenant, &principal, &INVOICES_WRITE)?;
    let Json(body) = payload?;

    let invoice = services
        .invoices
        .create_invoice(&request_scope(&tenant, &principal), body.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(InvoiceResponse::detail(&invoice))),
    ))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    params: Result<Query<InvoiceListParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<InvoiceResponse>>>> {
    require_permission(&tenant, &principal, &INVOICES_READ)?;
    let Query(params) = params?;
    let (filter, page) = params.into_filter()?;

    let page = services.invoices.list_invoices(&tenant, &filter, page).await?;
    Ok(Json(Envelope::page(page.map(|invoice| InvoiceResponse::summary(&invoice)))))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<InvoiceId>, PathRejection>,
) -> ApiResult<Json<Envelope<InvoiceResponse>>> {
    require_permission(&tenant, &principal, &INVOICES_READ)?;
    let Path(id) = id?;

    let invoice = services.invoices.get_invoice(&tenant, id).await?;
    Ok(Json(Envelope::data(InvoiceResponse::detail(&invoice))))
}

pub async fn register_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<InvoiceId>, PathRejection>,
    payload: Result<Json<RegisterPaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<PaymentResponse>>)> {
    require_permission(&tenant, &principal, &PAYMENTS_WRITE)?;
    let Path(id) = id?;
    let Json(body) = payload?;

    let receipt = services
        .invoices
        .register_payment(&request_scope(&tenant, &principal), id, body.into())
        .await?;

    Ok((StatusCode::CREATED, Json(Envelope::data(receipt.into()))))
}

pub async fn mark_paid(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<InvoiceId>, PathRejection>,
) -> ApiResult<Json<Envelope<InvoiceResponse>>> {
    require_permission(&tenant, &principal, &PAYMENTS_WRITE)?;
    let Path(id) = id?;

    let invoice = services
        .invoices
        .mark_paid(&request_scope(&tenant, &principal), id)
        .await?;
    Ok(Json(Envelope::data(InvoiceResponse::detail(&invoice))))
}
