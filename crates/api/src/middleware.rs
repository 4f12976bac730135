//! Request pipeline, outermost first:
//!
//! 1. [`correlation`]: correlation id + request span
//! 2. [`authenticate`]: optional bearer token; a bad one leaves the request anonymous
//! 3. [`resolve_tenant`]: at most one tenant per request, never cached
//! 4. [`require_principal`] / [`require_tenant`]: gates on tenant-required routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use backoffice_auth::{Principal, ensure_tenant_access};
use backoffice_core::DomainError;
use backoffice_tenancy::{ResolutionRequest, TenantContext};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::CorrelationId;

pub async fn correlation(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CorrelationId::HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let span = backoffice_observability::tracing::request_span(&id, req.method().as_str(), req.uri().path());
    req.extensions_mut().insert(CorrelationId(id.clone()));

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(CorrelationId::HEADER, value);
    }
    response
}

/// Why the presented credentials were ignored. Surfaced by
/// [`require_principal`] so protected routes still report the cause.
#[derive(Debug, Clone)]
struct RejectedCredentials(DomainError);

/// Never short-circuits. A stale or malformed bearer leaves the request
/// anonymous; [`require_principal`] turns that into 401 where a principal is needed.
pub async fn authenticate(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let verified = match extract_bearer(req.headers()) {
        Ok(None) => return next.run(req).await,
        Ok(Some(token)) => services.tokens.validate_access_token(token),
        Err(e) => Err(e.0),
    };

    match verified {
        Ok(claims) => {
            let principal = Principal::from_claims(&claims);
            tracing::Span::current().record("user_id", tracing::field::display(principal.user_id));
            req.extensions_mut().insert(principal);
        }
        Err(e) => {
            tracing::debug!(error = %e, "bearer token ignored");
            req.extensions_mut().insert(RejectedCredentials(e));
        }
    }

    next.run(req).await
}

pub async fn resolve_tenant(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    // Owned copies: the request body is not `Sync`, so no borrow of `req`
    // may live across the lookup.
    let config = services.resolver.config();
    let tenant_id_header = header_string(req.headers(), &config.tenant_id_header);
    let tenant_slug_header = header_string(req.headers(), &config.tenant_slug_header);
    let host = header_string(req.headers(), header::HOST.as_str());
    let claim_tenant_id = req.extensions().get::<Principal>().map(|p| p.tenant_id);

    let resolved = services
        .resolver
        .resolve(ResolutionRequest {
            tenant_id_header: tenant_id_header.as_deref(),
            tenant_slug_header: tenant_slug_header.as_deref(),
            host: host.as_deref(),
            claim_tenant_id,
        })
        .await;

    match resolved {
        Ok(Some(tenant)) => {
            tracing::Span::current().record("tenant_id", tracing::field::display(tenant.tenant_id()));
            req.extensions_mut().insert(tenant);
        }
        Ok(None) => {}
        Err(e) => return ApiError(e).into_response(),
    }

    next.run(req).await
}

pub async fn require_principal(req: Request, next: Next) -> Response {
    if req.extensions().get::<Principal>().is_none() {
        let error = req
            .extensions()
            .get::<RejectedCredentials>()
            .map_or_else(|| DomainError::unauthorized("authentication required"), |r| r.0.clone());
        return ApiError(error).into_response();
    }
    next.run(req).await
}

/// Tenant-required gate. A principal may only act inside its own tenant
/// unless it holds `platform.admin`.
pub async fn require_tenant(req: Request, next: Next) -> Response {
    let Some(tenant) = req.extensions().get::<TenantContext>() else {
        return ApiError(DomainError::TenantMissing).into_response();
    };
    if let Some(principal) = req.extensions().get::<Principal>() {
        if let Err(e) = ensure_tenant_access(principal, tenant.tenant_id()) {
            tracing::info!(
                tenant_id = %tenant.tenant_id(),
                user_id = %principal.user_id,
                "principal rejected for foreign tenant"
            );
            return ApiError::from(e).into_response();
        }
    }
    next.run(req).await
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// `Ok(None)` when no `Authorization` header is present at all.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let invalid = || ApiError(DomainError::unauthorized("invalid authorization header"));

    let header = header.to_str().map_err(|_| invalid())?;
    let token = header.strip_prefix("Bearer ").ok_or_else(invalid)?.trim();
    if token.is_empty() {
        return Err(invalid());
    }
    Ok(Some(token))
}
