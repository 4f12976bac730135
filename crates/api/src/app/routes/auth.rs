use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use backoffice_auth::LoginRequest;
use backoffice_tenancy::TenantContext;

use crate::app::dto::{Envelope, RefreshRequest, TokensResponse};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

/// Tenant comes from the resolved request tenant, else `tenantSlug`.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    tenant: Option<Extension<TenantContext>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<TokensResponse>>> {
    let Json(body) = payload?;
    let resolved = tenant.map(|Extension(t)| t);
    let outcome = services.sessions.login(body, resolved.as_ref()).await?;
    Ok(Json(Envelope::data(TokensResponse::new(outcome.tokens, Some(outcome.user)))))
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<TokensResponse>>> {
    let Json(body) = payload?;
    let tokens = services.sessions.refresh(&body.refresh_token).await?;
    Ok(Json(Envelope::data(TokensResponse::new(tokens, None))))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedOut {
    pub logged_out: bool,
}

/// Always succeeds for a well-formed body; never reveals whether the token existed.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<LoggedOut>>> {
    let Json(body) = payload?;
    services.sessions.logout(&body.refresh_token).await?;
    Ok(Json(Envelope::data(LoggedOut { logged_out: true })))
}
