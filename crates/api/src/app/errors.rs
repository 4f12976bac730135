use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use backoffice_auth::AuthzError;
use backoffice_core::{DomainError, ErrorKind};

/// Boundary error: a [`DomainError`] rendered as the error envelope.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    data: Option<()>,
    errors: Vec<ErrorBody>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation | ErrorKind::TenantMissing => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        if kind == ErrorKind::Internal {
            // Runs inside the request span, so the correlation id is attached.
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorEnvelope {
            data: None,
            errors: vec![ErrorBody {
                code: kind.code(),
                message: self.0.public_message(),
            }],
        };
        (status_for(kind), Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        Self(value)
    }
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        Self(value.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(DomainError::validation(value.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        Self(DomainError::validation(value.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        Self(DomainError::validation(value.body_text()))
    }
}
