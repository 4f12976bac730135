//! Domain error model.
//!
//! Every fallible domain operation returns [`DomainResult`]. The boundary layer
//! maps [`ErrorKind`] onto transport status codes; nothing below it knows about
//! HTTP.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Caller-facing classification of a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Forbidden,
    Conflict,
    TenantMissing,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code carried in error envelopes.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TenantMissing => "tenant_missing",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// Domain-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, overpayment).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested resource does not exist within the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad or expired credentials/tokens.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (slug, email, invoice number, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stale version detected by an optimistic concurrency check.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// A tenant-required operation ran without a resolved tenant.
    #[error("tenant context is required")]
    TenantMissing,

    /// Anything unexpected. The message is for logs, never for callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Conflict(_) | DomainError::Concurrency(_) => ErrorKind::Conflict,
            DomainError::TenantMissing => ErrorKind::TenantMissing,
            DomainError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Message safe to show to a caller.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Validation(m)
            | DomainError::NotFound(m)
            | DomainError::Unauthorized(m)
            | DomainError::Forbidden(m)
            | DomainError::Conflict(m)
            | DomainError::Concurrency(m) => m.clone(),
            DomainError::TenantMissing => "tenant context is required".to_string(),
            DomainError::Internal(_) => "an unexpected error occurred".to_string(),
        }
    }

    /// Only optimistic-concurrency failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Concurrency(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::not_found("invoice").code(), "not_found");
        assert_eq!(DomainError::validation("x").code(), "validation_error");
        assert_eq!(DomainError::unauthorized("x").code(), "unauthorized");
        assert_eq!(DomainError::forbidden("x").code(), "forbidden");
        assert_eq!(DomainError::conflict("x").code(), "conflict");
        assert_eq!(DomainError::TenantMissing.code(), "tenant_missing");
        assert_eq!(DomainError::internal("boom").code(), "internal_error");
    }

    #[test]
    fn concurrency_is_a_retryable_conflict() {
        let err = DomainError::concurrency("stale");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable());
        assert!(!DomainError::conflict("dup").is_retryable());
    }

    #[test]
    fn internal_details_are_not_public() {
        let err = DomainError::internal("pool timed out on 10.0.0.3");
        assert!(!err.public_message().contains("10.0.0.3"));
    }
}
