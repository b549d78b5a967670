// src/errors.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::EligibilityFailure;

#[derive(Debug, Error)]
pub enum AppError {
    // Database errors
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Auth errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Access denied: {0} belongs to another tenant")]
    CrossTenant(String),

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Business logic errors
    #[error("Operation not allowed: {0}")]
    DomainState(String),

    #[error("Rule violated: {0}")]
    DomainRule(String),

    #[error("Not eligible for early wage access")]
    EligibilityFailed(Vec<EligibilityFailure>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Concurrency error: {0}")]
    Concurrency(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::Concurrency(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::CrossTenant(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_)
            | AppError::DomainState(_)
            | AppError::DomainRule(_)
            | AppError::EligibilityFailed(_)
            | AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error kind returned to clients
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
            AppError::NotFound(_) => "reference_error",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized(_) | AppError::InvalidToken => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::CrossTenant(_) => "cross_tenant_error",
            AppError::Validation(_) => "validation_error",
            AppError::DomainState(_) => "domain_state_error",
            AppError::DomainRule(_) | AppError::EligibilityFailed(_) => "domain_rule_error",
            AppError::Config(_) => "config_error",
            AppError::Concurrency(_) => "concurrency_error",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => {
                    return AppError::Conflict(
                        db_err
                            .constraint()
                            .map(|c| format!("unique constraint '{}' violated", c))
                            .unwrap_or_else(|| db_err.message().to_string()),
                    );
                }
                // lock_not_available, query_canceled (statement/lock timeout)
                Some("55P03") | Some("57014") => {
                    return AppError::Concurrency(db_err.message().to_string());
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::Concurrency("transaction exceeded its time budget".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let mut error = json!({
            "code": status.as_u16(),
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let AppError::EligibilityFailed(failures) = &self {
            error["details"] = json!(failures);
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

// Convenience alias
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_bad_request() {
        for err in [
            AppError::DomainState("run is paid".into()),
            AppError::DomainRule("over cap".into()),
            AppError::Config("no bands".into()),
            AppError::Validation("negative".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_cross_tenant_is_forbidden_not_missing() {
        let err = AppError::CrossTenant("Payroll run".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), "cross_tenant_error");
        assert_eq!(
            AppError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_conflicts_and_auth() {
        assert_eq!(
            AppError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::Concurrency("lock".into()).kind(), "concurrency_error");
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_eligibility_failure_body_lists_checks() {
        let err = AppError::EligibilityFailed(vec![EligibilityFailure::TenureTooShort {
            months: 1,
            required: 3,
        }]);
        assert_eq!(err.kind(), "domain_rule_error");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
