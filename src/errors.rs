use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

pub const LOGIN_PAGE: &str = "/login.html";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("tenant not found")]
    TenantNotFound { redirect: String },
    #[error("tenant account is inactive")]
    TenantInactive { redirect: String },
    #[error("not authorized for this tenant")]
    TenantMismatch { redirect: String },
    #[error("access denied: not authorized")]
    InsufficientPermission { redirect: String },
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the database rejected a write because of a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            AppError::Conflict(_) => true,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TenantNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::TenantInactive { .. } => StatusCode::FORBIDDEN,
            AppError::TenantMismatch { .. } => StatusCode::FORBIDDEN,
            AppError::InsufficientPermission { .. } => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthenticated",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::TenantNotFound { .. } => "tenant_not_found",
            AppError::TenantInactive { .. } => "tenant_inactive",
            AppError::TenantMismatch { .. } => "tenant_mismatch",
            AppError::InsufficientPermission { .. } => "insufficient_permission",
            AppError::MethodNotAllowed => "method_not_allowed",
            AppError::Configuration(_) => "configuration",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    /// Where the client should be sent after this failure, if anywhere.
    fn redirect(&self) -> Option<String> {
        match self {
            AppError::Unauthorized(_) => Some(LOGIN_PAGE.to_string()),
            AppError::TenantNotFound { redirect }
            | AppError::TenantInactive { redirect }
            | AppError::TenantMismatch { redirect }
            | AppError::InsufficientPermission { redirect } => Some(redirect.clone()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    logout: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let payload = ErrorResponse {
            success: false,
            error: self.code().to_string(),
            message: self.to_string(),
            redirect: self.redirect(),
            logout: matches!(self, AppError::TenantMismatch { .. }),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
