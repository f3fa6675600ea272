use crate::services::attachments::RegistrationError;
use crate::services::quota::QuotaError;
use crate::services::relocator::RelocationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const NOT_LOGGED_IN: &str = "Not logged in: API authentication or user session required";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("Uploaded file is larger than the allowed limit of {limit_mib} MiB")]
    SizeLimitExceeded { limit_mib: u64 },

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Unexpected hook.")]
    UnrecognizedHook,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("Relocation failed: {0}")]
    Relocation(#[from] RelocationError),

    #[error("Registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl AppError {
    pub fn not_logged_in() -> Self {
        AppError::Unauthenticated(NOT_LOGGED_IN.to_string())
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHORIZED",
            AppError::SizeLimitExceeded { .. } => "FILE_TOO_LARGE",
            AppError::QuotaExceeded(_) => "UPLOAD_QUOTA_EXCEEDED",
            AppError::UnrecognizedHook => "UNEXPECTED_HOOK",
            AppError::InvalidUpload(_) => "BAD_REQUEST",
            AppError::Relocation(_)
            | AppError::Registration(_)
            | AppError::Database(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Exceeded => AppError::QuotaExceeded(err.to_string()),
            QuotaError::Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::SizeLimitExceeded { .. }
            | AppError::UnrecognizedHook => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::QuotaExceeded(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidUpload(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Relocation(e) => {
                tracing::error!("Relocation error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Registration(e) => {
                tracing::error!("Registration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "result": "error",
            "msg": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
