use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Email not configured. Missing: {}", .0.join(", "))]
    EmailNotConfigured(Vec<String>),

    #[error("Invalid email(s): {}", .0.join(", "))]
    InvalidRecipients(Vec<String>),

    #[error("SMTP verify failed: {0}")]
    TransportVerifyFailed(String),

    #[error("Email delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Exchange rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("PDF generation failed: {0}")]
    PdfError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::DeliveryFailed(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::InvalidRecipients(vec![err.to_string()])
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::BAD_REQUEST,
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string(), None),
            err @ AppError::EmailNotConfigured(_) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None)
            }
            err @ AppError::InvalidRecipients(_) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None)
            }
            err @ AppError::TransportVerifyFailed(_) => {
                (StatusCode::BAD_GATEWAY, err.to_string(), None)
            }
            err @ AppError::DeliveryFailed(_) => (StatusCode::BAD_GATEWAY, err.to_string(), None),
            err @ AppError::UnsupportedCurrency(_) => {
                (StatusCode::BAD_REQUEST, err.to_string(), None)
            }
            err @ AppError::RateUnavailable(_) => (StatusCode::BAD_GATEWAY, err.to_string(), None),
            AppError::PdfError(err) => {
                tracing::error!(error = %err, "PDF generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PDF generation failed".to_string(),
                    None,
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                    None,
                )
            }
            AppError::InvalidToken(err) => (
                StatusCode::UNAUTHORIZED,
                "Invalid token".to_string(),
                Some(err.to_string()),
            ),
            AppError::InternalError(err) => {
                // Internals are logged server-side, never returned to the caller.
                tracing::error!(error = ?err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response()
    }
}
