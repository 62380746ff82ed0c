use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::models::{RepositoryError, ServiceError};

/// Handler error type shared by the public and admin routers
pub type ApiError = (StatusCode, Json<Value>);

/// Convert ServiceError to HTTP response
pub fn service_error_to_response(err: ServiceError) -> ApiError {
    let (status, message) = match err {
        ServiceError::UserNotFound { .. }
        | ServiceError::DishNotFound { .. }
        | ServiceError::RestaurantNotFound { .. }
        | ServiceError::OrderNotFound { .. }
        | ServiceError::InvalidPage { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::ValidationError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::EmptyCart { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        ServiceError::CartNotDraft { .. } | ServiceError::CartModified { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        ServiceError::DuplicateUser { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::OrderCreationFailed { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Order could not be created, please try again".to_string(),
        ),
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => {
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
            RepositoryError::ConstraintViolation { .. } | RepositoryError::DuplicateKey { .. } => {
                (StatusCode::CONFLICT, source.to_string())
            }
            RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            RepositoryError::TableNotFound { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database tables are not set up".to_string(),
            ),
            RepositoryError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "Request timeout".to_string())
            }
            RepositoryError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
    };

    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// 400 for query strings the handlers parse themselves
pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message.into(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
