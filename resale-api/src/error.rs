use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use resale_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Core(err) => match err {
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
                CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
                CoreError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string(), None),
                CoreError::InsufficientCodes { app_id, requested, available } => (
                    StatusCode::CONFLICT,
                    err.to_string(),
                    Some(json!({
                        "app_id": app_id,
                        "requested": requested,
                        "available": available,
                    })),
                ),
                CoreError::Storage(msg) => {
                    tracing::error!("Storage failure: {}", msg);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
                }
            },
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
        };

        let body = match details {
            Some(details) => json!({ "error": error_message, "details": details }),
            None => json!({ "error": error_message }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::Conflict("x".into()), StatusCode::CONFLICT),
            (CoreError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (CoreError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                CoreError::InsufficientCodes { app_id: Uuid::nil(), requested: 2, available: 1 },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
