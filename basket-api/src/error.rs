use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use basket_order::orchestrator::CheckoutError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Map orchestrator errors onto the HTTP taxonomy. A duplicate webhook
    /// never reaches here; the orchestrator reports it as success.
    pub fn checkout(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(msg) => AppError::ValidationError(msg),
            CheckoutError::NotFound(msg) => AppError::NotFoundError(msg),
            CheckoutError::Upstream(msg) => AppError::UpstreamError(msg),
            CheckoutError::InvalidTransition(e) => AppError::ConflictError(e.to_string()),
            CheckoutError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::error!("Payment processor failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment processor unavailable".to_string(),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "message": message,
            "error": true,
            "success": false,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
