use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Request failures of the HTTP receiver, rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
