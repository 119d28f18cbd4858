use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the HTTP handlers. Each maps to a status code and a
/// `{"error": ...}` body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing videoId or url")]
    MissingInput,

    #[error("{0}")]
    InvalidInput(String),

    #[error("No suitable format")]
    NoSuitableFormat,

    /// Last error reported by the extractor once every attempt has failed.
    #[error("{0}")]
    Extraction(String),

    #[error("Route not found")]
    RouteNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NoSuitableFormat | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Extraction(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidInput("Invalid videoId: x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::NoSuitableFormat.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Extraction("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_extraction_message_is_passed_through() {
        let err = ApiError::Extraction("ERROR: [youtube] abc: Video unavailable".into());
        assert_eq!(err.to_string(), "ERROR: [youtube] abc: Video unavailable");
    }
}
