use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("BackendError: {0}")]
    Backend(String),
    #[error("SerializationError: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("VersionExhausted: no version follows {0}")]
    VersionExhausted(u64),
    #[error("MalformedSnapshot: {0}")]
    Malformed(String),
}

impl From<libsql::Error> for StoreError {
    fn from(error: libsql::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

pub const STORE_UNAVAILABLE: &str = "Bookmark store unavailable";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("NotAuthorized")]
    NotAuthorized,
    #[error("BadRequest: {0}")]
    BadRequest(String),
    #[error("NotFound: {0}")]
    NotFound(String),
    #[error("Unprocessable: {0}")]
    Unprocessable(String),
    #[error("StoreUnavailable: {}", crate::unpack_error(.0))]
    StoreUnavailable(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            NotAuthorized => StatusCode::UNAUTHORIZED,
            BadRequest(_) => StatusCode::BAD_REQUEST,
            NotFound(_) => StatusCode::NOT_FOUND,
            Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use AppError::*;
        let message = match &self {
            NotAuthorized => "Unauthorized".to_string(),
            BadRequest(msg) | NotFound(msg) | Unprocessable(msg) => msg.clone(),
            StoreUnavailable(e) => {
                tracing::error!(error = %crate::unpack_error(e), "bookmark store unavailable");
                STORE_UNAVAILABLE.to_string()
            }
        };

        (self.status(), Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotAuthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::BadRequest("missing id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::StoreUnavailable(StoreError::Backend("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_unavailable_display_includes_cause() {
        let err = AppError::from(StoreError::Backend("connection reset".into()));
        assert!(err.to_string().contains("connection reset"));
    }
}
