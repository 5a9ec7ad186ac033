use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::catalog::CatalogError;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced series or season is not the caller's, or does not exist.
    #[error("Not owned: {0}")]
    NotOwned(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Catalog returned a malformed payload: {0}")]
    CatalogMalformed(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unavailable(msg) => AppError::CatalogUnavailable(msg),
            CatalogError::Malformed(msg) => AppError::CatalogMalformed(msg),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::NotOwned(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::CatalogUnavailable(_)
            | AppError::CatalogMalformed(_)
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::InvalidInput(msg)
            | AppError::NotOwned(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg)
            | AppError::CatalogUnavailable(msg)
            | AppError::CatalogMalformed(msg) => msg.clone(),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database failure");
                self.to_string()
            }
            AppError::HttpClient(_) | AppError::Internal(_) => self.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotOwned("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::CatalogMalformed("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_catalog_error_conversion() {
        let err: AppError = CatalogError::Unavailable("timeout".into()).into();
        assert!(matches!(err, AppError::CatalogUnavailable(msg) if msg == "timeout"));

        let err: AppError = CatalogError::Malformed("bad json".into()).into();
        assert!(matches!(err, AppError::CatalogMalformed(_)));
    }
}
