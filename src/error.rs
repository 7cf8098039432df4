use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::types::PlatformId;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{platform} timed out on {endpoint}")]
    AdapterTimeout {
        platform: PlatformId,
        endpoint: String,
    },

    #[error("{platform} unavailable on {endpoint}: {detail}")]
    AdapterUnavailable {
        platform: PlatformId,
        endpoint: String,
        detail: String,
    },

    #[error("orderbook fetch failed for {platform} market {external_id}: {detail}")]
    OrderbookFetch {
        platform: PlatformId,
        external_id: String,
        detail: String,
    },

    #[error("scan aborted")]
    ScanAborted,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AdapterTimeout { .. } | AppError::AdapterUnavailable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            AppError::ScanAborted => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
