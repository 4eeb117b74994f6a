// Error type shared by the upstream client and the HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Missing or empty query parameter
    #[error("{0}")]
    Validation(String),

    /// Upstream answered but the expected payload was not there
    #[error("{0}")]
    NotFound(String),

    /// Upstream returned a non-2xx status
    #[error("HTTP Hatası: {}", .0.as_u16())]
    Upstream(reqwest::StatusCode),

    #[error("Invalid upstream response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::Validation(msg) => tracing::debug!("Rejected request: {}", msg),
            ProxyError::NotFound(msg) => tracing::info!("Upstream has no data: {}", msg),
            other => tracing::warn!("Upstream call failed: {}", other),
        }

        // Every failure kind maps to the same client error status
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::failure(self.to_string())),
        )
            .into_response()
    }
}
