//! Gamma client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GammaError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    #[error("Token id decode error: {0}")]
    TokenIds(#[source] serde_json::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GammaResult<T> = Result<T, GammaError>;
