//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] poly_ws::WsError),

    #[error("Gamma API error: {0}")]
    Gamma(#[from] poly_gamma::GammaError),

    #[error("Session error: {0}")]
    Session(#[from] poly_manager::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] poly_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] poly_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
