//! Session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No token ids for market {0}")]
    NoTokenIds(String),

    #[error("Market {0} has no end date")]
    MissingEndDate(String),

    #[error("Token id decode failed for market {market_id}: {source}")]
    TokenIds {
        market_id: String,
        #[source]
        source: poly_gamma::GammaError,
    },

    #[error("Invalid session settings: {0}")]
    InvalidSettings(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] poly_ws::WsError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] poly_persistence::PersistenceError),
}

pub type SessionResult<T> = Result<T, SessionError>;
