//! WebSocket client for the Polymarket CLOB market feed.
//!
//! Provides one live connection per client with:
//! - Automatic reconnection with exponential backoff
//! - Desired-subscription replay after every reconnect
//! - One read loop per connection generation delivering parsed batches
//!   to a registered handler callback

pub mod client;
pub mod error;

pub use client::{ConnectionState, FeedClient, MessageHandler, ReconnectConfig, DEFAULT_WS_URL};
pub use error::{WsError, WsResult};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
