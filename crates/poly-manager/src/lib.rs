//! Market session lifecycle and orchestration.
//!
//! A [`MarketSession`] couples one feed connection to one output file for
//! the life of a single market: from discovery until the market's end
//! time plus a grace period. The [`MarketManager`] discovers markets on a
//! cadence, holds the live-session registry, and reaps expired sessions.

pub mod config;
pub mod error;
pub mod manager;
pub mod session;

pub use config::{ManagerConfig, SeriesConfig, StorageConfig};
pub use error::{SessionError, SessionResult};
pub use manager::{MarketDiscovery, MarketManager};
pub use session::{MarketSession, SessionMetadata, SessionSettings};
