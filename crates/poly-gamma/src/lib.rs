//! Client for the Polymarket Gamma API.
//!
//! The Gamma API is the discovery collaborator: given a series slug it
//! answers which markets are currently tradeable, applying per-recurrence
//! trading-window estimation and an early-start buffer.

pub mod client;
pub mod error;
pub mod types;

pub use client::{window_for_recurrence, GammaClient, DEFAULT_BASE_URL};
pub use error::{GammaError, GammaResult};
pub use types::{Event, Filter, Market, Series, Tag};
