//! Event persistence for collected market data.
//!
//! Uses JSON Lines format (.jsonl) for robustness: each line is a
//! complete JSON object, so an interrupted write corrupts at most one
//! line and partial files remain readable.

pub mod error;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use writer::EventWriter;
