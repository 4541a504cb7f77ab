//! Order book event records for the Polymarket CLOB market feed.
//!
//! Defines the canonical record types pushed over the market WebSocket
//! (full book snapshots and incremental price changes) and the frame
//! parser that normalizes the two wire shapes (single object vs array)
//! into ordered record batches.

pub mod error;
pub mod message;
pub mod parser;

pub use error::{FeedError, FeedResult};
pub use message::{
    BookSnapshot, MarketMessage, PriceChange, PriceChangeBatch, PriceLevel, SubscribeRequest,
    EVENT_TYPE_BOOK, EVENT_TYPE_PRICE_CHANGE,
};
pub use parser::parse_frame;
