//! Wire message types for the CLOB market feed.
//!
//! The feed pushes JSON records tagged by an `event_type` field. Two tags
//! are understood today ("book" and "price_change"); anything else is kept
//! opaque so new server-side event types survive a round trip to disk.
//!
//! Prices and sizes stay `String` exactly as received. The collector
//! records the feed, it does not do arithmetic on it.

use serde::{Deserialize, Serialize};

/// Event type tag for a full order book snapshot.
pub const EVENT_TYPE_BOOK: &str = "book";

/// Event type tag for incremental price level changes.
pub const EVENT_TYPE_PRICE_CHANGE: &str = "price_change";

/// Subscription control message sent to the feed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl SubscribeRequest {
    pub fn new(assets_ids: Vec<String>) -> Self {
        Self {
            assets_ids,
            channel: None,
        }
    }
}

/// A single price level in an order book ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: String,
    pub size: String,
}

/// A single incremental price level change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChange {
    pub asset_id: String,
    pub price: String,
    pub size: String,
    /// "BUY" or "SELL".
    pub side: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub best_bid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub best_ask: String,
}

/// Full order book snapshot for one asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    #[serde(default)]
    pub market: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bids: Vec<PriceLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asks: Vec<PriceLevel>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_trade_price: String,
}

/// Batch of price level changes for one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceChangeBatch {
    #[serde(default)]
    pub market: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_changes: Vec<PriceChange>,
}

/// Canonical event record received from the feed.
///
/// Internally tagged on `event_type`; records with an unknown tag fall
/// through to [`MarketMessage::Other`] and are preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MarketMessage {
    Book(BookSnapshot),
    PriceChange(PriceChangeBatch),
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl MarketMessage {
    /// Event type tag of this record, if known.
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Self::Book(_) => Some(EVENT_TYPE_BOOK),
            Self::PriceChange(_) => Some(EVENT_TYPE_PRICE_CHANGE),
            Self::Other(value) => value.get("event_type").and_then(|v| v.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_request_wire_shape() {
        let req = SubscribeRequest::new(vec!["token1".to_string(), "token2".to_string()]);
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire, json!({"assets_ids": ["token1", "token2"]}));
    }

    #[test]
    fn test_book_round_trip_keeps_ladders() {
        let msg: MarketMessage = serde_json::from_value(json!({
            "event_type": "book",
            "market": "0xabc",
            "asset_id": "token1",
            "timestamp": "1770358715148",
            "bids": [{"price": "0.68", "size": "1000"}],
            "asks": [{"price": "0.69", "size": "500"}],
            "last_trade_price": "0.310"
        }))
        .unwrap();

        let MarketMessage::Book(book) = &msg else {
            panic!("expected Book, got {msg:?}");
        };
        assert_eq!(book.bids[0].price, "0.68");
        assert_eq!(book.last_trade_price, "0.310");

        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire.get("event_type").unwrap(), "book");
        assert_eq!(wire["asks"][0]["size"], "500");
    }

    #[test]
    fn test_unknown_tag_preserved_opaquely() {
        let raw = json!({
            "event_type": "last_trade_price",
            "market": "0xabc",
            "price": "0.42"
        });
        let msg: MarketMessage = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(msg, MarketMessage::Other(_)));
        assert_eq!(msg.event_type(), Some("last_trade_price"));
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }
}
