//! Frame parsing for the market feed.
//!
//! The feed delivers frames either as a single JSON object or as a JSON
//! array of objects. Both shapes are normalized into an ordered batch of
//! [`MarketMessage`] records.

use crate::error::{FeedError, FeedResult};
use crate::message::MarketMessage;

/// Maximum number of payload bytes quoted in a parse error.
const ERROR_EXCERPT_LEN: usize = 100;

/// Parse one raw frame into an ordered batch of records.
///
/// An empty or whitespace-only frame yields an empty batch, not an error.
/// Malformed content yields [`FeedError::Frame`] with a truncated excerpt
/// of the offending payload; the caller is expected to log and drop the
/// frame, never to abort.
pub fn parse_frame(data: &[u8]) -> FeedResult<Vec<MarketMessage>> {
    let trimmed = trim_leading_whitespace(data);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed[0] == b'[' {
        serde_json::from_slice::<Vec<MarketMessage>>(trimmed)
            .map_err(|e| frame_error("invalid message array", e, trimmed))
    } else {
        serde_json::from_slice::<MarketMessage>(trimmed)
            .map(|msg| vec![msg])
            .map_err(|e| frame_error("invalid message object", e, trimmed))
    }
}

fn frame_error(context: &str, err: serde_json::Error, payload: &[u8]) -> FeedError {
    FeedError::Frame {
        detail: format!("{context}: {err}"),
        excerpt: truncate(payload, ERROR_EXCERPT_LEN),
    }
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
        .unwrap_or(data.len());
    &data[start..]
}

/// Truncate a payload to `max_len` bytes for error messages.
fn truncate(data: &[u8], max_len: usize) -> String {
    if data.len() <= max_len {
        String::from_utf8_lossy(data).into_owned()
    } else {
        format!("{}...", String::from_utf8_lossy(&data[..max_len]))
    }
}
