//! Per-market collection session.
//!
//! A `MarketSession` owns one feed connection and one output file for a
//! single market, from discovery until the market's end plus a grace
//! period. Sessions start at most once and stop idempotently.

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use poly_feed::MarketMessage;
use poly_gamma::Market;
use poly_persistence::EventWriter;
use poly_ws::{FeedClient, MessageHandler, ReconnectConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timeframe suffixes recognized when shortening a series slug.
const TIMEFRAME_SUFFIXES: &[&str] = &["15m", "hourly", "daily", "weekly", "monthly", "5m", "4h"];

/// Maximum slug length before shortening kicks in.
const MAX_SLUG_LEN: usize = 20;

/// Settings shared by every session a manager creates.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Root output directory; sessions write under a per-series subdirectory.
    pub output_dir: PathBuf,
    /// How long after the market's end the session keeps collecting.
    pub grace_period: Duration,
    /// Compress output files with zstd.
    pub compress: bool,
    /// Feed endpoint URL.
    pub ws_url: String,
    /// Reconnection behavior for the session's feed connection.
    pub reconnect: ReconnectConfig,
}

/// First record of every output file, describing the market it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(rename = "type")]
    pub record_type: String,
    pub series_slug: String,
    pub market_id: String,
    pub condition_id: String,
    pub token_ids: Vec<String>,
    pub end_date: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
}

/// Mutable session state, guarded by one lock so the message handler and
/// `stop` never interleave mid-record.
struct SessionState {
    started: bool,
    stopped: bool,
    writer: Option<EventWriter>,
}

/// A collection session for one market.
pub struct MarketSession {
    series_slug: String,
    market_id: String,
    condition_id: String,
    token_ids: Vec<String>,
    end_date: DateTime<Utc>,
    /// Moment after which [`should_close`](Self::should_close) is true.
    close_deadline: DateTime<Utc>,
    file_path: PathBuf,
    start_time: DateTime<Utc>,
    ws_url: String,
    reconnect: ReconnectConfig,
    compress: bool,
    cancel: Mutex<Option<CancellationToken>>,
    state: Arc<Mutex<SessionState>>,
    client: Mutex<Option<Arc<FeedClient>>>,
    message_count: Arc<AtomicU64>,
}

impl std::fmt::Debug for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketSession")
            .field("series_slug", &self.series_slug)
            .field("market_id", &self.market_id)
            .field("condition_id", &self.condition_id)
            .field("token_ids", &self.token_ids)
            .field("end_date", &self.end_date)
            .field("close_deadline", &self.close_deadline)
            .field("file_path", &self.file_path)
            .field("start_time", &self.start_time)
            .field("ws_url", &self.ws_url)
            .field("reconnect", &self.reconnect)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

impl MarketSession {
    /// Build a session for `market`. Fails if the market has no end date
    /// or its token ids cannot be decoded.
    pub fn new(
        market: &Market,
        series_slug: impl Into<String>,
        settings: &SessionSettings,
    ) -> SessionResult<Self> {
        let series_slug = series_slug.into();

        let end_date = market
            .end_date
            .ok_or_else(|| SessionError::MissingEndDate(market.id.clone()))?;
        let token_ids = market.parse_token_ids().map_err(|e| SessionError::TokenIds {
            market_id: market.id.clone(),
            source: e,
        })?;

        let grace = chrono::Duration::from_std(settings.grace_period)
            .map_err(|e| SessionError::InvalidSettings(format!("grace period: {e}")))?;
        let close_deadline = end_date + grace;

        let start_time = Utc::now();
        // Both name parts come from the end date so files sort by market,
        // even when a session starts the day before its market ends.
        let file_name = format!(
            "{}_{}.jsonl{}",
            end_date.format("%Y-%m-%d"),
            end_date.timestamp(),
            if settings.compress { ".zst" } else { "" },
        );
        let file_path = settings
            .output_dir
            .join(short_slug(&series_slug))
            .join(file_name);

        Ok(Self {
            series_slug,
            market_id: market.id.clone(),
            condition_id: market.condition_id.clone(),
            token_ids,
            end_date,
            close_deadline,
            file_path,
            start_time,
            ws_url: settings.ws_url.clone(),
            reconnect: settings.reconnect.clone(),
            compress: settings.compress,
            cancel: Mutex::new(None),
            state: Arc::new(Mutex::new(SessionState {
                started: false,
                stopped: false,
                writer: None,
            })),
            client: Mutex::new(None),
            message_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Start collecting: open the output file, write the metadata header,
    /// connect to the feed and subscribe to this market's tokens.
    ///
    /// Starts at most once; repeated calls are no-ops.
    pub async fn start(self: &Arc<Self>, parent: &CancellationToken) -> SessionResult<()> {
        {
            let mut state = self.state.lock();
            if state.started {
                return Ok(());
            }
            state.started = true;
        }

        if self.token_ids.is_empty() {
            return Err(SessionError::NoTokenIds(self.market_id.clone()));
        }

        let mut writer = EventWriter::create(&self.file_path, self.compress)?;
        writer.write_json(&self.metadata())?;
        writer.flush()?;
        self.state.lock().writer = Some(writer);

        info!(
            series = %self.series_slug,
            market = %self.market_id,
            path = %self.file_path.display(),
            end = %self.end_date,
            "Session started"
        );

        let cancel = parent.child_token();
        *self.cancel.lock() = Some(cancel.clone());

        let client = FeedClient::new(
            self.ws_url.clone(),
            self.reconnect.clone(),
            self.message_handler(),
            cancel.clone(),
        );

        if let Err(e) = self.open_feed(&client).await {
            // Roll back. The token is cancelled first so a read loop
            // spawned by a successful connect can never reconnect.
            cancel.cancel();
            client.close().await;
            self.close_writer();
            return Err(e);
        }

        *self.client.lock() = Some(client);
        Ok(())
    }

    async fn open_feed(&self, client: &Arc<FeedClient>) -> SessionResult<()> {
        client.connect().await?;
        client.subscribe(self.token_ids.clone()).await?;
        debug!(
            market = %self.market_id,
            tokens = self.token_ids.len(),
            "Subscribed to market tokens"
        );
        Ok(())
    }

    /// Stop collecting and close the output file. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }

        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
        let client = self.client.lock().take();
        if let Some(client) = client {
            client.close().await;
        }

        self.close_writer();

        info!(
            series = %self.series_slug,
            market = %self.market_id,
            messages = self.message_count(),
            "Session stopped"
        );
    }

    fn close_writer(&self) {
        let writer = self.state.lock().writer.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close() {
                warn!(
                    market = %self.market_id,
                    error = %e,
                    "Failed to close output file"
                );
            }
        }
    }

    /// Handler run on the feed's read-loop task. Captures only the state
    /// lock and the counter, so the session itself is never kept alive by
    /// its own connection.
    fn message_handler(&self) -> MessageHandler {
        let state = Arc::clone(&self.state);
        let counter = Arc::clone(&self.message_count);
        let market_id = self.market_id.clone();

        Arc::new(move |batch: Vec<MarketMessage>| {
            let written = {
                let mut state = state.lock();
                if state.stopped {
                    return;
                }
                let Some(writer) = state.writer.as_mut() else {
                    return;
                };
                let mut written = 0u64;
                for message in &batch {
                    match writer.write_json(message) {
                        Ok(()) => written += 1,
                        Err(e) => {
                            warn!(market = %market_id, error = %e, "Failed to write record");
                        }
                    }
                }
                written
            };
            counter.fetch_add(written, Ordering::Relaxed);
        })
    }

    /// Whether the session's market ended at least a grace period before
    /// `now`.
    pub fn should_close_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.close_deadline
    }

    /// [`should_close_at`](Self::should_close_at) against the current time.
    pub fn should_close(&self) -> bool {
        self.should_close_at(Utc::now())
    }

    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            record_type: "metadata".to_string(),
            series_slug: self.series_slug.clone(),
            market_id: self.market_id.clone(),
            condition_id: self.condition_id.clone(),
            token_ids: self.token_ids.clone(),
            end_date: self.end_date,
            start_time: self.start_time,
        }
    }

    /// Whether `stop` has run.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Records written so far, excluding the metadata header.
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    pub fn market_id(&self) -> &str {
        &self.market_id
    }

    pub fn end_date(&self) -> DateTime<Utc> {
        self.end_date
    }

    pub fn series_slug(&self) -> &str {
        &self.series_slug
    }
}

/// Shorten long series slugs for directory names by keeping the asset
/// prefix and the recognized timeframe part, e.g.
/// "ethereum-up-or-down-15m-aug-30" becomes "ethereum-15m". Slugs with
/// no recognized timeframe are left alone.
fn short_slug(slug: &str) -> String {
    if slug.len() <= MAX_SLUG_LEN {
        return slug.to_string();
    }
    let parts: Vec<&str> = slug.split('-').collect();
    let Some(prefix) = parts.first() else {
        return slug.to_string();
    };
    for suffix in TIMEFRAME_SUFFIXES {
        if parts.iter().any(|p| p == suffix) {
            return format!("{prefix}-{suffix}");
        }
    }
    slug.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            output_dir: PathBuf::from("/tmp/poly-test"),
            grace_period: Duration::from_secs(60),
            compress: false,
            ws_url: "ws://127.0.0.1:1".to_string(),
            reconnect: ReconnectConfig::default(),
        }
    }

    fn market(end_offset: chrono::Duration) -> Market {
        Market {
            id: "514061".to_string(),
            condition_id: "0x0d88".to_string(),
            end_date: Some(Utc::now() + end_offset),
            clob_token_ids: r#"["token1", "token2"]"#.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_requires_end_date() {
        let mut m = market(chrono::Duration::hours(1));
        m.end_date = None;
        let err = MarketSession::new(&m, "eth-up-or-down-15m", &settings()).unwrap_err();
        assert!(matches!(err, SessionError::MissingEndDate(_)));
    }

    #[test]
    fn test_new_rejects_bad_token_ids() {
        let mut m = market(chrono::Duration::hours(1));
        m.clob_token_ids = "[broken".to_string();
        let err = MarketSession::new(&m, "eth-up-or-down-15m", &settings()).unwrap_err();
        assert!(matches!(err, SessionError::TokenIds { .. }));
    }

    #[test]
    fn test_should_close_at_boundaries() {
        let now = Utc::now();

        // Ends in an hour: nowhere near closing.
        let session =
            MarketSession::new(&market(chrono::Duration::hours(1)), "s", &settings()).unwrap();
        assert!(!session.should_close_at(now));

        // Ended two minutes ago with a 60s grace: past the deadline.
        let session =
            MarketSession::new(&market(-chrono::Duration::minutes(2)), "s", &settings()).unwrap();
        assert!(session.should_close_at(now));

        // Exactly at end + grace counts as closed.
        let session =
            MarketSession::new(&market(chrono::Duration::zero()), "s", &settings()).unwrap();
        let deadline = session.end_date() + chrono::Duration::seconds(60);
        assert!(session.should_close_at(deadline));
        assert!(!session.should_close_at(deadline - chrono::Duration::milliseconds(1)));
    }

    #[tokio::test]
    async fn test_start_rejects_empty_token_ids() {
        let mut m = market(chrono::Duration::hours(1));
        m.clob_token_ids = "[]".to_string();
        let session =
            Arc::new(MarketSession::new(&m, "eth-up-or-down-15m", &settings()).unwrap());
        let err = session.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoTokenIds(_)));
    }

    #[tokio::test]
    async fn test_failed_start_tears_down_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings();
        s.output_dir = dir.path().to_path_buf();
        // Unreachable endpoint with one attempt, so start fails fast.
        s.reconnect = ReconnectConfig {
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
            backoff_factor: 1.0,
            max_retries: 1,
        };
        let session =
            Arc::new(MarketSession::new(&market(chrono::Duration::hours(1)), "s", &s).unwrap());

        let err = session.start(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::Ws(_)));

        // The rollback cancelled the session token and closed the writer,
        // so no read loop can linger and reconnect.
        let cancel = session.cancel.lock();
        assert!(cancel.as_ref().unwrap().is_cancelled());
        assert!(session.state.lock().writer.is_none());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let session = Arc::new(
            MarketSession::new(&market(chrono::Duration::hours(1)), "s", &settings()).unwrap(),
        );
        session.stop().await;
        session.stop().await;
        assert_eq!(session.message_count(), 0);
    }

    #[test]
    fn test_short_slug() {
        assert_eq!(short_slug("eth-15m"), "eth-15m");
        assert_eq!(
            short_slug("ethereum-up-or-down-15m-aug-30"),
            "ethereum-15m"
        );
        assert_eq!(
            short_slug("bitcoin-up-or-down-hourly-2026"),
            "bitcoin-hourly"
        );
        // No recognized timeframe: left alone.
        assert_eq!(
            short_slug("some-very-long-series-name"),
            "some-very-long-series-name"
        );
    }

    #[test]
    fn test_file_path_layout() {
        let session = MarketSession::new(
            &market(chrono::Duration::hours(1)),
            "ethereum-up-or-down-15m-series",
            &settings(),
        )
        .unwrap();
        let path = session.file_path();
        assert!(path.starts_with("/tmp/poly-test/ethereum-15m"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".jsonl"), "uncompressed suffix: {name}");
        assert!(name.contains(&session.end_date().timestamp().to_string()));
    }

    #[test]
    fn test_file_name_derives_from_end_date() {
        use chrono::TimeZone;

        let mut m = market(chrono::Duration::hours(1));
        m.end_date = Some(Utc.with_ymd_and_hms(2026, 8, 31, 0, 10, 0).unwrap());
        let session = MarketSession::new(&m, "s", &settings()).unwrap();
        let name = session.file_path().file_name().unwrap().to_str().unwrap();

        // Date part matches the market's end, not the session's start, so
        // a session opened before midnight files under its market's day.
        assert!(name.starts_with("2026-08-31_"), "got {name}");
        assert!(name.contains(&m.end_date.unwrap().timestamp().to_string()));
    }

    #[test]
    fn test_metadata_header_shape() {
        let session = MarketSession::new(
            &market(chrono::Duration::hours(1)),
            "eth-up-or-down-15m",
            &settings(),
        )
        .unwrap();
        let value = serde_json::to_value(session.metadata()).unwrap();
        assert_eq!(value["type"], "metadata");
        assert_eq!(value["market_id"], "514061");
        assert_eq!(value["condition_id"], "0x0d88");
        assert_eq!(value["token_ids"], serde_json::json!(["token1", "token2"]));
    }
}
