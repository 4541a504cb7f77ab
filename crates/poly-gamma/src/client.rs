//! HTTP client for the Gamma API.
//!
//! `fetch_active_markets_for_series` implements the trading-window logic:
//! a series' recurrence determines how long before its end a market
//! trades, and collection starts an early-start buffer before that. Both
//! the buffer and the fallback window are heuristics tied to upstream
//! data quality, so they are configurable rather than hard-coded.

use crate::error::{GammaError, GammaResult};
use crate::types::{Event, Filter, Market, Series};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use tracing::{debug, warn};

/// Base URL for the Gamma API.
pub const DEFAULT_BASE_URL: &str = "https://gamma-api.polymarket.com";

/// Default request timeout.
const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Default early-start buffer: trading opens a little before the official
/// start time, so collection does too.
const DEFAULT_EARLY_START_SECS: i64 = 5 * 60;

/// Default trading window when the recurrence is unrecognized.
const DEFAULT_FALLBACK_WINDOW_SECS: i64 = 60 * 60;

/// Trading window implied by a series recurrence.
pub fn window_for_recurrence(recurrence: &str, fallback: Duration) -> Duration {
    match recurrence {
        "5m" => Duration::minutes(5),
        "15m" => Duration::minutes(15),
        "hourly" => Duration::hours(1),
        "4h" => Duration::hours(4),
        "daily" => Duration::hours(24),
        "weekly" => Duration::days(7),
        "monthly" => Duration::days(30),
        _ => fallback,
    }
}

/// Whether trading has begun for an event as of `now`.
///
/// Uses the explicit start time when present; otherwise estimates it as
/// one trading window before the end date. Both paths apply the
/// early-start buffer.
fn trading_started(
    now: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_date: DateTime<Utc>,
    window: Duration,
    early_start: Duration,
) -> bool {
    match start_time {
        Some(start) => start - early_start <= now,
        None => end_date - window - early_start <= now,
    }
}

/// HTTP client for the Gamma API.
pub struct GammaClient {
    client: Client,
    base_url: String,
    early_start: Duration,
    fallback_window: Duration,
}

impl GammaClient {
    /// Create a client against the production endpoint.
    pub fn new() -> GammaResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(timeout: std::time::Duration) -> GammaResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GammaError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            early_start: Duration::seconds(DEFAULT_EARLY_START_SECS),
            fallback_window: Duration::seconds(DEFAULT_FALLBACK_WINDOW_SECS),
        })
    }

    /// Override the base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the early-start buffer.
    pub fn with_early_start(mut self, early_start: std::time::Duration) -> Self {
        self.early_start = Duration::from_std(early_start).unwrap_or(self.early_start);
        self
    }

    /// Override the fallback trading window.
    pub fn with_fallback_window(mut self, window: std::time::Duration) -> Self {
        self.fallback_window = Duration::from_std(window).unwrap_or(self.fallback_window);
        self
    }

    async fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        filter: &Filter,
    ) -> GammaResult<Vec<T>> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&filter.to_query())
            .send()
            .await
            .map_err(|e| GammaError::HttpClient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GammaError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| GammaError::HttpClient(format!("decoding response: {e}")))
    }

    /// Fetch series matching a filter.
    pub async fn fetch_series(&self, filter: &Filter) -> GammaResult<Vec<Series>> {
        self.get_list("/series", filter).await
    }

    /// Fetch events matching a filter.
    pub async fn fetch_events(&self, filter: &Filter) -> GammaResult<Vec<Event>> {
        self.get_list("/events", filter).await
    }

    /// Fetch markets matching a filter.
    pub async fn fetch_markets(&self, filter: &Filter) -> GammaResult<Vec<Market>> {
        self.get_list("/markets", filter).await
    }

    /// Fetch a series by slug, including its events.
    pub async fn fetch_series_by_slug(&self, slug: &str) -> GammaResult<Series> {
        let filter = Filter {
            slug: Some(slug.to_string()),
            ..Default::default()
        };
        let mut series: Vec<Series> = self.get_list("/series", &filter).await?;
        if series.is_empty() {
            return Err(GammaError::SeriesNotFound(slug.to_string()));
        }
        Ok(series.remove(0))
    }

    /// Fetch markets of a series that are currently tradeable.
    ///
    /// Only returns markets whose trading window has begun (explicit start
    /// time when available, otherwise estimated from the recurrence) and
    /// which have not yet ended or closed.
    pub async fn fetch_active_markets_for_series(&self, slug: &str) -> GammaResult<Vec<Market>> {
        let series = self.fetch_series_by_slug(slug).await?;
        let window = window_for_recurrence(&series.recurrence, self.fallback_window);
        let now = Utc::now();

        let mut active_markets = Vec::new();

        for event in &series.events {
            if event.closed {
                continue;
            }
            let Some(event_end) = event.end_date else {
                continue;
            };
            if event_end < now {
                continue;
            }

            // The series endpoint does not nest markets; refetch the event.
            let filter = Filter {
                slug: Some(event.slug.clone()),
                ..Default::default()
            };
            let events = match self.fetch_events(&filter).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(event = %event.slug, error = %e, "Failed to fetch event, skipping");
                    continue;
                }
            };
            let Some(full_event) = events.first() else {
                continue;
            };
            let Some(end_date) = full_event.end_date else {
                continue;
            };

            if !trading_started(
                now,
                full_event.start_time,
                end_date,
                window,
                self.early_start,
            ) {
                debug!(event = %event.slug, "Trading not yet started");
                continue;
            }

            for market in &full_event.markets {
                if !market.closed && market.end_date.is_some_and(|end| end > now) {
                    active_markets.push(market.clone());
                }
            }
        }

        Ok(active_markets)
    }
}
