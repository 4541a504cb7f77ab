//! Market discovery and session registry.

use crate::config::{ManagerConfig, StorageConfig};
use crate::session::{MarketSession, SessionSettings};
use chrono::Utc;
use parking_lot::RwLock;
use poly_gamma::{GammaClient, GammaResult, Market};
use poly_ws::ReconnectConfig;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often expired sessions are reaped.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10);

/// How often the status summary is logged.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Source of active markets for a series.
///
/// The manager only needs this one lookup, so tests can drive it with a
/// canned implementation instead of a live HTTP endpoint.
pub trait MarketDiscovery: Send + Sync {
    fn fetch_active_markets(
        &self,
        series_slug: &str,
    ) -> impl Future<Output = GammaResult<Vec<Market>>> + Send;
}

impl MarketDiscovery for GammaClient {
    fn fetch_active_markets(
        &self,
        series_slug: &str,
    ) -> impl Future<Output = GammaResult<Vec<Market>>> + Send {
        self.fetch_active_markets_for_series(series_slug)
    }
}

/// Owns the live-session registry and drives the discovery, cleanup and
/// status cadences.
pub struct MarketManager<D: MarketDiscovery> {
    discovery: D,
    config: ManagerConfig,
    storage: StorageConfig,
    ws_url: String,
    reconnect: ReconnectConfig,
    /// Live sessions keyed by market id.
    sessions: RwLock<HashMap<String, Arc<MarketSession>>>,
}

impl<D: MarketDiscovery> MarketManager<D> {
    pub fn new(
        discovery: D,
        config: ManagerConfig,
        storage: StorageConfig,
        ws_url: impl Into<String>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            discovery,
            config,
            storage,
            ws_url: ws_url.into(),
            reconnect,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Run until `cancel` fires. Discovers immediately, then ticks the
    /// scan, cleanup and status cadences; on shutdown every live session
    /// is stopped before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            scan_secs = self.config.scan_interval_secs,
            grace_secs = self.config.grace_period_secs,
            series = self.config.enabled_series().count(),
            "Manager started"
        );

        self.discover_markets(&cancel).await;
        self.print_status();

        let start = tokio::time::Instant::now();
        let mut scan = tokio::time::interval_at(
            start + self.config.scan_interval(),
            self.config.scan_interval(),
        );
        let mut cleanup = tokio::time::interval_at(start + CLEANUP_INTERVAL, CLEANUP_INTERVAL);
        let mut status = tokio::time::interval_at(start + STATUS_INTERVAL, STATUS_INTERVAL);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Manager shutting down");
                    self.stop_all_sessions().await;
                    return;
                }
                _ = scan.tick() => self.discover_markets(&cancel).await,
                _ = cleanup.tick() => self.cleanup_expired_sessions().await,
                _ = status.tick() => self.print_status(),
            }
        }
    }

    /// One discovery pass over every enabled series. A failing series is
    /// logged and skipped; it gets another chance on the next tick.
    async fn discover_markets(&self, cancel: &CancellationToken) {
        for series in self.config.enabled_series() {
            let markets = match self.discovery.fetch_active_markets(&series.slug).await {
                Ok(markets) => markets,
                Err(e) => {
                    warn!(series = %series.slug, error = %e, "Market discovery failed");
                    continue;
                }
            };

            for market in markets {
                if self.sessions.read().contains_key(&market.id) {
                    continue;
                }
                self.start_session(&series.slug, &market, cancel).await;
            }
        }
    }

    /// Create and start a session; it enters the registry only once
    /// start succeeds, so a failed market is retried on the next scan.
    async fn start_session(&self, series_slug: &str, market: &Market, cancel: &CancellationToken) {
        let settings = self.session_settings();
        let session = match MarketSession::new(market, series_slug, &settings) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                warn!(series = %series_slug, market = %market.id, error = %e, "Skipping market");
                return;
            }
        };

        match session.start(cancel).await {
            Ok(()) => {
                debug!(series = %series_slug, market = %market.id, "Session registered");
                self.sessions
                    .write()
                    .insert(market.id.clone(), session);
            }
            Err(e) => {
                warn!(series = %series_slug, market = %market.id, error = %e, "Session start failed");
            }
        }
    }

    /// Remove and stop sessions whose market ended more than a grace
    /// period ago. Removal happens under the write lock; stopping happens
    /// after it is released.
    async fn cleanup_expired_sessions(&self) {
        let now = Utc::now();
        let expired: Vec<Arc<MarketSession>> = {
            let mut sessions = self.sessions.write();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.should_close_at(now))
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id))
                .collect()
        };

        for session in expired {
            info!(
                series = %session.series_slug(),
                market = %session.market_id(),
                messages = session.message_count(),
                "Closing expired session"
            );
            session.stop().await;
        }
    }

    async fn stop_all_sessions(&self) {
        let sessions: Vec<Arc<MarketSession>> =
            self.sessions.write().drain().map(|(_, s)| s).collect();
        info!(count = sessions.len(), "Stopping all sessions");
        for session in sessions {
            session.stop().await;
        }
    }

    /// Log a one-line summary per live session.
    fn print_status(&self) {
        let now = Utc::now();
        let sessions = self.sessions.read();
        info!(active = sessions.len(), "Session status");
        for session in sessions.values() {
            let ends_in = (session.end_date() - now).num_seconds().max(0);
            info!(
                series = %session.series_slug(),
                market = %short_id(session.market_id()),
                messages = session.message_count(),
                ends_in_secs = ends_in,
                "  session"
            );
        }
    }

    fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            output_dir: PathBuf::from(&self.storage.output_dir),
            grace_period: self.config.grace_period(),
            compress: self.storage.compress,
            ws_url: self.ws_url.clone(),
            reconnect: self.reconnect.clone(),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Snapshot of the live sessions.
    pub fn sessions(&self) -> Vec<Arc<MarketSession>> {
        self.sessions.read().values().cloned().collect()
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}
