//! Application configuration.

use crate::error::{AppError, AppResult};
use poly_manager::{ManagerConfig, StorageConfig};
use poly_ws::{ReconnectConfig, DEFAULT_WS_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub websocket: WebsocketConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feed endpoint and reconnection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketConfig {
    #[serde(default = "default_ws_url")]
    pub url: String,
    #[serde(flatten)]
    pub reconnect: ReconnectConfig,
}

fn default_ws_url() -> String {
    DEFAULT_WS_URL.to_string()
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Gamma API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_gamma_base_url")]
    pub base_url: String,
    /// Collect this long before a market's scheduled start, in seconds.
    #[serde(default = "default_early_start_secs")]
    pub early_start_secs: u64,
    /// Window assumed for markets whose series has no recognized
    /// recurrence, in seconds.
    #[serde(default = "default_fallback_window_secs")]
    pub fallback_window_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_gamma_base_url() -> String {
    poly_gamma::DEFAULT_BASE_URL.to_string()
}

fn default_early_start_secs() -> u64 {
    300
}

fn default_fallback_window_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            base_url: default_gamma_base_url(),
            early_start_secs: default_early_start_secs(),
            fallback_window_secs: default_fallback_window_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl DiscoveryConfig {
    pub fn early_start(&self) -> Duration {
        Duration::from_secs(self.early_start_secs)
    }

    pub fn fallback_window(&self) -> Duration {
        Duration::from_secs(self.fallback_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults so the collector can run with nothing but CLI flags.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the collector cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.manager.enabled_series().count() == 0 {
            return Err(AppError::Config(
                "no enabled series configured".to_string(),
            ));
        }
        if self.manager.scan_interval_secs == 0 {
            return Err(AppError::Config("scan_interval_secs must be > 0".to_string()));
        }
        if self.storage.output_dir.is_empty() {
            return Err(AppError::Config("output_dir must not be empty".to_string()));
        }
        if self.websocket.url.is_empty() {
            return Err(AppError::Config("websocket url must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.websocket.url, DEFAULT_WS_URL);
        assert_eq!(config.manager.scan_interval_secs, 30);
        assert_eq!(config.manager.grace_period_secs, 60);
        assert_eq!(config.storage.output_dir, "data");
        assert!(config.storage.compress);
        assert_eq!(config.discovery.early_start(), Duration::from_secs(300));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parses_full_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [manager]
            scan_interval_secs = 15
            grace_period_secs = 120

            [[manager.series]]
            slug = "eth-up-or-down-15m"

            [[manager.series]]
            slug = "btc-up-or-down-15m"
            enabled = false

            [storage]
            output_dir = "/var/lib/poly"
            compress = false

            [websocket]
            url = "ws://localhost:9000"
            initial_backoff_ms = 500
            max_retries = 5

            [discovery]
            early_start_secs = 60

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.manager.scan_interval_secs, 15);
        assert_eq!(config.manager.series.len(), 2);
        assert_eq!(config.manager.enabled_series().count(), 1);
        assert_eq!(config.storage.output_dir, "/var/lib/poly");
        assert!(!config.storage.compress);
        assert_eq!(config.websocket.url, "ws://localhost:9000");
        assert_eq!(config.websocket.reconnect.initial_backoff_ms, 500);
        assert_eq!(config.websocket.reconnect.max_retries, 5);
        // Unset reconnect fields keep their defaults.
        assert_eq!(config.websocket.reconnect.max_backoff_ms, 30_000);
        assert_eq!(config.discovery.early_start_secs, 60);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = AppConfig::default();
        config.manager.series.push(poly_manager::SeriesConfig {
            slug: "eth-up-or-down-15m".to_string(),
            enabled: true,
        });
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.manager.series.len(), 1);
        assert_eq!(parsed.websocket.url, config.websocket.url);
    }

    #[test]
    fn test_validate_requires_enabled_series() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.manager.series.push(poly_manager::SeriesConfig {
            slug: "eth-up-or-down-15m".to_string(),
            enabled: true,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::from_file("/nonexistent/collector.toml").unwrap();
        assert_eq!(config.manager.scan_interval_secs, 30);
    }
}
