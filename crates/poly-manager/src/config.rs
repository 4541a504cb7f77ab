//! Manager and storage configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the session manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// How often to scan for new markets, in seconds.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// How long after a market's end before its session is closed, in seconds.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Series to track.
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

fn default_scan_interval_secs() -> u64 {
    30
}

fn default_grace_period_secs() -> u64 {
    60
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            grace_period_secs: default_grace_period_secs(),
            series: Vec::new(),
        }
    }
}

impl ManagerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Slugs of the series that are enabled.
    pub fn enabled_series(&self) -> impl Iterator<Item = &SeriesConfig> {
        self.series.iter().filter(|s| s.enabled)
    }
}

/// One tracked series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Series slug (e.g. "eth-up-or-down-15m").
    pub slug: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Output storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for output files.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Compress output files with zstd.
    #[serde(default = "default_compress")]
    pub compress: bool,
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_compress() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            compress: default_compress(),
        }
    }
}
