// =============================================================================
// Runtime Configuration — service settings from JSON + environment
// =============================================================================
//
// Every field carries a serde default so that an older or partial JSON file
// still loads.  A handful of deployment knobs can also be overridden from the
// environment (see `apply_env_overrides`).
//
// The file is only ever read.  Env overrides live in memory for the current
// process and never end up on disk.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::DEFAULT_WINDOW;
use crate::error::ConfigError;
use crate::market_data::feed::DEFAULT_FEED_URL;
use crate::market_data::{Timeframe, DEFAULT_TICK_CAPACITY};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_tick_capacity() -> usize {
    DEFAULT_TICK_CAPACITY
}

fn default_analytics_window() -> usize {
    DEFAULT_WINDOW
}

fn default_persist_timeframes() -> Vec<String> {
    vec!["1s".to_string(), "1m".to_string()]
}

fn default_persist_interval_secs() -> u64 {
    5
}

fn default_database_path() -> String {
    "market_data.db".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Feed ---------------------------------------------------------------

    /// Instruments subscribed on the ticker feed.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Combined-stream base URL.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Pause between reconnect attempts after the feed drops.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    // --- Core ---------------------------------------------------------------

    /// Ticks retained per instrument.
    #[serde(default = "default_tick_capacity")]
    pub tick_capacity: usize,

    /// Default rolling window for z-score and correlation.
    #[serde(default = "default_analytics_window")]
    pub analytics_window: usize,

    // --- Persistence --------------------------------------------------------

    /// Timeframes written to the candle DB.
    #[serde(default = "default_persist_timeframes")]
    pub persist_timeframes: Vec<String>,

    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,

    #[serde(default = "default_database_path")]
    pub database_path: String,

    // --- API ----------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            feed_url: default_feed_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            tick_capacity: default_tick_capacity(),
            analytics_window: default_analytics_window(),
            persist_timeframes: default_persist_timeframes(),
            persist_interval_secs: default_persist_interval_secs(),
            database_path: default_database_path(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            tick_capacity = config.tick_capacity,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply `PAIRWATCH_SYMBOLS`, `PAIRWATCH_BIND_ADDR` and
    /// `PAIRWATCH_DB_PATH` through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(syms) = lookup("PAIRWATCH_SYMBOLS") {
            let parsed: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.symbols = parsed;
            }
        }
        if let Some(addr) = lookup("PAIRWATCH_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(path) = lookup("PAIRWATCH_DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.database_path = path.trim().to_string();
        }
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.tick_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.analytics_window < 2 {
            return Err(ConfigError::WindowTooSmall {
                window: self.analytics_window,
            });
        }
        self.timeframes()?;
        Ok(())
    }

    /// Parsed `persist_timeframes`.
    pub fn timeframes(&self) -> Result<Vec<Timeframe>, ConfigError> {
        self.persist_timeframes
            .iter()
            .map(|s| s.parse::<Timeframe>().map_err(ConfigError::from))
            .collect()
    }
}
