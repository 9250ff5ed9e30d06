use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// OKX BTC-USDT perpetual L2 order book stream
pub const DEFAULT_ENDPOINT: &str =
    "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry; doubles on every further attempt
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// How often the staleness check runs while connected
    pub interval_ms: u64,
    /// Silence longer than this forces a reconnect
    pub stale_after_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            stale_after_ms: 10_000,
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

/// Market-data feed: one endpoint, one exchange/instrument pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: String,
    pub exchange: String,
    pub symbol: String,
    pub connect_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            exchange: "okx".to_string(),
            symbol: "BTC-USDT-SWAP".to_string(),
            connect_timeout_ms: 10_000,
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::Validation(format!("feed.endpoint {:?}: {}", self.endpoint, e))
        })?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(ConfigError::Validation(format!(
                "feed.endpoint must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "feed.connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Validation(
                "feed.reconnect.base_delay_ms must be positive".to_string(),
            ));
        }
        // 2^31 × base delay already overflows any sane schedule
        if self.reconnect.max_attempts > 31 {
            return Err(ConfigError::Validation(format!(
                "feed.reconnect.max_attempts must be at most 31, got {}",
                self.reconnect.max_attempts
            )));
        }
        if self.heartbeat.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "feed.heartbeat.interval_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat.stale_after_ms < self.heartbeat.interval_ms {
            return Err(ConfigError::Validation(format!(
                "feed.heartbeat.stale_after_ms ({}) must be >= interval_ms ({})",
                self.heartbeat.stale_after_ms, self.heartbeat.interval_ms
            )));
        }
        Ok(())
    }
}
