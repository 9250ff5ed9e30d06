use std::time::Duration;

use tsim_config::{HeartbeatConfig, ReconnectConfig};

/// Exponential reconnect backoff: `base_delay × 2^(attempt − 1)`, attempts
/// numbered from 1, at most `max_attempts` retries per failure cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Every delay of one full failure cycle, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_attempts: config.max_attempts,
        }
    }
}

/// Staleness check run while the connection is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pub interval: Duration,
    pub stale_after: Duration,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(10),
        }
    }
}

impl From<&HeartbeatConfig> for HeartbeatPolicy {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            interval: config.interval(),
            stale_after: config.stale_after(),
        }
    }
}
