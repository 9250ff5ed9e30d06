//! Prometheus metrics for the feed connection
//!
//! One label set per feed (`exchange:symbol`), shared by every connection
//! and reconnect of that feed.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_int_counter_vec, register_int_gauge_vec, Encoder, GaugeVec,
    IntCounterVec, IntGaugeVec, TextEncoder,
};

const LABEL_FEED: &str = "feed";
const LABEL_OUTCOME: &str = "outcome";

/// Messages received, by decode outcome
static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tsim_feed_messages_total",
        "Total order book messages received by the feed",
        &[LABEL_FEED, LABEL_OUTCOME]
    )
    .expect("Failed to register messages_total metric")
});

static RECONNECT_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tsim_feed_reconnect_attempts_total",
        "Reconnect attempts scheduled after an unexpected close",
        &[LABEL_FEED]
    )
    .expect("Failed to register reconnect_attempts_total metric")
});

static RECONNECT_EXHAUSTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tsim_feed_reconnect_exhausted_total",
        "Failure cycles that ran out of reconnect attempts",
        &[LABEL_FEED]
    )
    .expect("Failed to register reconnect_exhausted_total metric")
});

static STALE_RESTARTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tsim_feed_stale_restarts_total",
        "Connections restarted because no message arrived in time",
        &[LABEL_FEED]
    )
    .expect("Failed to register stale_restarts_total metric")
});

/// Connection status (1 = open, 0 = not open)
static CONNECTED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "tsim_feed_connected",
        "Feed connection status (1=open, 0=not open)",
        &[LABEL_FEED]
    )
    .expect("Failed to register connected metric")
});

static LAST_MESSAGE_TIMESTAMP: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tsim_feed_last_message_timestamp",
        "Unix timestamp of the last message received",
        &[LABEL_FEED]
    )
    .expect("Failed to register last_message_timestamp metric")
});

static IDLE_SECONDS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "tsim_feed_idle_seconds",
        "Seconds since the last message, sampled by the heartbeat check",
        &[LABEL_FEED]
    )
    .expect("Failed to register idle_seconds metric")
});

/// Handle for recording metrics of one feed
#[derive(Clone)]
pub struct FeedMetrics {
    feed: String,
}

impl FeedMetrics {
    pub fn new(feed: impl Into<String>) -> Self {
        Self { feed: feed.into() }
    }

    pub fn inc_decoded(&self) {
        MESSAGES_TOTAL
            .with_label_values(&[&self.feed, "decoded"])
            .inc();
    }

    pub fn inc_decode_error(&self) {
        MESSAGES_TOTAL
            .with_label_values(&[&self.feed, "decode_error"])
            .inc();
    }

    pub fn inc_reconnect_attempt(&self) {
        RECONNECT_ATTEMPTS_TOTAL
            .with_label_values(&[&self.feed])
            .inc();
    }

    pub fn inc_reconnect_exhausted(&self) {
        RECONNECT_EXHAUSTED_TOTAL
            .with_label_values(&[&self.feed])
            .inc();
    }

    pub fn inc_stale_restart(&self) {
        STALE_RESTARTS_TOTAL.with_label_values(&[&self.feed]).inc();
    }

    pub fn set_connected(&self) {
        CONNECTED.with_label_values(&[&self.feed]).set(1);
    }

    pub fn set_disconnected(&self) {
        CONNECTED.with_label_values(&[&self.feed]).set(0);
    }

    /// Update last message timestamp
    pub fn set_last_message(&self, epoch_secs: f64) {
        LAST_MESSAGE_TIMESTAMP
            .with_label_values(&[&self.feed])
            .set(epoch_secs);
    }

    pub fn set_idle_seconds(&self, seconds: f64) {
        IDLE_SECONDS.with_label_values(&[&self.feed]).set(seconds);
    }
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}
