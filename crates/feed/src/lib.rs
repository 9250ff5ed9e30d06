//! tsim-feed: resilient L2 order book stream client
//!
//! [`FeedManager`] keeps one streaming connection alive with exponential
//! backoff and a staleness heartbeat, decodes every payload into an
//! [`tsim_model::Orderbook`] and hands it to the registered callback.

pub mod error;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod traits;
pub mod websocket;

pub use error::FeedError;
pub use manager::{
    ConnectionState, ErrorCallback, FeedHandle, FeedManager, LifecycleCallback, MessageCallback,
    EXHAUSTED_ERROR, PARSE_ERROR,
};
pub use metrics::{encode_metrics, FeedMetrics};
pub use policy::{HeartbeatPolicy, ReconnectPolicy};
pub use traits::{FeedStream, Transport};
pub use websocket::{close_reason, WsStream, WsTransport};
