//! tsim-config: configuration for the trade cost simulator
//!
//! One YAML document with three optional sections (`feed`, `model`,
//! `inputs`). Missing sections and fields fall back to the built-in defaults,
//! so an empty file is a valid configuration.

pub mod error;
pub mod feed;
pub mod simulator;

pub use error::ConfigError;
pub use feed::{FeedConfig, HeartbeatConfig, ReconnectConfig, DEFAULT_ENDPOINT};
pub use simulator::SimulatorConfig;
