//! tsim: real-time trade cost simulator
//!
//! Wires the order book feed into the cost model and exposes the latest
//! book, inputs and outputs to consumers through [`SimulatorHandle`] and an
//! HTTP adapter.

pub mod api;
pub mod coordinator;
pub mod latency;
pub mod metrics;
pub mod service;

pub use api::{create_router, run_server, AppState};
pub use coordinator::{Coordinator, SimulatorView};
pub use service::{ServiceError, SimulatorHandle, SimulatorService};
