//! tsim-model: order book snapshots and the trade cost model
//!
//! Everything in this crate is synchronous and side-effect free. The feed
//! decodes into [`Orderbook`], the coordination layer feeds snapshots and
//! [`SimulationInputs`] into [`CostModel`] and gets numbers back.

pub mod cost;
pub mod error;
pub mod inputs;
pub mod orderbook;
pub mod outputs;

pub use cost::{CostEstimate, CostModel, CostParams, FeeSchedule};
pub use error::{DecodeError, InputError};
pub use inputs::{FeeTier, OrderType, SimulationInputs, SUPPORTED_EXCHANGE};
pub use orderbook::{depth, liquidity, mid_price, BookSide, Level, Orderbook};
pub use outputs::SimulationOutputs;
