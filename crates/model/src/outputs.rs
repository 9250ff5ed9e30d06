use serde::{Deserialize, Serialize};

use crate::cost::CostEstimate;

/// Most recent computed result. Carries no reference back to the book or
/// inputs it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutputs {
    /// Fraction of notional
    pub expected_slippage: f64,
    /// Quote-currency amount
    pub expected_fees: f64,
    /// Fraction of notional
    pub expected_market_impact: f64,
    /// Quote-currency amount
    pub net_cost: f64,
    pub maker_taker_proportion: f64,
    /// Wall-clock time spent inside the cost model
    pub internal_latency_ms: f64,
    /// Copied from the source order book
    pub timestamp: String,
}

impl SimulationOutputs {
    pub fn from_estimate(
        estimate: CostEstimate,
        internal_latency_ms: f64,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            expected_slippage: estimate.slippage,
            expected_fees: estimate.fees,
            expected_market_impact: estimate.market_impact,
            net_cost: estimate.net_cost,
            maker_taker_proportion: estimate.maker_taker_proportion,
            internal_latency_ms,
            timestamp: timestamp.into(),
        }
    }
}
