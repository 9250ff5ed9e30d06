//! Trade cost model
//!
//! Estimates what a hypothetical buy of `quantity` quote-currency units would
//! cost against one order book snapshot.
//!
//! ## Components
//! - **Slippage**: walk the ask side from the best price, measuring each
//!   fill against mid. Whatever the visible book cannot fill is charged a flat
//!   penalty rate.
//! - **Fees**: `quantity × rate(tier)`.
//! - **Market impact**: square-root impact `σ × sqrt(q / V)` with `V`
//!   estimated from visible size times a turnover multiplier.
//! - **Maker/taker**: odds ratio of a heuristic maker fraction derived from
//!   depth and liquidity.
//!
//! Net cost is the linear sum `slippage×q + fees + impact×q`.
//!
//! Every method is pure. Degenerate inputs (empty side, zero mid, non-positive
//! quantity) produce 0 rather than errors or non-finite values.

use serde::{Deserialize, Serialize};

use crate::inputs::{FeeTier, SimulationInputs};
use crate::orderbook::Orderbook;

/// Taker fee rates per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub vip1: f64,
    pub vip2: f64,
    pub vip3: f64,
    pub vip4: f64,
    pub vip5: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            vip1: 0.0008,
            vip2: 0.0007,
            vip3: 0.0006,
            vip4: 0.0005,
            vip5: 0.0004,
        }
    }
}

impl FeeSchedule {
    pub fn rate(&self, tier: FeeTier) -> f64 {
        match tier {
            FeeTier::Vip1 | FeeTier::Unrecognized => self.vip1,
            FeeTier::Vip2 => self.vip2,
            FeeTier::Vip3 => self.vip3,
            FeeTier::Vip4 => self.vip4,
            FeeTier::Vip5 => self.vip5,
        }
    }
}

/// Tuning constants. None of these are derived; they are heuristics and live
/// in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParams {
    /// Slippage charged on quantity the visible asks cannot fill
    pub unfilled_slippage_rate: f64,
    /// Visible size × this = estimated daily volume
    pub turnover_multiplier: f64,
    /// Volume floor as a multiple of quantity when the book shows no size
    pub volume_floor_multiplier: f64,
    /// Upper bound on the maker fraction, must stay below 1
    pub maker_fraction_cap: f64,
    /// Divisor scale applied to quantity in the maker fraction
    pub maker_liquidity_scale: f64,
    pub fees: FeeSchedule,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            unfilled_slippage_rate: 0.01,
            turnover_multiplier: 100.0,
            volume_floor_multiplier: 1000.0,
            maker_fraction_cap: 0.8,
            maker_liquidity_scale: 10.0,
            fees: FeeSchedule::default(),
        }
    }
}

/// Result of one model evaluation, before latency and timestamp are attached.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostEstimate {
    pub slippage: f64,
    pub fees: f64,
    pub market_impact: f64,
    pub maker_taker_proportion: f64,
    pub net_cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CostModel {
    params: CostParams,
}

impl CostModel {
    pub fn new(params: CostParams) -> Self {
        Self { params }
    }

    /// Run all four components and combine them into a net cost.
    pub fn estimate(&self, book: &Orderbook, inputs: &SimulationInputs) -> CostEstimate {
        let quantity = inputs.quantity;
        let slippage = self.slippage(book, quantity);
        let fees = self.fees(quantity, inputs.fee_tier);
        let market_impact = self.market_impact(book, quantity, inputs.volatility);
        let maker_taker_proportion = self.maker_taker_proportion(book, quantity);

        CostEstimate {
            slippage,
            fees,
            market_impact,
            maker_taker_proportion,
            net_cost: slippage * quantity + fees + market_impact * quantity,
        }
    }

    /// Average deviation from mid, as a fraction of `quantity`, for a buy
    /// that walks the ask side.
    pub fn slippage(&self, book: &Orderbook, quantity: f64) -> f64 {
        if book.asks.is_empty() || quantity <= 0.0 {
            return 0.0;
        }
        let mid = book.mid_price();
        if mid <= 0.0 {
            return 0.0;
        }

        let mut remaining = quantity;
        let mut cost = 0.0;

        for level in &book.asks {
            let price = level.price_f64();
            let level_notional = level.notional();
            let deviation = price / mid - 1.0;

            if level_notional >= remaining {
                cost += remaining * deviation;
                remaining = 0.0;
                break;
            }

            cost += level_notional * deviation;
            remaining -= level_notional;
        }

        if remaining > 0.0 {
            cost += remaining * self.params.unfilled_slippage_rate;
        }

        cost / quantity
    }

    pub fn fees(&self, quantity: f64, tier: FeeTier) -> f64 {
        quantity * self.params.fees.rate(tier)
    }

    /// `volatility × sqrt((quantity / mid) / estimated_daily_volume)`
    pub fn market_impact(&self, book: &Orderbook, quantity: f64, volatility: f64) -> f64 {
        let mid = book.mid_price();
        if mid <= 0.0 || quantity <= 0.0 {
            return 0.0;
        }

        let mut daily_volume = book.total_size() * self.params.turnover_multiplier;
        if daily_volume <= 0.0 {
            daily_volume = quantity * self.params.volume_floor_multiplier;
        }
        if daily_volume <= 0.0 {
            return 0.0;
        }

        let base_quantity = quantity / mid;
        volatility * (base_quantity / daily_volume).sqrt()
    }

    /// `f / (1 − f)` where `f = min(cap, depth × liquidity / (quantity × scale))`.
    pub fn maker_taker_proportion(&self, book: &Orderbook, quantity: f64) -> f64 {
        let scaled_quantity = quantity * self.params.maker_liquidity_scale;
        if scaled_quantity <= 0.0 {
            return 0.0;
        }

        let depth = book.depth() as f64;
        let liquidity = book.liquidity();
        let maker_fraction = ((depth * liquidity) / scaled_quantity)
            .min(self.params.maker_fraction_cap)
            .max(0.0);

        maker_fraction / (1.0 - maker_fraction)
    }
}
