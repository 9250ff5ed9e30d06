use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// The only venue the feed is wired to.
pub const SUPPORTED_EXCHANGE: &str = "OKX";

/// Exchange fee tier. Strings other than `VIP1`..`VIP5` decode to
/// [`FeeTier::Unrecognized`], which is priced like VIP1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    #[default]
    #[serde(rename = "VIP1")]
    Vip1,
    #[serde(rename = "VIP2")]
    Vip2,
    #[serde(rename = "VIP3")]
    Vip3,
    #[serde(rename = "VIP4")]
    Vip4,
    #[serde(rename = "VIP5")]
    Vip5,
    #[serde(other)]
    Unrecognized,
}

impl FeeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeTier::Vip1 => "VIP1",
            FeeTier::Vip2 => "VIP2",
            FeeTier::Vip3 => "VIP3",
            FeeTier::Vip4 => "VIP4",
            FeeTier::Vip5 => "VIP5",
            FeeTier::Unrecognized => "Unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

/// User-editable trade parameters, passed by value into every recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationInputs {
    pub exchange: String,
    pub asset: String,
    pub order_type: OrderType,
    /// Order size in quote-currency units (USD)
    pub quantity: f64,
    /// Fractional daily volatility
    pub volatility: f64,
    pub fee_tier: FeeTier,
}

impl Default for SimulationInputs {
    fn default() -> Self {
        Self {
            exchange: SUPPORTED_EXCHANGE.to_string(),
            asset: "BTC-USDT".to_string(),
            order_type: OrderType::Market,
            quantity: 100.0,
            volatility: 0.05,
            fee_tier: FeeTier::Vip1,
        }
    }
}

impl SimulationInputs {
    /// Reject inputs the write accessor must not accept.
    ///
    /// The cost model itself never calls this; it degrades to zero costs on
    /// bad numbers instead.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.exchange != SUPPORTED_EXCHANGE {
            return Err(InputError::UnsupportedExchange(self.exchange.clone()));
        }
        if self.asset.trim().is_empty() {
            return Err(InputError::EmptyAsset);
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(InputError::Quantity(self.quantity));
        }
        // written so NaN fails too
        if !(self.volatility > 0.0 && self.volatility <= 1.0) {
            return Err(InputError::Volatility(self.volatility));
        }
        Ok(())
    }
}
