use serde::{Deserialize, Serialize};
use std::path::Path;

use tsim_model::{CostParams, SimulationInputs};

use crate::error::ConfigError;
use crate::feed::FeedConfig;

/// Top-level configuration document.
///
/// ```yaml
/// feed:
///   endpoint: wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP
///   reconnect:
///     base_delay_ms: 1000
///     max_attempts: 5
/// model:
///   turnover_multiplier: 100
///   fees:
///     vip1: 0.0008
/// inputs:
///   quantity: 100
///   fee_tier: VIP1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub feed: FeedConfig,
    pub model: CostParams,
    /// Initial trade inputs before any consumer writes its own
    pub inputs: SimulationInputs,
}

impl SimulatorConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document, treat it as all defaults
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SimulatorConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.feed.validate()?;
        validate_model(&self.model)?;
        self.inputs
            .validate()
            .map_err(|e| ConfigError::Validation(format!("inputs: {}", e)))
    }
}

fn validate_model(params: &CostParams) -> Result<(), ConfigError> {
    let non_negative = [
        ("model.unfilled_slippage_rate", params.unfilled_slippage_rate),
        ("model.fees.vip1", params.fees.vip1),
        ("model.fees.vip2", params.fees.vip2),
        ("model.fees.vip3", params.fees.vip3),
        ("model.fees.vip4", params.fees.vip4),
        ("model.fees.vip5", params.fees.vip5),
    ];
    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be a non-negative number, got {}",
                name, value
            )));
        }
    }

    let positive = [
        ("model.turnover_multiplier", params.turnover_multiplier),
        ("model.volume_floor_multiplier", params.volume_floor_multiplier),
        ("model.maker_liquidity_scale", params.maker_liquidity_scale),
    ];
    for (name, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
    }

    if !(params.maker_fraction_cap >= 0.0 && params.maker_fraction_cap < 1.0) {
        return Err(ConfigError::Validation(format!(
            "model.maker_fraction_cap must be in [0, 1), got {}",
            params.maker_fraction_cap
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tsim_model::FeeTier;

    #[test]
    fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
feed:
  endpoint: wss://feed.example.com/ws/l2-orderbook/okx/ETH-USDT-SWAP
  symbol: ETH-USDT-SWAP
  reconnect:
    base_delay_ms: 500
model:
  turnover_multiplier: 250
  fees:
    vip2: 0.00065
inputs:
  asset: ETH-USDT
  quantity: 2500
  fee_tier: VIP2
"#
        )
        .unwrap();

        let config = SimulatorConfig::load(file.path()).unwrap();
        assert_eq!(config.feed.symbol, "ETH-USDT-SWAP");
        assert_eq!(config.feed.reconnect.base_delay_ms, 500);
        assert_eq!(config.feed.reconnect.max_attempts, 5);
        assert_eq!(config.feed.heartbeat.interval_ms, 5000);
        assert_eq!(config.model.turnover_multiplier, 250.0);
        assert_eq!(config.model.fees.vip2, 0.00065);
        assert_eq!(config.model.fees.vip1, 0.0008);
        assert_eq!(config.model.maker_fraction_cap, 0.8);
        assert_eq!(config.inputs.asset, "ETH-USDT");
        assert_eq!(config.inputs.quantity, 2500.0);
        assert_eq!(config.inputs.fee_tier, FeeTier::Vip2);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = SimulatorConfig::from_yaml("").unwrap();
        assert_eq!(config, SimulatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = SimulatorConfig::load(Path::new("/nonexistent/tsim.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = SimulatorConfig::from_yaml("feed: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_rejects_maker_cap_of_one() {
        let err = SimulatorConfig::from_yaml("model:\n  maker_fraction_cap: 1.0\n").unwrap_err();
        assert!(err.to_string().contains("maker_fraction_cap"));
    }

    #[test]
    fn test_rejects_invalid_default_inputs() {
        let err = SimulatorConfig::from_yaml("inputs:\n  volatility: 2.0\n").unwrap_err();
        assert!(err.to_string().starts_with("validation error: inputs:"));
    }
}
