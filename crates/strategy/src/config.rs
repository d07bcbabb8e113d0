use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result};

/// Top-level strategy config file (TOML). Table order is evaluation priority.
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "ema_cci"
/// name = "main_strategy"
///
/// [strategy.params]
/// ema_trend_period = 200
/// cci_period = 100
/// cci_long_level = 100.0
/// cci_short_level = -100.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier: "ema_cci" or "rsi_trend".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Instance name. Used in trade keys and logs.
    pub name: String,
    /// Inactive strategies stay in the file but are not registered.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Indicator-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

fn default_enabled() -> bool {
    true
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordered_strategies_with_params() {
        let cfg = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "ema_cci"
            name = "main_strategy"
            [strategy.params]
            cci_long_level = 120.0

            [[strategy]]
            type = "rsi_trend"
            name = "rsi_cci_strategy"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.strategies.len(), 2);
        assert_eq!(cfg.strategies[0].name, "main_strategy");
        assert!(cfg.strategies[0].enabled);
        assert_eq!(
            cfg.strategies[0].params.get("cci_long_level").and_then(|v| v.as_float()),
            Some(120.0)
        );
        assert!(!cfg.strategies[1].enabled);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            StrategyFileConfig::from_toml_str("[[strategy]]\nname = 3"),
            Err(Error::StrategyFile(_))
        ));
    }

    #[test]
    fn missing_file_is_config_error() {
        assert!(matches!(
            StrategyFileConfig::load("/nonexistent/strategies.toml"),
            Err(Error::Config(_))
        ));
    }
}
