use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use common::{CandleSeries, Error, Result, Signal};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::strategies::{EmaCciParams, EmaCciStrategy, RsiTrendParams, RsiTrendStrategy};
use crate::{OpenTrades, Strategy};

/// Active strategies in fixed priority order, resolved once at startup.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Build the registry from config. Unknown types, bad parameters, duplicate
    /// names and an empty active set are configuration errors.
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self> {
        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
        let mut seen = HashSet::new();

        for cfg in file_cfg.strategies.iter().filter(|s| s.enabled) {
            if !seen.insert(cfg.name.clone()) {
                return Err(Error::Config(format!("duplicate strategy name '{}'", cfg.name)));
            }
            let strategy = build_strategy(cfg)?;
            info!(
                name = %strategy.name(),
                kind = %cfg.strategy_type,
                min_history = strategy.min_history(),
                "Registered strategy"
            );
            strategies.push(strategy);
        }

        if strategies.is_empty() {
            return Err(Error::Config("no active strategies configured".into()));
        }
        Ok(Self { strategies })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Evaluate strategies in priority order against one instrument's series.
    /// The first signal wins; later strategies are not enriched or evaluated.
    ///
    /// `open_trades_for` returns the open trades of the named strategy.
    pub fn first_signal<F>(
        &self,
        instrument: &str,
        series: &CandleSeries,
        open_trades_for: F,
    ) -> Option<Signal>
    where
        F: Fn(&str) -> OpenTrades,
    {
        for strategy in &self.strategies {
            let enriched = strategy.enrich(instrument, series);
            if !enriched.is_enriched() {
                debug!(
                    instrument,
                    strategy = %strategy.name(),
                    have = series.len(),
                    need = strategy.min_history(),
                    "Not enough history for indicators"
                );
                continue;
            }
            let Some(row) = enriched.latest_row() else {
                continue;
            };
            let open = open_trades_for(strategy.name());
            if let Some(signal) = strategy.evaluate(&row, &open) {
                debug!(instrument, strategy = %strategy.name(), direction = %signal.direction, "Signal");
                return Some(signal);
            }
        }
        None
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(cfg: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    let p = &cfg.params;
    match cfg.strategy_type.as_str() {
        "ema_cci" => {
            let d = EmaCciParams::default();
            let params = EmaCciParams {
                ema_fast_period: param_period(p, "ema_fast_period", d.ema_fast_period, 1)?,
                ema_trend_period: param_period(p, "ema_trend_period", d.ema_trend_period, 1)?,
                cci_period: param_period(p, "cci_period", d.cci_period, 2)?,
                cci_long_level: param_f64(p, "cci_long_level", d.cci_long_level),
                cci_short_level: param_f64(p, "cci_short_level", d.cci_short_level),
                use_long_signals: param_bool(p, "use_long_signals", d.use_long_signals),
                use_short_signals: param_bool(p, "use_short_signals", d.use_short_signals),
            };
            Ok(Box::new(EmaCciStrategy::new(cfg.name.clone(), params)))
        }
        "rsi_trend" => {
            let d = RsiTrendParams::default();
            let params = RsiTrendParams {
                rsi_period: param_period(p, "rsi_period", d.rsi_period, 2)?,
                ema_trend_period: param_period(p, "ema_trend_period", d.ema_trend_period, 1)?,
                rsi_long_level: param_f64(p, "rsi_long_level", d.rsi_long_level),
                rsi_short_level: param_f64(p, "rsi_short_level", d.rsi_short_level),
                use_long_signals: param_bool(p, "use_long_signals", d.use_long_signals),
                use_short_signals: param_bool(p, "use_short_signals", d.use_short_signals),
            };
            Ok(Box::new(RsiTrendStrategy::new(cfg.name.clone(), params)))
        }
        other => Err(Error::Config(format!(
            "unknown strategy type '{other}' for '{}'",
            cfg.name
        ))),
    }
}

fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    match params.get(key) {
        Some(toml::Value::Float(f)) => *f,
        Some(toml::Value::Integer(i)) => *i as f64,
        _ => default,
    }
}

fn param_bool(params: &HashMap<String, toml::Value>, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn param_period(
    params: &HashMap<String, toml::Value>,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize> {
    let value = match params.get(key) {
        None => return Ok(default),
        Some(v) => v.as_integer(),
    };
    match value {
        Some(v) if v >= min as i64 => Ok(v as usize),
        _ => Err(Error::Config(format!("strategy parameter '{key}' must be an integer >= {min}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnrichedSeries, IndicatorRow};
    use chrono::{TimeZone, Utc};
    use common::{Candle, Direction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Emits a fixed direction (or nothing) and counts how often it was evaluated.
    struct Fixed {
        name: &'static str,
        direction: Option<Direction>,
        min_history: usize,
        calls: Arc<AtomicUsize>,
    }

    impl Strategy for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn min_history(&self) -> usize {
            self.min_history
        }

        fn enrich(&self, instrument: &str, series: &CandleSeries) -> EnrichedSeries {
            let bare = EnrichedSeries::bare(instrument, series.clone());
            if series.len() < self.min_history {
                return bare;
            }
            bare.with_column("x", vec![1.0; series.len()])
        }

        fn evaluate(&self, row: &IndicatorRow<'_>, _open: &OpenTrades) -> Option<Signal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.direction.map(|direction| Signal {
                instrument: row.instrument().to_string(),
                direction,
                price: row.close(),
                strategy: self.name.to_string(),
                timestamp: row.candle().open_time,
            })
        }
    }

    fn fixed(
        name: &'static str,
        direction: Option<Direction>,
        min_history: usize,
    ) -> (Box<dyn Strategy>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = Fixed {
            name,
            direction,
            min_history,
            calls: calls.clone(),
        };
        (Box::new(strategy), calls)
    }

    fn series(n: usize) -> CandleSeries {
        CandleSeries::new(
            (0..n)
                .map(|i| Candle {
                    open_time: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                })
                .collect(),
        )
    }

    #[test]
    fn first_signal_wins_and_short_circuits() {
        let (silent, silent_calls) = fixed("silent", None, 1);
        let (first, _) = fixed("first", Some(Direction::Long), 1);
        let (second, second_calls) = fixed("second", Some(Direction::Short), 1);
        let registry = StrategyRegistry::new(vec![silent, first, second]);

        let sig = registry
            .first_signal("BTC", &series(5), |_| OpenTrades::new())
            .unwrap();
        assert_eq!(sig.strategy, "first");
        assert_eq!(sig.direction, Direction::Long);
        assert_eq!(silent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strategies_without_enough_history_are_skipped() {
        let (hungry, hungry_calls) = fixed("hungry", Some(Direction::Long), 100);
        let (fallback, _) = fixed("fallback", Some(Direction::Short), 3);
        let registry = StrategyRegistry::new(vec![hungry, fallback]);

        let sig = registry
            .first_signal("BTC", &series(10), |_| OpenTrades::new())
            .unwrap();
        assert_eq!(sig.strategy, "fallback");
        assert_eq!(hungry_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_series_yields_nothing() {
        let (any, _) = fixed("any", Some(Direction::Long), 0);
        let registry = StrategyRegistry::new(vec![any]);
        assert!(registry
            .first_signal("BTC", &CandleSeries::default(), |_| OpenTrades::new())
            .is_none());
    }

    #[test]
    fn from_config_preserves_file_order_and_skips_disabled() {
        let cfg = StrategyFileConfig::from_toml_str(
            r#"
            [[strategy]]
            type = "rsi_trend"
            name = "rsi_cci_strategy"

            [[strategy]]
            type = "ema_cci"
            name = "disabled_one"
            enabled = false

            [[strategy]]
            type = "ema_cci"
            name = "main_strategy"
            [strategy.params]
            ema_trend_period = 150
            cci_long_level = 100
            "#,
        )
        .unwrap();
        let registry = StrategyRegistry::from_config(&cfg).unwrap();
        assert_eq!(registry.names(), vec!["rsi_cci_strategy", "main_strategy"]);
    }

    #[test]
    fn from_config_rejects_bad_input() {
        let cases = [
            "[[strategy]]\ntype = \"trf\"\nname = \"x\"",
            "[[strategy]]\ntype = \"ema_cci\"\nname = \"a\"\n[[strategy]]\ntype = \"ema_cci\"\nname = \"a\"",
            "[[strategy]]\ntype = \"ema_cci\"\nname = \"a\"\n[strategy.params]\ncci_period = 0",
            "[[strategy]]\ntype = \"ema_cci\"\nname = \"a\"\nenabled = false",
            "",
        ];
        for toml in cases {
            let cfg = StrategyFileConfig::from_toml_str(toml).unwrap();
            assert!(
                matches!(StrategyRegistry::from_config(&cfg), Err(Error::Config(_))),
                "accepted: {toml}"
            );
        }
    }
}
