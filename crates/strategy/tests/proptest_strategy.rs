use chrono::{TimeZone, Utc};
use common::{Candle, CandleSeries};
use proptest::prelude::*;
use strategy::strategies::{EmaCciParams, RsiTrendParams};
use strategy::{EmaCciStrategy, OpenTrades, RsiTrendStrategy, Strategy};

fn to_series(closes: &[f64]) -> CandleSeries {
    CandleSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: Utc.timestamp_opt(i as i64 * 300, 0).unwrap(),
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                volume: 1.0,
            })
            .collect(),
    )
}

fn strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(EmaCciStrategy::new(
            "ema_cci",
            EmaCciParams {
                ema_fast_period: 5,
                ema_trend_period: 30,
                cci_period: 20,
                ..EmaCciParams::default()
            },
        )),
        Box::new(RsiTrendStrategy::new(
            "rsi_trend",
            RsiTrendParams {
                rsi_period: 14,
                ema_trend_period: 30,
                use_short_signals: true,
                ..RsiTrendParams::default()
            },
        )),
    ]
}

proptest! {
    /// Series shorter than the longest lookback never produce a signal.
    #[test]
    fn short_series_never_signal(
        closes in prop::collection::vec(0.0001f64..1_000_000.0f64, 0..30),
    ) {
        let series = to_series(&closes);
        for strategy in strategies() {
            prop_assume!(series.len() < strategy.min_history());
            let enriched = strategy.enrich("TEST", &series);
            prop_assert!(!enriched.is_enriched());
            if let Some(row) = enriched.latest_row() {
                prop_assert!(strategy.evaluate(&row, &OpenTrades::new()).is_none());
            }
        }
    }

    /// Enrichment and evaluation on arbitrary price paths must never panic, and
    /// any signal carries the latest close.
    #[test]
    fn evaluation_never_panics(
        closes in prop::collection::vec(0.0001f64..1_000_000.0f64, 30..120),
    ) {
        let series = to_series(&closes);
        for strategy in strategies() {
            let enriched = strategy.enrich("TEST", &series);
            let row = enriched.latest_row().unwrap();
            if let Some(signal) = strategy.evaluate(&row, &OpenTrades::new()) {
                prop_assert_eq!(signal.price, *closes.last().unwrap());
                prop_assert_eq!(signal.instrument.as_str(), "TEST");
            }
        }
    }
}
