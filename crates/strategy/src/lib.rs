pub mod config;
pub mod indicators;
pub mod registry;
pub mod strategies;

use std::collections::BTreeMap;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use registry::StrategyRegistry;
pub use strategies::{EmaCciStrategy, RsiTrendStrategy};

use common::{ActiveTrade, Candle, CandleSeries, Signal};

/// Open trades for one `(exchange, strategy)`, keyed by instrument.
pub type OpenTrades = BTreeMap<String, ActiveTrade>;

/// All strategy implementations must satisfy this trait.
///
/// Strategies hold immutable configuration only; both methods are pure.
pub trait Strategy: Send + Sync {
    /// Name of this strategy instance. Part of every `TradeKey` it produces.
    fn name(&self) -> &str;

    /// Longest lookback window the indicators need.
    fn min_history(&self) -> usize;

    /// Compute indicator columns over the full series.
    ///
    /// Returns the series without indicator columns when it is shorter than
    /// `min_history()`.
    fn enrich(&self, instrument: &str, series: &CandleSeries) -> EnrichedSeries;

    /// Inspect the newest enriched row and emit at most one signal.
    ///
    /// Must return `None` when any indicator it reads is missing or `NaN`.
    fn evaluate(&self, row: &IndicatorRow<'_>, open_trades: &OpenTrades) -> Option<Signal>;
}

/// A candle series plus named indicator columns of the same length.
#[derive(Debug, Clone)]
pub struct EnrichedSeries {
    instrument: String,
    series: CandleSeries,
    columns: BTreeMap<&'static str, Vec<f64>>,
}

impl EnrichedSeries {
    /// A series with no indicators.
    pub fn bare(instrument: impl Into<String>, series: CandleSeries) -> Self {
        Self {
            instrument: instrument.into(),
            series,
            columns: BTreeMap::new(),
        }
    }

    /// Attach an indicator column. Columns must match the series length.
    pub fn with_column(mut self, name: &'static str, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.series.len(), "column '{name}' length mismatch");
        self.columns.insert(name, values);
        self
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn is_enriched(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn latest_row(&self) -> Option<IndicatorRow<'_>> {
        let index = self.series.len().checked_sub(1)?;
        Some(IndicatorRow { enriched: self, index })
    }
}

/// View of one row of an `EnrichedSeries`.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorRow<'a> {
    enriched: &'a EnrichedSeries,
    index: usize,
}

impl<'a> IndicatorRow<'a> {
    pub fn instrument(&self) -> &'a str {
        &self.enriched.instrument
    }

    pub fn candle(&self) -> &'a Candle {
        &self.enriched.series.candles()[self.index]
    }

    pub fn close(&self) -> f64 {
        self.candle().close
    }

    /// Indicator value at this row. `None` if the column is absent or the value is `NaN`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.enriched
            .columns
            .get(name)
            .and_then(|col| col.get(self.index))
            .copied()
            .filter(|v| !v.is_nan())
    }
}
