use common::{CandleSeries, Direction, Signal};

use crate::indicators::{CciIndicator, EmaIndicator, RsiIndicator};
use crate::{EnrichedSeries, IndicatorRow, OpenTrades, Strategy};

pub const EMA_FAST: &str = "ema_fast";
pub const EMA_TREND: &str = "ema_trend";
pub const CCI: &str = "cci";
pub const RSI: &str = "rsi";

fn signal(row: &IndicatorRow<'_>, direction: Direction, strategy: &str) -> Signal {
    Signal {
        instrument: row.instrument().to_string(),
        direction,
        price: row.close(),
        strategy: strategy.to_string(),
        timestamp: row.candle().open_time,
    }
}

// ─── EMA trend + CCI ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EmaCciParams {
    pub ema_fast_period: usize,
    pub ema_trend_period: usize,
    pub cci_period: usize,
    pub cci_long_level: f64,
    pub cci_short_level: f64,
    pub use_long_signals: bool,
    pub use_short_signals: bool,
}

impl Default for EmaCciParams {
    fn default() -> Self {
        Self {
            ema_fast_period: 50,
            ema_trend_period: 200,
            cci_period: 100,
            cci_long_level: 100.0,
            cci_short_level: -100.0,
            use_long_signals: true,
            use_short_signals: true,
        }
    }
}

/// Long above the trend EMA with CCI over the upper level, short below it
/// with CCI under the lower level.
pub struct EmaCciStrategy {
    name: String,
    params: EmaCciParams,
    fast: EmaIndicator,
    trend: EmaIndicator,
    cci: CciIndicator,
}

impl EmaCciStrategy {
    pub fn new(name: impl Into<String>, params: EmaCciParams) -> Self {
        Self {
            name: name.into(),
            fast: EmaIndicator::new(params.ema_fast_period),
            trend: EmaIndicator::new(params.ema_trend_period),
            cci: CciIndicator::new(params.cci_period),
            params,
        }
    }
}

impl Strategy for EmaCciStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.params
            .ema_trend_period
            .max(self.params.ema_fast_period)
            .max(self.params.cci_period)
    }

    fn enrich(&self, instrument: &str, series: &CandleSeries) -> EnrichedSeries {
        let bare = EnrichedSeries::bare(instrument, series.clone());
        if series.len() < self.min_history() {
            return bare;
        }
        let closes = series.closes();
        bare.with_column(EMA_FAST, self.fast.series(&closes))
            .with_column(EMA_TREND, self.trend.series(&closes))
            .with_column(CCI, self.cci.series(series.candles()))
    }

    fn evaluate(&self, row: &IndicatorRow<'_>, _open_trades: &OpenTrades) -> Option<Signal> {
        let trend = row.value(EMA_TREND)?;
        let cci = row.value(CCI)?;
        let close = row.close();

        if self.params.use_long_signals && close > trend && cci > self.params.cci_long_level {
            Some(signal(row, Direction::Long, &self.name))
        } else if self.params.use_short_signals
            && close < trend
            && cci < self.params.cci_short_level
        {
            Some(signal(row, Direction::Short, &self.name))
        } else {
            None
        }
    }
}

// ─── EMA trend + RSI ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RsiTrendParams {
    pub rsi_period: usize,
    pub ema_trend_period: usize,
    pub rsi_long_level: f64,
    pub rsi_short_level: f64,
    pub use_long_signals: bool,
    pub use_short_signals: bool,
}

impl Default for RsiTrendParams {
    fn default() -> Self {
        Self {
            rsi_period: 25,
            ema_trend_period: 100,
            rsi_long_level: 60.0,
            rsi_short_level: 40.0,
            use_long_signals: true,
            use_short_signals: false,
        }
    }
}

/// Long above the trend EMA with RSI over the upper level, short below it with
/// RSI under the lower level.
pub struct RsiTrendStrategy {
    name: String,
    params: RsiTrendParams,
    rsi: RsiIndicator,
    trend: EmaIndicator,
}

impl RsiTrendStrategy {
    pub fn new(name: impl Into<String>, params: RsiTrendParams) -> Self {
        Self {
            name: name.into(),
            rsi: RsiIndicator::new(params.rsi_period),
            trend: EmaIndicator::new(params.ema_trend_period),
            params,
        }
    }
}

impl Strategy for RsiTrendStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_history(&self) -> usize {
        self.params.ema_trend_period.max(self.params.rsi_period + 1)
    }

    fn enrich(&self, instrument: &str, series: &CandleSeries) -> EnrichedSeries {
        let bare = EnrichedSeries::bare(instrument, series.clone());
        if series.len() < self.min_history() {
            return bare;
        }
        let closes = series.closes();
        bare.with_column(RSI, self.rsi.series(&closes))
            .with_column(EMA_TREND, self.trend.series(&closes))
    }

    fn evaluate(&self, row: &IndicatorRow<'_>, _open_trades: &OpenTrades) -> Option<Signal> {
        let trend = row.value(EMA_TREND)?;
        let rsi = row.value(RSI)?;
        let close = row.close();

        if self.params.use_long_signals && close > trend && rsi > self.params.rsi_long_level {
            Some(signal(row, Direction::Long, &self.name))
        } else if self.params.use_short_signals
            && close < trend
            && rsi < self.params.rsi_short_level
        {
            Some(signal(row, Direction::Short, &self.name))
        } else {
            None
        }
    }
}
