use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One OHLCV bar. Keyed in storage by `(instrument, interval, open_time)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candles for one `(instrument, interval)`, ascending by `open_time`.
///
/// Never mutated in place: a cycle that needs newer data replaces the whole series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, sorting by `open_time` and dropping duplicate timestamps
    /// (the later entry wins, matching the store's replace-on-conflict rule).
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => deduped.push(candle),
            }
        }
        Self { candles: deduped }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Keep only the newest `limit` candles.
    pub fn tail(&self, limit: usize) -> Self {
        let start = self.candles.len().saturating_sub(limit);
        Self {
            candles: self.candles[start..].to_vec(),
        }
    }
}

/// Candle interval such as `1m`, `5m`, `1h` or `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    count: u32,
    unit: IntervalUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IntervalUnit {
    Minute,
    Hour,
    Day,
}

impl Interval {
    pub fn as_duration(&self) -> Duration {
        let unit_secs = match self.unit {
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3_600,
            IntervalUnit::Day => 86_400,
        };
        Duration::from_secs(u64::from(self.count) * unit_secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.as_duration().as_secs() as i64
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || Error::Config(format!("invalid candle interval '{s}'"));
        let suffix = s.chars().last().ok_or_else(bad)?;
        let unit = match suffix {
            'm' => IntervalUnit::Minute,
            'h' => IntervalUnit::Hour,
            'd' => IntervalUnit::Day,
            _ => return Err(bad()),
        };
        let num = &s[..s.len() - suffix.len_utf8()];
        let count: u32 = num.parse().map_err(|_| bad())?;
        if count == 0 {
            return Err(bad());
        }
        Ok(Interval { count, unit })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            IntervalUnit::Minute => "m",
            IntervalUnit::Hour => "h",
            IntervalUnit::Day => "d",
        };
        write!(f, "{}{unit}", self.count)
    }
}

/// Direction of a signal or an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Directional recommendation produced by a strategy within one cycle.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    pub price: f64,
    pub strategy: String,
    pub timestamp: DateTime<Utc>,
}

/// Identity of an open trade. At most one `ActiveTrade` exists per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradeKey {
    pub exchange: String,
    pub strategy: String,
    pub instrument: String,
}

impl TradeKey {
    pub fn new(
        exchange: impl Into<String>,
        strategy: impl Into<String>,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            strategy: strategy.into(),
            instrument: instrument.into(),
        }
    }
}

impl fmt::Display for TradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.exchange, self.strategy, self.instrument)
    }
}

/// Simplified ledger entry: entry price and direction only, no fills or fees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub entry_price: f64,
    pub direction: Direction,
    pub opened_at: DateTime<Utc>,
}

/// Age of the newest candle relative to wall-clock. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub is_fresh: bool,
    pub age_seconds: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub currency: String,
    pub balance: f64,
}
