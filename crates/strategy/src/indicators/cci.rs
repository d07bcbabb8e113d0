use common::Candle;

/// Commodity Channel Index.
///
/// CCI = (TP − SMA(TP)) / (0.015 × mean deviation), where TP = (high + low + close) / 3.
#[derive(Debug, Clone)]
pub struct CciIndicator {
    pub period: usize,
}

const LAMBERT: f64 = 0.015;

impl CciIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "CCI period must be >= 2");
        Self { period }
    }

    /// CCI for every candle, oldest first. The first `period - 1` entries are `NaN`.
    /// A flat window (zero mean deviation) yields `0.0`.
    pub fn series(&self, candles: &[Candle]) -> Vec<f64> {
        let mut out = vec![f64::NAN; candles.len()];
        if candles.len() < self.period {
            return out;
        }

        let typical: Vec<f64> = candles
            .iter()
            .map(|c| (c.high + c.low + c.close) / 3.0)
            .collect();
        let n = self.period as f64;

        for i in (self.period - 1)..typical.len() {
            let window = &typical[i + 1 - self.period..=i];
            let mean = window.iter().sum::<f64>() / n;
            let mean_dev = window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / n;
            out[i] = if mean_dev == 0.0 {
                0.0
            } else {
                (typical[i] - mean) / (LAMBERT * mean_dev)
            };
        }
        out
    }
}
