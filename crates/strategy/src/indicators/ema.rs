/// Exponential Moving Average.
///
/// Seeded with the SMA of the first `period` values, then smoothed with
/// `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct EmaIndicator {
    pub period: usize,
}

impl EmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self { period }
    }

    /// EMA for every input position, oldest first. The first `period - 1`
    /// entries are `NaN`.
    pub fn series(&self, values: &[f64]) -> Vec<f64> {
        let mut out = vec![f64::NAN; values.len()];
        if values.len() < self.period {
            return out;
        }

        let k = 2.0 / (self.period as f64 + 1.0);
        let seed = values[..self.period].iter().sum::<f64>() / self.period as f64;
        out[self.period - 1] = seed;

        let mut prev = seed;
        for (i, &value) in values.iter().enumerate().skip(self.period) {
            prev = value * k + prev * (1.0 - k);
            out[i] = prev;
        }
        out
    }
}
