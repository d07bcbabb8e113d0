use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use common::{Candle, CandleSeries, Error, Interval, MarketDataSource, Result, WalletBalance};

const BASE_PRICE: f64 = 100.0;
const STEP: f64 = 0.1;

/// Simulated market-data source for paper runs.
///
/// Every call generates a fresh random walk around `BASE_PRICE`. Candles sit
/// on interval boundaries and the newest one is the currently forming candle.
/// No network calls are ever made.
pub struct SimulatedMarket {
    name: String,
    balance_usdt: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedMarket {
    pub fn new(name: impl Into<String>, balance_usdt: f64) -> Self {
        Self::with_rng(name, balance_usdt, StdRng::from_entropy())
    }

    /// Reproducible walks for tests.
    pub fn seeded(name: impl Into<String>, balance_usdt: f64, seed: u64) -> Self {
        Self::with_rng(name, balance_usdt, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, balance_usdt: f64, rng: StdRng) -> Self {
        let name = name.into();
        info!(source = %name, balance = balance_usdt, "SimulatedMarket initialized");
        Self {
            name,
            balance_usdt,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl MarketDataSource for SimulatedMarket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_historical_data(
        &self,
        instrument: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries> {
        let step = interval.as_secs();
        let now = Utc::now().timestamp();
        let newest = now - now.rem_euclid(step);

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut close = BASE_PRICE;
        let mut candles = Vec::with_capacity(limit);

        for i in 0..limit {
            let back = (limit - 1 - i) as i64;
            let open_time = Utc
                .timestamp_opt(newest - back * step, 0)
                .single()
                .ok_or_else(|| Error::fetch(instrument, "candle timestamp out of range"))?;

            let open = close;
            close = (close + rng.gen_range(-1.0..1.0) * STEP).max(0.01);
            let high = open.max(close) + rng.gen_range(0.0..0.5);
            let low = (open.min(close) - rng.gen_range(0.0..0.5)).max(0.0);

            candles.push(Candle {
                open_time,
                open,
                high,
                low,
                close,
                volume: rng.gen_range(100.0..1000.0),
            });
        }

        debug!(instrument, %interval, count = candles.len(), "Simulated candles");
        Ok(CandleSeries::new(candles))
    }

    async fn get_wallet_balance(&self) -> Result<Vec<WalletBalance>> {
        Ok(vec![WalletBalance {
            currency: "USDT".into(),
            balance: self.balance_usdt,
        }])
    }
}
