use async_trait::async_trait;

use crate::{CandleSeries, Interval, Result, WalletBalance};

/// Abstraction over an exchange's market-data endpoint.
///
/// `SimulatedMarket` in `crates/paper` implements this for paper runs. A real
/// exchange transport plugs in here without touching the engine.
///
/// Implementations must be safe to call repeatedly. Errors are caught per
/// instrument by the `TradingEngine` and never abort a cycle.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name, for logs.
    fn name(&self) -> &str;

    /// Fetch up to `limit` of the most recent candles, oldest first.
    async fn get_historical_data(
        &self,
        instrument: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<CandleSeries>;

    /// Query account balances.
    async fn get_wallet_balance(&self) -> Result<Vec<WalletBalance>>;
}
