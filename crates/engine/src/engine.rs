use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use common::{
    ActiveTrade, BotEvent, CandleSeries, Config, Error, EventSink, FreshnessReport, Interval,
    MarketDataSource, Result, Signal, TradeKey, WalletBalance,
};
use storage::CandleStore;
use strategy::StrategyRegistry;

use crate::freshness::FreshnessPolicy;
use crate::health::HealthMonitor;
use crate::trade_book::{TradeBook, TradeDecision};

/// The per-instrument knobs the engine needs from `Config`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub exchange: String,
    pub interval: Interval,
    pub history_limit: usize,
    pub min_candles: usize,
    pub auto_trading: bool,
    pub freshness: FreshnessPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            exchange: config.exchange.clone(),
            interval: config.candle_interval,
            history_limit: config.candle_history_limit,
            min_candles: config.min_candles_for_trading,
            auto_trading: config.auto_trading,
            freshness: FreshnessPolicy::new(config.freshness_check_enabled, config.max_data_age),
        }
    }
}

/// What happened to one instrument in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    TradeOpened { signal: Signal },
    SignalIgnored { signal: Signal, decision: TradeDecision },
    NoSignal,
    StaleData { report: FreshnessReport },
    InsufficientData { have: usize, need: usize },
    Failed { reason: String },
}

impl InstrumentOutcome {
    /// Everything except `Failed` counts as completing the cycle without error.
    pub fn is_success(&self) -> bool {
        !matches!(self, InstrumentOutcome::Failed { .. })
    }
}

/// Owns the per-cycle pipeline for one instrument: acquire candles, validate,
/// evaluate strategies, execute the winning signal.
///
/// All shared state is held here and handed to tasks as `Arc<TradingEngine>`.
pub struct TradingEngine {
    source: Arc<dyn MarketDataSource>,
    store: CandleStore,
    registry: StrategyRegistry,
    trades: Arc<TradeBook>,
    health: Arc<HealthMonitor>,
    settings: EngineSettings,
    events: EventSink,
}

impl TradingEngine {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        store: CandleStore,
        registry: StrategyRegistry,
        trades: Arc<TradeBook>,
        health: Arc<HealthMonitor>,
        settings: EngineSettings,
        events: EventSink,
    ) -> Self {
        Self {
            source,
            store,
            registry,
            trades,
            health,
            settings,
            events,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.settings.exchange
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn trades(&self) -> &Arc<TradeBook> {
        &self.trades
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn wallet(&self) -> Result<Vec<WalletBalance>> {
        self.source.get_wallet_balance().await
    }

    /// Run one instrument's cycle. Errors never escape: they are recorded with
    /// the health monitor and reported as `Failed`.
    pub async fn run_instrument(&self, instrument: &str) -> InstrumentOutcome {
        match self.process_instrument(instrument).await {
            Ok(outcome) => outcome,
            Err(Error::PoolTimeout) => {
                warn!(instrument, "No database connection available, skipping this cycle");
                self.health.record_db_failure();
                InstrumentOutcome::Failed {
                    reason: Error::PoolTimeout.to_string(),
                }
            }
            Err(e) => {
                error!(instrument, error = %e, "Error processing instrument");
                if matches!(e, Error::Database(_)) {
                    self.health.record_db_failure();
                }
                self.health.record_fetch_failure(instrument);
                InstrumentOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub async fn process_instrument(&self, instrument: &str) -> Result<InstrumentOutcome> {
        let series = self.load_series(instrument).await?;

        let report = self.settings.freshness.check(&series);
        if !report.is_fresh {
            warn!(instrument, age = report.age_seconds, "{}", report.message);
            return Ok(InstrumentOutcome::StaleData { report });
        }

        if series.len() < self.settings.min_candles {
            info!(
                instrument,
                have = series.len(),
                need = self.settings.min_candles,
                "Insufficient data for trading"
            );
            return Ok(InstrumentOutcome::InsufficientData {
                have: series.len(),
                need: self.settings.min_candles,
            });
        }

        let exchange = self.exchange();
        let signal = self.registry.first_signal(instrument, &series, |strategy| {
            self.trades.open_for(exchange, strategy)
        });

        let Some(signal) = signal else {
            debug!(instrument, "No signal");
            return Ok(InstrumentOutcome::NoSignal);
        };

        Ok(match self.execute_trade(&signal) {
            TradeDecision::Opened => InstrumentOutcome::TradeOpened { signal },
            decision => {
                debug!(instrument, strategy = %signal.strategy, %decision, "Signal not executed");
                InstrumentOutcome::SignalIgnored { signal, decision }
            }
        })
    }

    /// Cached candles when the cache is current and deep enough, otherwise a
    /// fresh fetch written back to the cache.
    pub async fn load_series(&self, instrument: &str) -> Result<CandleSeries> {
        let interval = self.settings.interval;
        let limit = self.settings.history_limit;

        if let Some(latest) = self.store.latest_timestamp(instrument, interval).await? {
            let age = (Utc::now() - latest).num_seconds();
            if age < interval.as_secs() {
                let cached = self.store.query(instrument, interval, limit).await?;
                if cached.len() >= self.settings.min_candles {
                    debug!(instrument, rows = cached.len(), "Using cached candles");
                    return Ok(cached);
                }
            }
        }

        debug!(instrument, source = self.source.name(), %interval, limit, "Fetching candles");
        let fetched = self
            .source
            .get_historical_data(instrument, interval, limit)
            .await
            .map_err(|e| match e {
                e @ Error::TransientFetch { .. } => e,
                other => Error::fetch(instrument, other),
            })?;

        self.store.upsert(&fetched, instrument, interval).await;
        Ok(fetched.tail(limit))
    }

    /// Open a trade for `signal` if auto-trading is on, trading is enabled and
    /// no trade is open for the same key.
    pub fn execute_trade(&self, signal: &Signal) -> TradeDecision {
        if !self.settings.auto_trading {
            return TradeDecision::AutoTradingDisabled;
        }

        let key = TradeKey::new(self.exchange(), &signal.strategy, &signal.instrument);
        let trade = ActiveTrade {
            entry_price: signal.price,
            direction: signal.direction,
            opened_at: Utc::now(),
        };

        let decision = self.trades.try_open(key, trade);
        if decision == TradeDecision::Opened {
            info!(
                instrument = %signal.instrument,
                strategy = %signal.strategy,
                direction = %signal.direction,
                price = signal.price,
                exchange = %self.exchange(),
                "Trade opened"
            );
            self.events.emit(BotEvent::TradeOpened {
                exchange: self.exchange().to_string(),
                signal: signal.clone(),
            });
        }
        decision
    }

    /// Drop every cached candle for `instrument`.
    pub async fn purge_cache(&self, instrument: &str) -> Result<u64> {
        let removed = self.store.purge(instrument).await?;
        info!(instrument, rows = removed, "Purged cached candles");
        Ok(removed)
    }
}
