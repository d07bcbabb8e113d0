use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::info;

use common::{ActiveTrade, TradeKey};
use strategy::OpenTrades;

/// Why a signal did or did not become an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDecision {
    Opened,
    /// A trade is already open for the same `(exchange, strategy, instrument)`.
    AlreadyOpen,
    /// Auto-trading is switched off in configuration.
    AutoTradingDisabled,
    /// The kill switch disabled trading and it has not been re-enabled.
    TradingDisabled,
}

impl std::fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeDecision::Opened => write!(f, "opened"),
            TradeDecision::AlreadyOpen => write!(f, "already open"),
            TradeDecision::AutoTradingDisabled => write!(f, "auto-trading disabled"),
            TradeDecision::TradingDisabled => write!(f, "trading disabled by kill switch"),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    trades: BTreeMap<TradeKey, ActiveTrade>,
    trading_disabled: bool,
}

/// Open trades keyed by `(exchange, strategy, instrument)` plus the global
/// trading-disabled flag.
///
/// One coarse lock guards both, so the kill switch clears every trade and
/// disables trading in a single step. Trade volume is low; contention is not a concern.
#[derive(Debug, Default)]
pub struct TradeBook {
    ledger: RwLock<Ledger>,
}

impl TradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a trade unless trading is disabled or the key already holds one.
    pub fn try_open(&self, key: TradeKey, trade: ActiveTrade) -> TradeDecision {
        let mut ledger = self.write();
        if ledger.trading_disabled {
            return TradeDecision::TradingDisabled;
        }
        if ledger.trades.contains_key(&key) {
            return TradeDecision::AlreadyOpen;
        }
        ledger.trades.insert(key, trade);
        TradeDecision::Opened
    }

    /// External close action. Returns the removed trade, if any.
    pub fn close(&self, key: &TradeKey) -> Option<ActiveTrade> {
        let removed = self.write().trades.remove(key);
        if let Some(trade) = &removed {
            info!(key = %key, direction = %trade.direction, entry = trade.entry_price, "Trade closed");
        }
        removed
    }

    pub fn get(&self, key: &TradeKey) -> Option<ActiveTrade> {
        self.read().trades.get(key).copied()
    }

    /// Snapshot of one strategy's open trades on one exchange, keyed by instrument.
    pub fn open_for(&self, exchange: &str, strategy: &str) -> OpenTrades {
        self.read()
            .trades
            .iter()
            .filter(|(k, _)| k.exchange == exchange && k.strategy == strategy)
            .map(|(k, t)| (k.instrument.clone(), *t))
            .collect()
    }

    pub fn all(&self) -> Vec<(TradeKey, ActiveTrade)> {
        self.read()
            .trades
            .iter()
            .map(|(k, t)| (k.clone(), *t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().trades.is_empty()
    }

    /// Remove every open trade and disable trading, under one write lock.
    pub fn emergency_exit(&self) -> Vec<(TradeKey, ActiveTrade)> {
        let mut ledger = self.write();
        ledger.trading_disabled = true;
        std::mem::take(&mut ledger.trades).into_iter().collect()
    }

    pub fn resume_trading(&self) {
        self.write().trading_disabled = false;
    }

    pub fn is_trading_disabled(&self) -> bool {
        self.read().trading_disabled
    }
}
