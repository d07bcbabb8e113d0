use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use common::{ActiveTrade, BotEvent, Error, EventSink, Result, TradeKey};

use crate::trade_book::TradeBook;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub key: TradeKey,
    pub trade: ActiveTrade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyExitReport {
    pub closed: Vec<ClosedTrade>,
    pub trading_disabled: bool,
}

/// Password-protected emergency exit: close every open trade and disable
/// trading in one step.
pub struct EmergencyKillSwitch {
    trades: Arc<TradeBook>,
    password: String,
    events: EventSink,
}

impl EmergencyKillSwitch {
    pub fn new(trades: Arc<TradeBook>, password: impl Into<String>, events: EventSink) -> Self {
        Self {
            trades,
            password: password.into(),
            events,
        }
    }

    pub fn authenticate(&self, password: &str) -> bool {
        !self.password.is_empty() && password == self.password
    }

    /// A bad password fails with `Error::Unauthorized` and leaves state untouched.
    pub fn execute(&self, password: &str) -> Result<EmergencyExitReport> {
        if !self.authenticate(password) {
            warn!("Kill switch rejected: bad password");
            return Err(Error::Unauthorized);
        }

        warn!("EMERGENCY KILL SWITCH ACTIVATED");
        let closed: Vec<ClosedTrade> = self
            .trades
            .emergency_exit()
            .into_iter()
            .map(|(key, trade)| {
                info!(key = %key, direction = %trade.direction, entry = trade.entry_price, "Emergency close");
                ClosedTrade { key, trade }
            })
            .collect();
        warn!(closed = closed.len(), "All positions closed, trading disabled");

        self.events.emit(BotEvent::EmergencyExitExecuted {
            closed: closed.iter().map(|c| c.key.clone()).collect(),
        });

        Ok(EmergencyExitReport {
            closed,
            trading_disabled: true,
        })
    }

    /// Clear the disabled flag. Open trades are not restored.
    pub fn reenable(&self, password: &str) -> Result<()> {
        if !self.authenticate(password) {
            warn!("Trading re-enable rejected: bad password");
            return Err(Error::Unauthorized);
        }
        self.trades.resume_trading();
        info!("Trading re-enabled");
        Ok(())
    }

    pub fn is_trading_disabled(&self) -> bool {
        self.trades.is_trading_disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Direction;

    fn populated() -> Arc<TradeBook> {
        let book = Arc::new(TradeBook::new());
        for strategy in ["s1", "s2"] {
            for instrument in ["A", "B"] {
                book.try_open(
                    TradeKey::new("sim", strategy, instrument),
                    ActiveTrade {
                        entry_price: 10.0,
                        direction: Direction::Short,
                        opened_at: Utc::now(),
                    },
                );
            }
        }
        book
    }

    #[test]
    fn wrong_password_changes_nothing() {
        let book = populated();
        let (events, mut rx) = EventSink::channel();
        let switch = EmergencyKillSwitch::new(book.clone(), "secret", events);

        assert!(matches!(switch.execute("guess"), Err(Error::Unauthorized)));
        assert_eq!(book.len(), 4);
        assert!(!book.is_trading_disabled());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn execute_closes_all_and_disables() {
        let book = populated();
        let (events, mut rx) = EventSink::channel();
        let switch = EmergencyKillSwitch::new(book.clone(), "secret", events);

        let report = switch.execute("secret").unwrap();
        assert_eq!(report.closed.len(), 4);
        assert!(book.is_empty());
        assert!(switch.is_trading_disabled());

        match rx.try_recv().unwrap() {
            BotEvent::EmergencyExitExecuted { closed } => assert_eq!(closed.len(), 4),
            other => panic!("unexpected event {other:?}"),
        }

        assert!(matches!(switch.reenable("nope"), Err(Error::Unauthorized)));
        assert!(switch.is_trading_disabled());
        switch.reenable("secret").unwrap();
        assert!(!switch.is_trading_disabled());
    }

    #[test]
    fn empty_password_never_authenticates() {
        let switch = EmergencyKillSwitch::new(Arc::new(TradeBook::new()), "", EventSink::disabled());
        assert!(!switch.authenticate(""));
    }
}
