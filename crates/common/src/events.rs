use tokio::sync::mpsc;
use tracing::debug;

use crate::{Signal, TradeKey};

/// Structured notifications for the log/alert collaborator.
///
/// The core never depends on these being delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    InstrumentBlacklisted {
        instrument: String,
        failures: u32,
    },
    LivenessWarning {
        seconds_since_success: i64,
    },
    TradeOpened {
        exchange: String,
        signal: Signal,
    },
    EmergencyExitExecuted {
        closed: Vec<TradeKey>,
    },
}

impl std::fmt::Display for BotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotEvent::InstrumentBlacklisted { instrument, failures } => {
                write!(f, "Instrument {instrument} blacklisted after {failures} failures")
            }
            BotEvent::LivenessWarning { seconds_since_success } => write!(
                f,
                "No successful cycle for {seconds_since_success}s, bot may be stuck"
            ),
            BotEvent::TradeOpened { exchange, signal } => write!(
                f,
                "Opened {} {} on {exchange} at {:.4} ({})",
                signal.direction, signal.instrument, signal.price, signal.strategy
            ),
            BotEvent::EmergencyExitExecuted { closed } => write!(
                f,
                "Emergency exit executed: {} positions closed, trading disabled",
                closed.len()
            ),
        }
    }
}

/// Non-blocking sender for `BotEvent`s. Emission never suspends and never fails
/// the caller; a closed receiver only drops the event.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<BotEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: BotEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                debug!(event = %e.0, "Event receiver closed, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_delivers_to_receiver() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(BotEvent::LivenessWarning { seconds_since_success: 90 });
        assert_eq!(
            rx.try_recv().unwrap(),
            BotEvent::LivenessWarning { seconds_since_success: 90 }
        );
    }

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(BotEvent::LivenessWarning { seconds_since_success: 1 });
        EventSink::disabled().emit(BotEvent::LivenessWarning { seconds_since_success: 1 });
    }
}
