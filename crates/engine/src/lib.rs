pub mod engine;
pub mod freshness;
pub mod health;
pub mod kill_switch;
pub mod scheduler;
pub mod trade_book;

pub use engine::{EngineSettings, InstrumentOutcome, TradingEngine};
pub use freshness::FreshnessPolicy;
pub use health::{HealthMonitor, HealthStatus};
pub use kill_switch::{ClosedTrade, EmergencyExitReport, EmergencyKillSwitch};
pub use scheduler::{CycleReport, CycleScheduler};
pub use trade_book::{TradeBook, TradeDecision};
