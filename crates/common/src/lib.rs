pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod types;

pub use config::{Config, PoolSettings};
pub use error::{Error, Result};
pub use events::{BotEvent, EventSink};
pub use exchange::MarketDataSource;
pub use types::*;
