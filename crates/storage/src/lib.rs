pub mod candles;
pub mod pool;

pub use candles::{CandleStore, WriteOutcome};
pub use pool::DbPool;
