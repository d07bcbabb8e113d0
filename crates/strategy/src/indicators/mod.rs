//! Indicator kernels. Each returns a vector the same length as its input,
//! `NaN` until the lookback window is filled.

pub mod cci;
pub mod ema;
pub mod rsi;

pub use cci::CciIndicator;
pub use ema::EmaIndicator;
pub use rsi::RsiIndicator;
