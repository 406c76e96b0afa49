pub mod atr;
pub mod rsi;
pub mod sma;

pub use atr::AtrIndicator;
pub use rsi::RsiIndicator;
pub use sma::SmaIndicator;
