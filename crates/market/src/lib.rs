pub mod assembler;
pub mod binance;
mod duration_millis;
pub mod pacer;
pub mod stream;

pub use assembler::{Assembler, AssemblerConfig, Window};
pub use binance::{BinanceClient, RetryPolicy};
pub use pacer::RequestPacer;
pub use stream::{BarPoller, StreamConfig};
