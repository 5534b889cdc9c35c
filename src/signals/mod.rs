pub mod classifier;
pub mod extractor;

pub use classifier::classify;
pub use extractor::{SignalCounts, TickerCounts};
