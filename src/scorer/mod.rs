pub mod confidence;
pub mod weighted;

pub use confidence::{score, ScoredTicker};
pub use weighted::{SourceWeights, WeightedTallies};
