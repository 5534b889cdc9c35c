//! One aggregation pass: snapshot → counts → weighted tallies → scores → tables.

use tracing::info;

use crate::config::DataPaths;
use crate::error::Result;
use crate::publish::{PublishReport, RecommendationSet, TableWriter};
use crate::scorer::{score, ScoredTicker, SourceWeights, WeightedTallies};
use crate::signals::SignalCounts;
use crate::state::Snapshot;
use crate::types::{Direction, Recommendation};

/// Pure function of the snapshot; identical input gives identical, identically ordered output.
pub fn build_recommendations(snapshot: &Snapshot, weights: &SourceWeights) -> RecommendationSet {
    let signals = SignalCounts::from_snapshot(snapshot);
    let tallies = WeightedTallies::aggregate(&signals, weights);
    let sides = score(&tallies);

    RecommendationSet {
        buy: attach_counts(Direction::Buy, &sides.buy, &signals),
        sell: attach_counts(Direction::Sell, &sides.sell, &signals),
    }
}

fn attach_counts(
    side: Direction,
    scored: &[ScoredTicker],
    signals: &SignalCounts,
) -> Vec<Recommendation> {
    scored
        .iter()
        .map(|s| Recommendation {
            ticker: s.ticker.clone(),
            side,
            score: s.net,
            confidence_pct: s.confidence_pct,
            confidence: s.confidence,
            counts: signals.provenance(&s.ticker),
        })
        .collect()
}

/// Read the raw datasets as they are now, rescore, and replace both tables.
pub fn refresh_tables(paths: &DataPaths) -> Result<PublishReport> {
    let snapshot = Snapshot::load(paths);
    info!(
        congress_rows = snapshot.congress.len(),
        insider_rows = snapshot.insider.len(),
        hedge_fund_rows = snapshot.hedge_fund.len(),
        "Generating recommendations from {} congress, {} insider, {} hedge fund rows",
        snapshot.congress.len(),
        snapshot.insider.len(),
        snapshot.hedge_fund.len(),
    );

    let set = build_recommendations(&snapshot, &SourceWeights::default());
    TableWriter::new(paths.clone()).publish(&set)
}
