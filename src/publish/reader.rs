use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::Result;
use crate::publish::models::PublishedRow;

/// Rows of a published table in file order. A table not yet published reads as empty.
pub fn read_table(path: &Path) -> Result<Vec<PublishedRow>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Last modification time as nanoseconds since the Unix epoch.
pub fn modified_ns(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let ns = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    Some(ns.min(u128::from(u64::MAX)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataPaths;
    use crate::publish::writer::{RecommendationSet, TableWriter};
    use crate::types::{Confidence, Direction, ProvenanceCounts, Recommendation};

    #[test]
    fn missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buy_recommendations.csv");
        assert!(read_table(&path).unwrap().is_empty());
        assert!(modified_ns(&path).is_none());
    }

    #[test]
    fn reads_both_layouts_by_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let mut counts = ProvenanceCounts::default();
        counts.insider_sell_count = 4;
        counts.congress_buy_count = 1;

        let set = RecommendationSet {
            buy: Vec::new(),
            sell: vec![Recommendation {
                ticker: "TSLA".to_string(),
                side: Direction::Sell,
                score: 6.2,
                confidence_pct: 100.0,
                confidence: Confidence::High,
                counts,
            }],
        };
        TableWriter::new(paths.clone()).publish(&set).unwrap();

        let sell = read_table(&paths.sell_table()).unwrap();
        assert_eq!(sell.len(), 1);
        assert_eq!(sell[0].ticker, "TSLA");
        assert_eq!(sell[0].score, 6.2);
        assert_eq!(sell[0].confidence, Confidence::High);
        assert_eq!(sell[0].insider_sell_count, 4);
        assert_eq!(sell[0].congress_buy_count, 1);

        assert!(read_table(&paths.buy_table()).unwrap().is_empty());
        assert!(modified_ns(&paths.buy_table()).is_some());
    }
}
