use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::config::DataPaths;
use crate::error::{AppError, Result};
use crate::publish::models::columns;
use crate::types::{Direction, Recommendation};

/// Both sides of one cycle's output, ranked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationSet {
    pub buy: Vec<Recommendation>,
    pub sell: Vec<Recommendation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub buy_rows: usize,
    pub sell_rows: usize,
}

/// Overwrites the buy and sell tables in the data directory.
/// Each table is swapped in with a rename, so readers see either the old or the new file.
/// The pair is published together: if the sell swap fails the buy table is put back.
pub struct TableWriter {
    paths: DataPaths,
}

impl TableWriter {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }

    pub fn publish(&self, set: &RecommendationSet) -> Result<PublishReport> {
        std::fs::create_dir_all(self.paths.dir())?;

        // Render both before touching disk so a failure leaves last cycle's tables intact.
        let buy = render_table(Direction::Buy, &set.buy)?;
        let sell = render_table(Direction::Sell, &set.sell)?;

        let buy_path = self.paths.buy_table();
        let sell_path = self.paths.sell_table();

        // Write and sync both temp files before the first rename.
        let buy_tmp = stage(&buy_path, &buy)?;
        let sell_tmp = stage(&sell_path, &sell)?;
        let previous_buy = PreviousTable::capture(&buy_path)?;

        buy_tmp.persist(&buy_path)?;
        if let Err(e) = sell_tmp.persist(&sell_path) {
            if let Err(restore_err) = previous_buy.restore(&buy_path) {
                error!(
                    path = %buy_path.display(),
                    "Could not roll back {} after failed publish: {restore_err}",
                    buy_path.display()
                );
            }
            return Err(e.into());
        }

        info!(
            buy_rows = set.buy.len(),
            sell_rows = set.sell.len(),
            "Buy recommendations saved to {} ({} rows), sell recommendations saved to {} ({} rows)",
            buy_path.display(),
            set.buy.len(),
            sell_path.display(),
            set.sell.len(),
        );

        Ok(PublishReport {
            buy_rows: set.buy.len(),
            sell_rows: set.sell.len(),
        })
    }
}

/// CSV bytes for one side. The header is always present, even with no rows.
pub fn render_table(side: Direction, rows: &[Recommendation]) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(columns(side))?;

    for rec in rows {
        if rec.side != side {
            return Err(AppError::Publish(format!(
                "{} recommendation for {} on the {side} table",
                rec.side, rec.ticker
            )));
        }
        let [lead_hf, lead_insider, lead_congress] = rec.counts.side(side);
        let [tail_hf, tail_insider, tail_congress] = rec.counts.side(side.opposite());
        wtr.serialize((
            rec.ticker.as_str(),
            round4(rec.score),
            rec.confidence.to_string(),
            lead_hf,
            lead_insider,
            lead_congress,
            tail_hf,
            tail_insider,
            tail_congress,
        ))?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Publish(format!("flushing {side} table: {e}")))
}

/// Sibling temp file holding `bytes`, synced and ready to be renamed over `path`.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// A published table as it stood before this cycle's swap.
enum PreviousTable {
    Missing,
    Present { bytes: Vec<u8>, modified: SystemTime },
}

impl PreviousTable {
    fn capture(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => {
                let modified = std::fs::metadata(path)?.modified()?;
                Ok(PreviousTable::Present { bytes, modified })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(PreviousTable::Missing),
            Err(e) => Err(e.into()),
        }
    }

    /// Put the old contents back, keeping the old mtime so readers do not see a fresh refresh.
    fn restore(self, path: &Path) -> Result<()> {
        match self {
            PreviousTable::Missing => Ok(std::fs::remove_file(path)?),
            PreviousTable::Present { bytes, modified } => {
                let tmp = stage(path, &bytes)?;
                tmp.as_file().set_modified(modified)?;
                tmp.persist(path)?;
                Ok(())
            }
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, ProvenanceCounts};

    fn rec(ticker: &str, side: Direction, score: f64) -> Recommendation {
        let mut counts = ProvenanceCounts::default();
        counts.hedge_fund_buy_count = 1;
        counts.insider_buy_count = 2;
        counts.congress_buy_count = 3;
        counts.hedge_fund_sell_count = 4;
        counts.insider_sell_count = 5;
        counts.congress_sell_count = 6;
        Recommendation {
            ticker: ticker.to_string(),
            side,
            score,
            confidence_pct: 100.0,
            confidence: Confidence::High,
            counts,
        }
    }

    #[test]
    fn buy_table_layout() {
        let bytes = render_table(Direction::Buy, &[rec("AAPL", Direction::Buy, 8.0)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("ticker,score,confidence,hedge_fund_buy_count,insider_buy_count,congress_buy_count,hedge_fund_sell_count,insider_sell_count,congress_sell_count")
        );
        assert_eq!(lines.next(), Some("AAPL,8.0,High,1,2,3,4,5,6"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn sell_table_puts_sell_counts_first() {
        let bytes = render_table(Direction::Sell, &[rec("TSLA", Direction::Sell, 5.3999999999999995)]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("ticker,score,confidence,hedge_fund_sell_count,insider_sell_count,congress_sell_count,hedge_fund_buy_count,insider_buy_count,congress_buy_count")
        );
        assert_eq!(lines.next(), Some("TSLA,5.4,High,4,5,6,1,2,3"));
    }

    #[test]
    fn empty_table_keeps_header() {
        let bytes = render_table(Direction::Buy, &[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("ticker,score,confidence"));
    }

    #[test]
    fn publish_overwrites_previous_tables() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let writer = TableWriter::new(paths.clone());

        let first = RecommendationSet {
            buy: vec![rec("AAPL", Direction::Buy, 8.0), rec("MSFT", Direction::Buy, 3.0)],
            sell: vec![rec("TSLA", Direction::Sell, 2.0)],
        };
        let report = writer.publish(&first).unwrap();
        assert_eq!(report, PublishReport { buy_rows: 2, sell_rows: 1 });

        let second = RecommendationSet {
            buy: vec![rec("NVDA", Direction::Buy, 1.5)],
            sell: Vec::new(),
        };
        writer.publish(&second).unwrap();

        let buy = std::fs::read_to_string(paths.buy_table()).unwrap();
        assert!(buy.contains("NVDA"));
        assert!(!buy.contains("AAPL"));
        let sell = std::fs::read_to_string(paths.sell_table()).unwrap();
        assert_eq!(sell.lines().count(), 1);

        // No temp files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn failed_sell_swap_puts_old_buy_table_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let old_buy = "ticker,score,confidence\nOLD,1.0,Low\n";
        std::fs::write(paths.buy_table(), old_buy).unwrap();
        let old_mtime = std::fs::metadata(paths.buy_table()).unwrap().modified().unwrap();
        // A directory at the sell path makes the second rename fail.
        std::fs::create_dir(paths.sell_table()).unwrap();

        let set = RecommendationSet {
            buy: vec![rec("AAPL", Direction::Buy, 2.0)],
            sell: vec![rec("TSLA", Direction::Sell, 1.0)],
        };
        assert!(TableWriter::new(paths.clone()).publish(&set).is_err());

        assert_eq!(std::fs::read_to_string(paths.buy_table()).unwrap(), old_buy);
        let mtime = std::fs::metadata(paths.buy_table()).unwrap().modified().unwrap();
        assert_eq!(mtime, old_mtime);
        assert!(paths.sell_table().is_dir());
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn failed_sell_swap_removes_first_buy_table() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        std::fs::create_dir(paths.sell_table()).unwrap();

        let set = RecommendationSet {
            buy: vec![rec("AAPL", Direction::Buy, 2.0)],
            sell: Vec::new(),
        };
        assert!(TableWriter::new(paths.clone()).publish(&set).is_err());
        assert!(!paths.buy_table().exists());
    }

    #[test]
    fn row_on_wrong_side_is_rejected() {
        let err = render_table(Direction::Buy, &[rec("TSLA", Direction::Sell, 1.0)]).unwrap_err();
        assert!(err.to_string().contains("TSLA"), "{err}");
    }
}
