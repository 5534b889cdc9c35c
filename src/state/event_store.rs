//! Read side of the raw event store: the three collector datasets on disk.
//! Every load degrades to an empty table instead of failing the cycle.

use std::io;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::config::DataPaths;
use crate::error::Result;
use crate::types::{Source, TradeEvent};

/// A collector dataset as read from disk: header row plus data rows, no schema enforced.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse CSV with a header row. Rows that fail to decode are skipped.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut headers = rdr.headers()?.clone();
        headers.trim();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for record in rdr.records() {
            match record {
                Ok(r) => rows.push(r),
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping undecodable row: {e}");
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "Skipped {skipped} malformed rows");
        }

        Ok(Self { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Events carried by this table, or `None` when either column is absent.
    /// Rows too short to hold both cells are dropped.
    pub fn events<'a>(
        &'a self,
        source: Source,
        label_column: &str,
        ticker_column: &str,
    ) -> Option<impl Iterator<Item = TradeEvent> + 'a> {
        let label_idx = self.column(label_column)?;
        let ticker_idx = self.column(ticker_column)?;

        Some(self.rows.iter().filter_map(move |row| {
            Some(TradeEvent {
                ticker: row.get(ticker_idx)?.to_string(),
                direction_label: row.get(label_idx)?.to_string(),
                source,
            })
        }))
    }
}

/// Load one dataset. Missing, empty or unreadable files become an empty table.
pub fn load_table(path: &Path) -> RawTable {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                path = %path.display(),
                "{} not found, continuing with empty dataset",
                path.display()
            );
            return RawTable::empty();
        }
        Err(e) => {
            warn!(path = %path.display(), "Cannot open {}: {e}", path.display());
            return RawTable::empty();
        }
    };

    match RawTable::from_reader(file) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), "Cannot parse {}: {e}", path.display());
            RawTable::empty()
        }
    }
}

/// The three datasets as they stood when a cycle started.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub congress: RawTable,
    pub insider: RawTable,
    pub hedge_fund: RawTable,
}

impl Snapshot {
    pub fn load(paths: &DataPaths) -> Self {
        Self {
            congress: load_table(&paths.dataset(Source::Congress)),
            insider: load_table(&paths.dataset(Source::Insider)),
            hedge_fund: load_table(&paths.dataset(Source::HedgeFund)),
        }
    }

    pub fn table(&self, source: Source) -> &RawTable {
        match source {
            Source::Congress => &self.congress,
            Source::Insider => &self.insider,
            Source::HedgeFund => &self.hedge_fund,
        }
    }
}
