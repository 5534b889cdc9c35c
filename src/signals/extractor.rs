use std::collections::BTreeMap;

use crate::config::{TICKER_COLUMN, TICKER_SENTINEL};
use crate::signals::classify;
use crate::state::{RawTable, Snapshot};
use crate::types::{Direction, ProvenanceCounts, Source, TradeEvent};

/// Normalized ticker → event count.
pub type TickerCounts = BTreeMap<String, u32>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionCounts {
    pub buy: TickerCounts,
    pub sell: TickerCounts,
}

impl DirectionCounts {
    pub fn get(&self, direction: Direction) -> &TickerCounts {
        match direction {
            Direction::Buy => &self.buy,
            Direction::Sell => &self.sell,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    fn record(&mut self, event: &TradeEvent) {
        let Some(direction) = classify(&event.direction_label) else {
            return;
        };
        let Some(ticker) = normalize_ticker(&event.ticker) else {
            return;
        };
        let counts = match direction {
            Direction::Buy => &mut self.buy,
            Direction::Sell => &mut self.sell,
        };
        *counts.entry(ticker).or_insert(0) += 1;
    }
}

/// Trim and uppercase; blank tickers and the collector placeholder are rejected.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() || ticker == TICKER_SENTINEL {
        None
    } else {
        Some(ticker)
    }
}

/// Tally buys and sells per ticker. A table missing either column yields empty counts.
pub fn extract_counts(
    table: &RawTable,
    source: Source,
    label_column: &str,
    ticker_column: &str,
) -> DirectionCounts {
    let mut counts = DirectionCounts::default();
    if table.is_empty() {
        return counts;
    }
    if let Some(events) = table.events(source, label_column, ticker_column) {
        for event in events {
            counts.record(&event);
        }
    }
    counts
}

/// Buy/sell counts for each of the three sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalCounts {
    pub congress: DirectionCounts,
    pub insider: DirectionCounts,
    pub hedge_fund: DirectionCounts,
}

impl SignalCounts {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let extract =
            |source: Source| extract_counts(snapshot.table(source), source, source.label_column(), TICKER_COLUMN);
        Self {
            congress: extract(Source::Congress),
            insider: extract(Source::Insider),
            hedge_fund: extract(Source::HedgeFund),
        }
    }

    pub fn source(&self, source: Source) -> &DirectionCounts {
        match source {
            Source::Congress => &self.congress,
            Source::Insider => &self.insider,
            Source::HedgeFund => &self.hedge_fund,
        }
    }

    /// The six raw counts for one ticker; zero where a source never mentioned it.
    pub fn provenance(&self, ticker: &str) -> ProvenanceCounts {
        let mut counts = ProvenanceCounts::default();
        for source in Source::ALL {
            for direction in [Direction::Buy, Direction::Sell] {
                let n = self
                    .source(source)
                    .get(direction)
                    .get(ticker)
                    .copied()
                    .unwrap_or(0);
                counts.set(source, direction, n);
            }
        }
        counts
    }
}
