use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources and directions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Congress,
    Insider,
    HedgeFund,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Congress, Source::Insider, Source::HedgeFund];

    /// Column carrying the free-text direction label in this source's dataset.
    pub fn label_column(self) -> &'static str {
        match self {
            Source::Congress | Source::Insider => "transaction_type",
            Source::HedgeFund => "action",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Congress => "congress",
            Source::Insider => "insider",
            Source::HedgeFund => "hedge_fund",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw events
// ---------------------------------------------------------------------------

/// One row of a collector's dataset. Ticker casing is whatever the collector wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    pub ticker: String,
    pub direction_label: String,
    pub source: Source,
}

// ---------------------------------------------------------------------------
// Tallies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActivityTally {
    pub weighted_buy: f64,
    pub weighted_sell: f64,
}

impl ActivityTally {
    pub fn total_activity(&self) -> f64 {
        self.weighted_buy + self.weighted_sell
    }

    /// Signed dominance of `side` over the other side.
    pub fn net(&self, side: Direction) -> f64 {
        match side {
            Direction::Buy => self.weighted_buy - self.weighted_sell,
            Direction::Sell => self.weighted_sell - self.weighted_buy,
        }
    }
}

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Variant order is severity order: `High` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_pct(pct: f64) -> Self {
        use crate::config::confidence_thresholds::*;
        if pct >= HIGH_MIN {
            Confidence::High
        } else if pct >= MEDIUM_MIN {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Published rows
// ---------------------------------------------------------------------------

/// Raw event counts behind a recommendation, per source and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceCounts {
    pub hedge_fund_buy_count: u32,
    pub insider_buy_count: u32,
    pub congress_buy_count: u32,
    pub hedge_fund_sell_count: u32,
    pub insider_sell_count: u32,
    pub congress_sell_count: u32,
}

impl ProvenanceCounts {
    pub fn set(&mut self, source: Source, direction: Direction, count: u32) {
        let slot = match (source, direction) {
            (Source::HedgeFund, Direction::Buy) => &mut self.hedge_fund_buy_count,
            (Source::Insider, Direction::Buy) => &mut self.insider_buy_count,
            (Source::Congress, Direction::Buy) => &mut self.congress_buy_count,
            (Source::HedgeFund, Direction::Sell) => &mut self.hedge_fund_sell_count,
            (Source::Insider, Direction::Sell) => &mut self.insider_sell_count,
            (Source::Congress, Direction::Sell) => &mut self.congress_sell_count,
        };
        *slot = count;
    }

    /// Counts for one direction in hedge fund, insider, congress order.
    pub fn side(&self, direction: Direction) -> [u32; 3] {
        match direction {
            Direction::Buy => [
                self.hedge_fund_buy_count,
                self.insider_buy_count,
                self.congress_buy_count,
            ],
            Direction::Sell => [
                self.hedge_fund_sell_count,
                self.insider_sell_count,
                self.congress_sell_count,
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub ticker: String,
    pub side: Direction,
    /// Raw net weighted tally toward `side`.
    pub score: f64,
    /// Strength relative to the strongest ticker on the same side, 0-100.
    pub confidence_pct: f64,
    pub confidence: Confidence,
    pub counts: ProvenanceCounts,
}
