/// Row types for the published recommendation tables.
use serde::{Deserialize, Serialize};

use crate::types::{Confidence, Direction};

/// Column order of the buy table: buy counts first.
pub const BUY_COLUMNS: [&str; 9] = [
    "ticker",
    "score",
    "confidence",
    "hedge_fund_buy_count",
    "insider_buy_count",
    "congress_buy_count",
    "hedge_fund_sell_count",
    "insider_sell_count",
    "congress_sell_count",
];

/// Column order of the sell table: sell counts first.
pub const SELL_COLUMNS: [&str; 9] = [
    "ticker",
    "score",
    "confidence",
    "hedge_fund_sell_count",
    "insider_sell_count",
    "congress_sell_count",
    "hedge_fund_buy_count",
    "insider_buy_count",
    "congress_buy_count",
];

pub fn columns(side: Direction) -> &'static [&'static str; 9] {
    match side {
        Direction::Buy => &BUY_COLUMNS,
        Direction::Sell => &SELL_COLUMNS,
    }
}

/// One row of either table, matched by column name so both layouts decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedRow {
    pub ticker: String,
    pub score: f64,
    pub confidence: Confidence,
    pub hedge_fund_buy_count: u32,
    pub insider_buy_count: u32,
    pub congress_buy_count: u32,
    pub hedge_fund_sell_count: u32,
    pub insider_sell_count: u32,
    pub congress_sell_count: u32,
}
