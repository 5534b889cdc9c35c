//! Turns weighted tallies into ranked, confidence-labelled candidates per side.
//!
//! Strength blends how one-sided a ticker's activity is with how much activity
//! it has relative to the busiest ticker of the cycle:
//!
//! ```text
//! direction_factor  = net / total
//! volume_factor     = ln(1 + total) / ln(1 + max_total)
//! combined_strength = direction_factor * volume_factor
//! confidence_pct    = 100 * combined_strength / max_combined_strength(side)
//! ```
//!
//! Percentages are relative to the strongest candidate of the current cycle,
//! not absolute probabilities.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::MIN_TOTAL_WEIGHT;
use crate::scorer::weighted::WeightedTallies;
use crate::types::{ActivityTally, Confidence, Direction};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTicker {
    pub ticker: String,
    /// Net weighted tilt toward the side; always > 0.
    pub net: f64,
    pub total_activity: f64,
    pub combined_strength: f64,
    pub confidence_pct: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredSides {
    pub buy: Vec<ScoredTicker>,
    pub sell: Vec<ScoredTicker>,
}

pub fn score(tallies: &WeightedTallies) -> ScoredSides {
    let activity = tallies.activity();
    let max_total = activity
        .values()
        .map(ActivityTally::total_activity)
        .fold(0.0_f64, f64::max);

    ScoredSides {
        buy: score_side(&activity, Direction::Buy, max_total),
        sell: score_side(&activity, Direction::Sell, max_total),
    }
}

fn score_side(
    activity: &BTreeMap<String, ActivityTally>,
    side: Direction,
    max_total: f64,
) -> Vec<ScoredTicker> {
    if max_total <= 0.0 {
        return Vec::new();
    }
    let volume_norm = max_total.ln_1p();

    let mut candidates: Vec<ScoredTicker> = activity
        .iter()
        .filter_map(|(ticker, tally)| {
            let net = tally.net(side);
            let total = tally.total_activity();
            if net <= 0.0 || total < MIN_TOTAL_WEIGHT {
                return None;
            }
            let direction_factor = net / total;
            let volume_factor = total.ln_1p() / volume_norm;
            Some(ScoredTicker {
                ticker: ticker.clone(),
                net,
                total_activity: total,
                combined_strength: direction_factor * volume_factor,
                confidence_pct: 0.0,
                confidence: Confidence::Low,
            })
        })
        .collect();

    let max_strength = candidates
        .iter()
        .map(|c| c.combined_strength)
        .fold(0.0_f64, f64::max);

    for c in &mut candidates {
        let pct = if max_strength > 0.0 {
            round2(c.combined_strength / max_strength * 100.0)
        } else {
            0.0
        };
        c.confidence_pct = pct;
        c.confidence = Confidence::from_pct(pct);
    }

    candidates.sort_by(rank);
    candidates
}

/// High before Medium before Low, then strongest first; ticker breaks exact ties.
fn rank(a: &ScoredTicker, b: &ScoredTicker) -> Ordering {
    b.confidence
        .cmp(&a.confidence)
        .then_with(|| b.confidence_pct.total_cmp(&a.confidence_pct))
        .then_with(|| b.net.total_cmp(&a.net))
        .then_with(|| a.ticker.cmp(&b.ticker))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
