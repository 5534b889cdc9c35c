use std::collections::BTreeMap;

use crate::config::weights;
use crate::signals::{SignalCounts, TickerCounts};
use crate::types::{ActivityTally, Direction, Source};

/// Multiplier per (source, direction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceWeights {
    pub congress_buy: f64,
    pub congress_sell: f64,
    pub insider_buy: f64,
    pub insider_sell: f64,
    pub hedge_fund_buy: f64,
    pub hedge_fund_sell: f64,
}

impl SourceWeights {
    pub fn get(&self, source: Source, direction: Direction) -> f64 {
        match (source, direction) {
            (Source::Congress, Direction::Buy) => self.congress_buy,
            (Source::Congress, Direction::Sell) => self.congress_sell,
            (Source::Insider, Direction::Buy) => self.insider_buy,
            (Source::Insider, Direction::Sell) => self.insider_sell,
            (Source::HedgeFund, Direction::Buy) => self.hedge_fund_buy,
            (Source::HedgeFund, Direction::Sell) => self.hedge_fund_sell,
        }
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            congress_buy: weights::CONGRESS_BUY,
            congress_sell: weights::CONGRESS_SELL,
            insider_buy: weights::INSIDER_BUY,
            insider_sell: weights::INSIDER_SELL,
            hedge_fund_buy: weights::HEDGE_FUND_BUY,
            hedge_fund_sell: weights::HEDGE_FUND_SELL,
        }
    }
}

/// Weighted buy and sell activity per ticker. Tickers nobody traded are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedTallies {
    pub buy: BTreeMap<String, f64>,
    pub sell: BTreeMap<String, f64>,
}

impl WeightedTallies {
    pub fn aggregate(signals: &SignalCounts, weights: &SourceWeights) -> Self {
        let mut tallies = Self::default();
        for source in Source::ALL {
            let counts = signals.source(source);
            accumulate(
                &mut tallies.buy,
                &counts.buy,
                weights.get(source, Direction::Buy),
            );
            accumulate(
                &mut tallies.sell,
                &counts.sell,
                weights.get(source, Direction::Sell),
            );
        }
        tallies
    }

    /// Both sides joined per ticker over the union of tickers.
    pub fn activity(&self) -> BTreeMap<String, ActivityTally> {
        let mut out: BTreeMap<String, ActivityTally> = BTreeMap::new();
        for (ticker, &w) in &self.buy {
            out.entry(ticker.clone()).or_default().weighted_buy = w;
        }
        for (ticker, &w) in &self.sell {
            out.entry(ticker.clone()).or_default().weighted_sell = w;
        }
        out
    }
}

fn accumulate(dest: &mut BTreeMap<String, f64>, counts: &TickerCounts, weight: f64) {
    for (ticker, &n) in counts {
        if n == 0 {
            continue;
        }
        *dest.entry(ticker.clone()).or_insert(0.0) += f64::from(n) * weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::extractor::DirectionCounts;

    fn counts(pairs: &[(&str, u32)]) -> TickerCounts {
        pairs.iter().map(|(t, n)| (t.to_string(), *n)).collect()
    }

    #[test]
    fn default_weights_keep_insider_asymmetry() {
        let w = SourceWeights::default();
        assert_eq!(w.get(Source::Insider, Direction::Buy), 2.5);
        assert_eq!(w.get(Source::Insider, Direction::Sell), 1.8);
        assert_eq!(w.get(Source::Congress, Direction::Sell), 1.0);
        assert_eq!(w.get(Source::HedgeFund, Direction::Buy), 1.5);
    }

    #[test]
    fn sums_weighted_counts_across_sources() {
        let signals = SignalCounts {
            congress: DirectionCounts {
                buy: counts(&[("AAPL", 3)]),
                sell: counts(&[("TSLA", 1)]),
            },
            insider: DirectionCounts {
                buy: counts(&[("AAPL", 2)]),
                sell: counts(&[("TSLA", 2)]),
            },
            hedge_fund: DirectionCounts {
                buy: counts(&[("TSLA", 1)]),
                sell: TickerCounts::new(),
            },
        };
        let tallies = WeightedTallies::aggregate(&signals, &SourceWeights::default());

        assert_eq!(tallies.buy.get("AAPL"), Some(&8.0));
        assert_eq!(tallies.sell.get("AAPL"), None);
        assert_eq!(tallies.buy.get("TSLA"), Some(&1.5));
        assert!((tallies.sell["TSLA"] - 4.6).abs() < 1e-9);

        let activity = tallies.activity();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity["AAPL"].weighted_sell, 0.0);
        assert!((activity["TSLA"].total_activity() - 6.1).abs() < 1e-9);
    }

    #[test]
    fn no_events_means_no_entries() {
        let tallies = WeightedTallies::aggregate(&SignalCounts::default(), &SourceWeights::default());
        assert!(tallies.buy.is_empty());
        assert!(tallies.sell.is_empty());
        assert!(tallies.activity().is_empty());
    }
}
