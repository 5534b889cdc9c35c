use crate::types::Direction;

const BUY_WORDS: &[&str] = &["purchase", "buy"];
const SELL_WORDS: &[&str] = &["sale", "sell"];

/// Classify a free-text direction label by whole-word, case-insensitive match.
/// Labels naming both directions, or neither, are unclassified.
pub fn classify(label: &str) -> Option<Direction> {
    let mut is_buy = false;
    let mut is_sell = false;

    for word in label
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
    {
        let word = word.to_ascii_lowercase();
        is_buy |= BUY_WORDS.contains(&word.as_str());
        is_sell |= SELL_WORDS.contains(&word.as_str());
    }

    match (is_buy, is_sell) {
        (true, false) => Some(Direction::Buy),
        (false, true) => Some(Direction::Sell),
        _ => None,
    }
}
