use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairQuote {
    pub from: String,
    pub to: String,
    pub price: String,
}

/// One scrape cycle: every configured pair with the price seen at `timestamp`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: i64,
    pub date: String,
    pub time: String,
    pub pairs: BTreeMap<String, PairQuote>,
}

impl PriceRecord {
    /// `date` and `time` are derived from the same instant as `timestamp`.
    pub fn stamped(now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.timestamp(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            pairs: BTreeMap::new(),
        }
    }

    pub fn insert_quote(&mut self, pair: &str, price: String) {
        let (from, to) = split_pair(pair);
        self.pairs.insert(
            pair.to_string(),
            PairQuote {
                from: from.to_string(),
                to: to.to_string(),
                price,
            },
        );
    }

    pub fn price(&self, pair: &str) -> Option<&str> {
        self.pairs.get(pair).map(|quote| quote.price.as_str())
    }
}

pub fn split_pair(pair: &str) -> (&str, &str) {
    pair.split_once('/').unwrap_or((pair, ""))
}
