use crate::models::VoteState;
use chrono::Datelike;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Year,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BucketKey {
    Year(i32),
    YearMonth(i32, u32),
}

impl BucketKey {
    pub fn year(&self) -> i32 {
        match self {
            BucketKey::Year(y) | BucketKey::YearMonth(y, _) => *y,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Year(y) => write!(f, "{}", y),
            BucketKey::YearMonth(y, m) => write!(f, "{}.{}", y, m),
        }
    }
}

// Voter counts per bucket. Order of the returned pairs is unspecified.
pub fn distribution(votes: &VoteState, granularity: Granularity) -> Vec<(BucketKey, usize)> {
    let mut counts: HashMap<BucketKey, usize> = HashMap::new();
    for timestamp in votes.values() {
        let key = match granularity {
            Granularity::Year => BucketKey::Year(timestamp.year()),
            Granularity::Month => BucketKey::YearMonth(timestamp.year(), timestamp.month()),
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

// Number of voters whose vote falls in `year`
pub fn votes_in_year(votes: &VoteState, year: i32) -> usize {
    distribution(votes, Granularity::Year)
        .into_iter()
        .find(|(key, _)| key.year() == year)
        .map(|(_, count)| count)
        .unwrap_or(0)
}

// Tuple-list rendering used by the CLI: [(2021, 2), (2022.1, 1)]
pub fn format_distribution(pairs: &[(BucketKey, usize)]) -> String {
    let items: Vec<String> = pairs
        .iter()
        .map(|(key, count)| format!("({}, {})", key, count))
        .collect();
    format!("[{}]", items.join(", "))
}
