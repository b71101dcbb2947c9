pub mod collector;
pub mod distribution;

pub use collector::collect_vote_timestamps_recursive;
pub use distribution::{distribution, format_distribution, votes_in_year, Granularity};
