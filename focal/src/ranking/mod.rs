//! Recency-decayed ranking of visited entities
//!
//! [`compute_ranking`] is the pure scoring function; [`RankingCache`] owns a
//! snapshot of its result over a [`RankingSource`] and fails closed when the
//! source (in particular the blocklist) cannot be read.

pub mod blocklist;
pub mod cache;
pub mod decay;
pub mod source;

pub use blocklist::{Blocklist, BlocklistProvider};
pub use cache::{RankingCache, RankingSnapshot};
pub use decay::{
    EntityScore, RankingConfig, VisitEvent, compute_ranking, consistency_multiplier, decay,
};
pub use source::{RankCandidate, RankingSource, StoreRankingSource};
