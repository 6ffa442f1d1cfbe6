//! Vote aggregation
//!
//! - `stats`: pure recomputation of [`DocumentTrustStats`](newslens_common::DocumentTrustStats)
//! - `engine`: upsert/retract against a [`VoteStore`](crate::store::VoteStore)

pub mod engine;
pub mod stats;

pub use engine::{Contributor, VoteEngine, VotingSummary, ACCURACY_WINDOW};
pub use stats::recompute;
