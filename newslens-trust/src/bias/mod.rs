//! Bias signals that exist before (or without) community votes
//!
//! - `normalizer`: classifier scores -> TrustScore
//! - `seed`: submission metadata -> initial TrustScore

pub mod normalizer;
pub mod seed;

pub use normalizer::{normalize, BiasAssessment, ClassifierResult};
pub use seed::{estimate as estimate_seed, SeedInput, SourceReputation};
