//! # newslens-trust
//!
//! Crowd-sourced trust scoring and optimistic collection sync:
//! - `bias`: classifier score normalization and submission seed estimates
//! - `classifier`: HTTP client for the zero-shot bias classifier
//! - `votes`: vote aggregation engine (sole writer of document trust stats)
//! - `sync`: optimistic sync coordinator for per-user collections
//! - `bookmarks`: bookmarks and bookmark folders built on `sync`
//! - `store`: remote store contracts with in-memory and SQLite adapters

pub mod bias;
pub mod bookmarks;
pub mod classifier;
pub mod store;
pub mod submission;
pub mod sync;
pub mod utils;
pub mod votes;

pub use bias::{normalize, BiasAssessment, ClassifierResult, SeedInput, SourceReputation};
pub use bookmarks::{Bookmark, BookmarkCollection, Bookmarks};
pub use classifier::{ClassifierClient, ClassifierError};
pub use store::{MemoryStore, SqliteStore};
pub use submission::{create_document, NewSubmission};
pub use sync::{OptimisticCoordinator, SubscriptionHandle};
pub use votes::VoteEngine;
