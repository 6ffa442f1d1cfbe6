//! # newslens Common Library
//!
//! Shared code for the newslens crates including:
//! - Trust data model (TrustScore, Vote, DocumentTrustStats)
//! - Event types (LensEvent enum) and EventBus
//! - Configuration loading
//! - SQLite schema initialization
//! - Utility functions

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use models::{BiasClass, Document, DocumentTrustStats, TrustScore, Vote, VoteInput};
