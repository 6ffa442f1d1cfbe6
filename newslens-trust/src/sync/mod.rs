//! Optimistic synchronization of per-user collections
//!
//! One [`OptimisticCoordinator`] per (user session, collection). The cache is
//! owned by the coordinator instance, never global, so independent sessions
//! and tests do not share state.

pub mod cache;
pub mod coordinator;

pub use cache::{EntryState, LocalEntry};
pub use coordinator::{
    OptimisticCoordinator, PendingAdd, SecondaryEffects, SubscriptionHandle, Ticket,
};
