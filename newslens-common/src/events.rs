//! Event types and EventBus
//!
//! Provides the shared event definitions emitted by the vote engine and the
//! optimistic sync coordinator.

use crate::models::{DocumentTrustStats, TrustScore};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Kind of optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

/// newslens event types
///
/// Events are broadcast via EventBus and can be serialized for transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LensEvent {
    /// A vote was inserted or replaced and the document stats rewritten
    VoteCommitted {
        document_id: String,
        user_id: String,
        stats: DocumentTrustStats,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote was retracted and the document stats rewritten
    VoteRetracted {
        document_id: String,
        user_id: String,
        stats: DocumentTrustStats,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new document was stored with its seed distribution
    DocumentCreated {
        document_id: String,
        seed: TrustScore,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The local view of a collection changed
    CollectionChanged {
        /// Collection name ("bookmarks", ...)
        collection: String,
        owner_id: String,
        /// Number of entries currently visible locally
        visible: usize,
    },

    /// An optimistic mutation failed remotely and was reverted locally
    MutationRolledBack {
        collection: String,
        entry_id: String,
        operation: MutationKind,
        reason: String,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LensEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LensEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: LensEvent) -> Result<usize, broadcast::error::SendError<LensEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LensEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
