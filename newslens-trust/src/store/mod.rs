//! Remote store contracts
//!
//! The trust engine and the sync coordinator only talk to these traits. Two
//! adapters exist: [`memory::MemoryStore`] (single process, fault injection
//! for tests) and [`sqlite::SqliteStore`] (sqlx, transactional vote commits).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newslens_common::{Document, DocumentTrustStats, Result, Vote, VoteInput};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use memory::{FaultKind, MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

/// Pure statistics function handed to [`VoteStore::commit`]
pub type Recompute = fn(&[Vote]) -> DocumentTrustStats;

/// Mutation of a user's vote on a document
#[derive(Debug, Clone, PartialEq)]
pub enum VoteChange {
    /// Insert, or overwrite the user's existing vote in place
    Upsert {
        user_id: String,
        document_id: String,
        input: VoteInput,
        voted_at: DateTime<Utc>,
    },
    /// Remove the user's vote if there is one
    Retract { user_id: String, document_id: String },
}

impl VoteChange {
    pub fn document_id(&self) -> &str {
        match self {
            VoteChange::Upsert { document_id, .. } | VoteChange::Retract { document_id, .. } => {
                document_id
            }
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            VoteChange::Upsert { user_id, .. } | VoteChange::Retract { user_id, .. } => user_id,
        }
    }
}

/// Outcome of a committed vote change
#[derive(Debug, Clone, PartialEq)]
pub struct VoteCommit {
    /// The user's vote as stored after the commit (`None` after a retraction)
    pub vote: Option<Vote>,
    /// True when an existing vote was overwritten rather than inserted
    pub replaced: bool,
    /// Statistics written to the document in the same unit
    pub stats: DocumentTrustStats,
}

/// Per-document reads and writes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, or refresh title/summary/category of an existing one
    ///
    /// Trust statistics of an existing document are never touched here.
    async fn put_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Add `delta` to the denormalized bookmark counter (floored at zero)
    ///
    /// Fails with `Error::Conflict` when the document does not exist.
    async fn adjust_bookmark_count(&self, id: &str, delta: i64) -> Result<()>;
}

/// Vote persistence with atomic statistics recomputation
#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Apply `change`, recompute the document's statistics from its full
    /// resulting vote set and write them to the document, all or nothing
    ///
    /// Returns `None` when a retraction found no vote to remove. An upsert
    /// against a missing document fails with `Error::Conflict`. An upsert
    /// older than the stored vote leaves the stored vote in place.
    async fn commit(&self, change: VoteChange, recompute: Recompute) -> Result<Option<VoteCommit>>;

    async fn votes_for_document(&self, document_id: &str) -> Result<Vec<Vote>>;

    /// Votes cast by a user, newest first
    async fn votes_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<Vote>>;

    async fn all_votes(&self) -> Result<Vec<Vote>>;
}

/// Item type held in a per-user collection
pub trait CollectionItem:
    Clone + std::fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Collection name used for storage and events
    const COLLECTION: &'static str;

    fn owner_id(&self) -> &str;

    /// What the entry points at (a document id, a folder name); one visible
    /// entry per target and owner
    fn target_id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;
}

/// Authoritative collection entry
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub id: String,
    pub item: T,
}

/// Remote per-user collection
#[async_trait]
pub trait RemoteCollection<T: CollectionItem>: Send + Sync {
    /// Entries of one owner, newest first
    async fn list(&self, owner_id: &str) -> Result<Vec<Entry<T>>>;

    /// Store a new entry and return its authoritative id
    async fn create(&self, item: &T) -> Result<String>;

    /// Replace the payload of an existing entry (`Error::Conflict` if gone)
    async fn update(&self, id: &str, item: &T) -> Result<()>;

    /// Delete an entry; deleting an absent entry succeeds
    async fn delete(&self, id: &str) -> Result<()>;

    /// Full snapshots of the owner's collection, pushed after every change
    fn watch(&self, owner_id: &str) -> SnapshotFeed<T>;
}

/// Untyped stored entry shared by both adapters
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub id: String,
    pub collection: String,
    pub owner_id: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl RawEntry {
    pub fn encode<T: CollectionItem>(id: String, item: &T) -> Result<Self> {
        Ok(Self {
            id,
            collection: T::COLLECTION.to_string(),
            owner_id: item.owner_id().to_string(),
            target_id: item.target_id().to_string(),
            created_at: item.created_at(),
            payload: serde_json::to_value(item)?,
        })
    }

    pub fn decode<T: CollectionItem>(&self) -> Result<Entry<T>> {
        Ok(Entry {
            id: self.id.clone(),
            item: serde_json::from_value(self.payload.clone())?,
        })
    }
}

type Snapshot = Arc<Vec<RawEntry>>;

/// Stream of full collection snapshots for one owner
pub struct SnapshotFeed<T> {
    rx: broadcast::Receiver<Snapshot>,
    _item: PhantomData<fn() -> T>,
}

impl<T: CollectionItem> SnapshotFeed<T> {
    fn new(rx: broadcast::Receiver<Snapshot>) -> Self {
        Self {
            rx,
            _item: PhantomData,
        }
    }

    /// Wait for the next snapshot; `None` once the store is gone
    ///
    /// Lagging is harmless: every snapshot is complete, so skipped ones are
    /// superseded by the next.
    pub async fn next(&mut self) -> Option<Result<Vec<Entry<T>>>> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => {
                    return Some(snapshot.iter().map(RawEntry::decode::<T>).collect());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, collection = T::COLLECTION, "Snapshot feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Fan-out of snapshots per (collection, owner)
#[derive(Default)]
pub(crate) struct SnapshotHub {
    channels: Mutex<HashMap<(String, String), broadcast::Sender<Snapshot>>>,
    capacity: usize,
}

impl SnapshotHub {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe<T: CollectionItem>(&self, owner_id: &str) -> SnapshotFeed<T> {
        let key = (T::COLLECTION.to_string(), owner_id.to_string());
        let mut channels = self.channels.lock();
        let tx = channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        SnapshotFeed::new(tx.subscribe())
    }

    /// True when someone is watching this owner's collection
    pub(crate) fn is_watched(&self, collection: &str, owner_id: &str) -> bool {
        let key = (collection.to_string(), owner_id.to_string());
        self.channels
            .lock()
            .get(&key)
            .map(|tx| tx.receiver_count() > 0)
            .unwrap_or(false)
    }

    pub(crate) fn publish(&self, collection: &str, owner_id: &str, entries: Vec<RawEntry>) {
        let key = (collection.to_string(), owner_id.to_string());
        let channels = self.channels.lock();
        if let Some(tx) = channels.get(&key) {
            let delivered = tx.send(Arc::new(entries)).unwrap_or(0);
            debug!(collection, owner_id, delivered, "Published collection snapshot");
        }
    }
}

/// Sort newest first, ties by id for a stable order
pub(crate) fn sort_newest_first(entries: &mut [RawEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
