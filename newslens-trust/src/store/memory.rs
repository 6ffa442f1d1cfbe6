//! In-process store
//!
//! Everything lives under a single async mutex, so a vote commit (vote write
//! plus statistics write) is one critical section. Writes can be delayed or
//! made to fail on demand, which is how the sync and vote tests provoke
//! remote failures.

use super::{
    sort_newest_first, CollectionItem, DocumentStore, Entry, RawEntry, Recompute,
    RemoteCollection, SnapshotFeed, SnapshotHub, VoteChange, VoteCommit, VoteStore,
};
use async_trait::async_trait;
use newslens_common::{uuid_utils, Document, Error, Result, Vote};
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Write operation classes that can be delayed or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    VoteCommit,
    Create,
    Update,
    Delete,
    /// Bookmark counter and other secondary document writes
    Counter,
}

/// Failure to inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transient,
    Conflict,
}

impl FaultKind {
    fn into_error(self, op: StoreOp) -> Error {
        match self {
            FaultKind::Transient => Error::Transient(format!("injected failure on {:?}", op)),
            FaultKind::Conflict => Error::Conflict(format!("injected rejection on {:?}", op)),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, Document>,
    votes: Vec<Vote>,
    entries: Vec<RawEntry>,
}

/// Store backed by process memory
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    hub: SnapshotHub,
    faults: SyncMutex<HashMap<StoreOp, VecDeque<FaultKind>>>,
    latency: SyncMutex<HashMap<StoreOp, Duration>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot_capacity(16)
    }

    pub fn with_snapshot_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            hub: SnapshotHub::new(capacity),
            faults: SyncMutex::new(HashMap::new()),
            latency: SyncMutex::new(HashMap::new()),
        }
    }

    /// Make the next `count` writes of class `op` fail with `kind`
    pub fn fail_next(&self, op: StoreOp, count: usize, kind: FaultKind) {
        let mut faults = self.faults.lock();
        let queue = faults.entry(op).or_default();
        queue.extend(std::iter::repeat(kind).take(count));
    }

    /// Delay every write of class `op` before it is applied
    pub fn set_latency(&self, op: StoreOp, delay: Duration) {
        self.latency.lock().insert(op, delay);
    }

    /// Number of stored entries in a collection across all owners
    pub async fn entry_count(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .filter(|e| e.collection == collection)
            .count()
    }

    async fn before_write(&self, op: StoreOp) -> Result<()> {
        let delay = self.latency.lock().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fault = self.faults.lock().get_mut(&op).and_then(|q| q.pop_front());
        match fault {
            Some(kind) => {
                debug!(?op, ?kind, "Injecting store failure");
                Err(kind.into_error(op))
            }
            None => Ok(()),
        }
    }

    fn owner_snapshot(state: &MemoryState, collection: &str, owner_id: &str) -> Vec<RawEntry> {
        let mut entries: Vec<RawEntry> = state
            .entries
            .iter()
            .filter(|e| e.collection == collection && e.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut entries);
        entries
    }

    fn publish(&self, state: &MemoryState, collection: &str, owner_id: &str) {
        if self.hub.is_watched(collection, owner_id) {
            let snapshot = Self::owner_snapshot(state, collection, owner_id);
            self.hub.publish(collection, owner_id, snapshot);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.documents.get_mut(&document.id) {
            Some(existing) => {
                existing.title = document.title.clone();
                existing.summary = document.summary.clone();
                existing.category = document.category.clone();
                existing.updated_at = document.updated_at;
            }
            None => {
                state
                    .documents
                    .insert(document.id.clone(), document.clone());
            }
        }
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.lock().await.documents.get(id).cloned())
    }

    async fn adjust_bookmark_count(&self, id: &str, delta: i64) -> Result<()> {
        self.before_write(StoreOp::Counter).await?;
        let mut state = self.state.lock().await;
        let document = state
            .documents
            .get_mut(id)
            .ok_or_else(|| Error::Conflict(format!("Document {} does not exist", id)))?;
        document.bookmark_count = (document.bookmark_count + delta).max(0);
        Ok(())
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn commit(&self, change: VoteChange, recompute: Recompute) -> Result<Option<VoteCommit>> {
        self.before_write(StoreOp::VoteCommit).await?;
        let mut state = self.state.lock().await;
        let document_id = change.document_id().to_string();

        let (vote, replaced) = match change {
            VoteChange::Retract {
                user_id,
                document_id,
            } => {
                let Some(pos) = state
                    .votes
                    .iter()
                    .position(|v| v.user_id == user_id && v.document_id == document_id)
                else {
                    return Ok(None);
                };
                state.votes.remove(pos);
                (None, false)
            }
            VoteChange::Upsert {
                user_id,
                document_id,
                input,
                voted_at,
            } => {
                if !state.documents.contains_key(&document_id) {
                    return Err(Error::Conflict(format!(
                        "Document {} does not exist",
                        document_id
                    )));
                }
                let existing = state
                    .votes
                    .iter()
                    .position(|v| v.user_id == user_id && v.document_id == document_id);
                match existing {
                    Some(pos) => {
                        let existing = &mut state.votes[pos];
                        if existing.voted_at <= voted_at {
                            existing.bias = input.bias;
                            existing.credibility = input.credibility;
                            existing.quality = input.quality;
                            existing.voted_at = voted_at;
                        } else {
                            debug!(%user_id, %document_id, "Ignoring vote older than stored vote");
                        }
                        (Some(existing.clone()), true)
                    }
                    None => {
                        let vote = Vote {
                            id: uuid_utils::generate().to_string(),
                            user_id,
                            document_id,
                            bias: input.bias,
                            credibility: input.credibility,
                            quality: input.quality,
                            voted_at,
                        };
                        state.votes.push(vote.clone());
                        (Some(vote), false)
                    }
                }
            }
        };

        let current: Vec<Vote> = state
            .votes
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect();
        let stats = recompute(&current);

        // a retraction may target a document that vanished; nothing to rewrite then
        if let Some(document) = state.documents.get_mut(&document_id) {
            document.stats = stats.clone();
            document.updated_at = newslens_common::time::now();
        }

        Ok(Some(VoteCommit {
            vote,
            replaced,
            stats,
        }))
    }

    async fn votes_for_document(&self, document_id: &str) -> Result<Vec<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn votes_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<Vote>> {
        let state = self.state.lock().await;
        let mut votes: Vec<Vote> = state
            .votes
            .iter()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.voted_at.cmp(&a.voted_at));
        votes.truncate(limit);
        Ok(votes)
    }

    async fn all_votes(&self) -> Result<Vec<Vote>> {
        Ok(self.state.lock().await.votes.clone())
    }
}

#[async_trait]
impl<T: CollectionItem> RemoteCollection<T> for MemoryStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<Entry<T>>> {
        let state = self.state.lock().await;
        Self::owner_snapshot(&state, T::COLLECTION, owner_id)
            .iter()
            .map(RawEntry::decode)
            .collect()
    }

    async fn create(&self, item: &T) -> Result<String> {
        self.before_write(StoreOp::Create).await?;
        let raw = RawEntry::encode(uuid_utils::generate().to_string(), item)?;
        let id = raw.id.clone();

        let mut state = self.state.lock().await;
        state.entries.push(raw);
        self.publish(&state, T::COLLECTION, item.owner_id());
        Ok(id)
    }

    async fn update(&self, id: &str, item: &T) -> Result<()> {
        self.before_write(StoreOp::Update).await?;
        let replacement = RawEntry::encode(id.to_string(), item)?;

        let mut state = self.state.lock().await;
        let slot = state
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.collection == T::COLLECTION)
            .ok_or_else(|| Error::Conflict(format!("Entry {} no longer exists", id)))?;
        *slot = replacement;
        self.publish(&state, T::COLLECTION, item.owner_id());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.before_write(StoreOp::Delete).await?;
        let mut state = self.state.lock().await;
        let Some(pos) = state
            .entries
            .iter()
            .position(|e| e.id == id && e.collection == T::COLLECTION)
        else {
            return Ok(());
        };
        let removed = state.entries.remove(pos);
        self.publish(&state, T::COLLECTION, &removed.owner_id);
        Ok(())
    }

    fn watch(&self, owner_id: &str) -> SnapshotFeed<T> {
        self.hub.subscribe::<T>(owner_id)
    }
}
