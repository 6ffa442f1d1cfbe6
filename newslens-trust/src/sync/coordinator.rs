//! Optimistic sync coordinator
//!
//! Applies collection mutations to the local cache synchronously and issues
//! the remote write on a spawned task. The caller gets the optimistic entry
//! immediately plus a [`Ticket`] resolving to the remote outcome. On failure
//! the cache is reverted before the ticket resolves.
//!
//! **State machine per entry:**
//! - `PendingCreate → Confirmed` (create ok) or removed (create failed);
//!   edits made before the ack leave it `PendingUpdate` until they land
//! - `Confirmed → PendingDelete → removed` (delete ok) or back to `Confirmed`
//! - `Confirmed → PendingUpdate → Confirmed`, previous payload restored on failure
//!
//! Must be used from within a tokio runtime.

use super::cache::{EntryState, LocalCache, LocalEntry, Slot};
use crate::store::{CollectionItem, Entry, RemoteCollection};
use async_trait::async_trait;
use newslens_common::events::{EventBus, LensEvent, MutationKind};
use newslens_common::{uuid_utils, Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Follow-up writes tied to a confirmed mutation
///
/// Run only after the primary write succeeded. Their failure is logged and
/// never fails or reverts the mutation.
#[async_trait]
pub trait SecondaryEffects<T: CollectionItem>: Send + Sync {
    async fn after_create(&self, _entry: &Entry<T>) -> Result<()> {
        Ok(())
    }

    async fn after_delete(&self, _entry: &Entry<T>) -> Result<()> {
        Ok(())
    }

    /// `previous` is the payload the update replaced
    async fn after_update(&self, _previous: &T, _entry: &Entry<T>) -> Result<()> {
        Ok(())
    }
}

/// Remote outcome of an optimistic mutation
#[derive(Debug)]
#[must_use = "dropping a ticket discards the remote outcome"]
pub struct Ticket<R> {
    rx: oneshot::Receiver<Result<R>>,
}

impl<R> Ticket<R> {
    /// Wait for the remote write to settle
    ///
    /// By the time this resolves the local cache already reflects the outcome.
    pub async fn wait(self) -> Result<R> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(Error::Internal("Mutation task ended without a result".to_string())))
    }
}

/// Result of [`OptimisticCoordinator::add`]
#[derive(Debug)]
pub struct PendingAdd<T> {
    /// Entry as inserted locally, carrying its temporary id
    pub entry: LocalEntry<T>,
    /// Resolves to the authoritative id
    pub ticket: Ticket<String>,
}

/// Teardown handle of a snapshot subscription; dropping it also unsubscribes
pub struct SubscriptionHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// One handle covering both subscriptions
    pub fn join(mut self, mut other: SubscriptionHandle) -> Self {
        self.tasks.append(&mut other.tasks);
        self
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Inner<T> {
    owner_id: String,
    remote: Arc<dyn RemoteCollection<T>>,
    effects: Option<Arc<dyn SecondaryEffects<T>>>,
    cache: Mutex<LocalCache<T>>,
    event_bus: EventBus,
}

/// Optimistic view of one owner's collection
///
/// Cheap to clone; clones share the same cache.
pub struct OptimisticCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for OptimisticCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: CollectionItem> OptimisticCoordinator<T> {
    pub fn new(
        owner_id: impl Into<String>,
        remote: Arc<dyn RemoteCollection<T>>,
        event_bus: EventBus,
    ) -> Self {
        Self::build(owner_id.into(), remote, None, event_bus)
    }

    /// Coordinator whose confirmed mutations trigger best-effort follow-up writes
    pub fn with_effects(
        owner_id: impl Into<String>,
        remote: Arc<dyn RemoteCollection<T>>,
        effects: Arc<dyn SecondaryEffects<T>>,
        event_bus: EventBus,
    ) -> Self {
        Self::build(owner_id.into(), remote, Some(effects), event_bus)
    }

    fn build(
        owner_id: String,
        remote: Arc<dyn RemoteCollection<T>>,
        effects: Option<Arc<dyn SecondaryEffects<T>>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                owner_id,
                remote,
                effects,
                cache: Mutex::new(LocalCache::default()),
                event_bus,
            }),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    /// Visible entries, newest first
    pub fn local_entries(&self) -> Vec<LocalEntry<T>> {
        self.inner.cache.lock().visible()
    }

    /// Visible entry by temporary or authoritative id
    pub fn get(&self, id: &str) -> Option<LocalEntry<T>> {
        let cache = self.inner.cache.lock();
        cache
            .find(id)
            .filter(|s| s.state.is_visible())
            .map(Slot::to_local)
    }

    /// True when a visible entry points at `target_id`
    pub fn is_saved(&self, target_id: &str) -> bool {
        self.inner
            .cache
            .lock()
            .any_visible(|item| item.target_id() == target_id)
    }

    pub fn len(&self) -> usize {
        self.inner.cache.lock().visible_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `item` locally and create it remotely in the background
    pub fn add(&self, item: T) -> PendingAdd<T> {
        let key = uuid_utils::temp_id();
        let (entry, prev, done) = {
            let mut cache = self.inner.cache.lock();
            let mut slot = Slot::pending(key.clone(), item.clone());
            let (prev, done) = slot.chain();
            let entry = slot.to_local();
            cache.push_front(slot);
            (entry, prev, done)
        };
        debug!(collection = T::COLLECTION, entry_id = %key, "Optimistic add");
        self.inner.notify();

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            wait_turn(prev).await;
            let result = inner.run_create(&key, item).await;
            let _ = done.send(());
            let _ = tx.send(result);
        });

        PendingAdd {
            entry,
            ticket: Ticket { rx },
        }
    }

    /// Hide an entry locally and delete it remotely in the background
    ///
    /// Fails synchronously with `Error::NotFound` when no visible entry has
    /// this id.
    pub fn remove(&self, id: &str) -> Result<Ticket<()>> {
        let (key, prev, done) = {
            let mut cache = self.inner.cache.lock();
            let slot = cache
                .find_visible_mut(id)
                .ok_or_else(|| Error::NotFound(format!("No local entry {}", id)))?;
            slot.state = EntryState::PendingDelete;
            let (prev, done) = slot.chain();
            (slot.key.clone(), prev, done)
        };
        debug!(collection = T::COLLECTION, entry_id = id, "Optimistic remove");
        self.inner.notify();

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            wait_turn(prev).await;
            let result = inner.run_delete(&key).await;
            let _ = done.send(());
            let _ = tx.send(result);
        });

        Ok(Ticket { rx })
    }

    /// Edit an entry locally and push the new payload in the background
    ///
    /// Fails synchronously with `Error::NotFound` when no visible entry has
    /// this id.
    pub fn update(&self, id: &str, edit: impl FnOnce(&mut T)) -> Result<Ticket<()>> {
        let (key, version, previous, prev, done) = {
            let mut cache = self.inner.cache.lock();
            let slot = cache
                .find_visible_mut(id)
                .ok_or_else(|| Error::NotFound(format!("No local entry {}", id)))?;
            let previous = slot.item.clone();
            edit(&mut slot.item);
            slot.version += 1;
            if slot.state == EntryState::Confirmed {
                slot.state = EntryState::PendingUpdate;
            }
            let (prev, done) = slot.chain();
            (slot.key.clone(), slot.version, previous, prev, done)
        };
        debug!(collection = T::COLLECTION, entry_id = id, "Optimistic update");
        self.inner.notify();

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            wait_turn(prev).await;
            let result = inner.run_update(&key, version, previous).await;
            let _ = done.send(());
            let _ = tx.send(result);
        });

        Ok(Ticket { rx })
    }

    /// Merge an authoritative snapshot into the local cache
    pub fn reconcile(&self, snapshot: Vec<Entry<T>>) {
        self.inner.reconcile(snapshot);
    }

    /// Fetch the owner's collection once and reconcile with it
    pub async fn refresh(&self) -> Result<()> {
        let snapshot = self.inner.remote.list(&self.inner.owner_id).await?;
        self.inner.reconcile(snapshot);
        Ok(())
    }

    /// Follow the remote collection and reconcile on every pushed snapshot
    pub fn subscribe(&self) -> SubscriptionHandle {
        let mut feed = self.inner.remote.watch(&self.inner.owner_id);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            while let Some(snapshot) = feed.next().await {
                match snapshot {
                    Ok(entries) => inner.reconcile(entries),
                    Err(e) => warn!(
                        collection = T::COLLECTION,
                        owner_id = %inner.owner_id,
                        error = %e,
                        "Discarding undecodable snapshot"
                    ),
                }
            }
            debug!(collection = T::COLLECTION, "Snapshot feed closed");
        });
        SubscriptionHandle { tasks: vec![task] }
    }

    /// Drop every local entry (e.g. on sign-out); in-flight writes still run
    pub fn clear(&self) {
        self.inner.cache.lock().clear();
        self.inner.notify();
    }
}

async fn wait_turn(prev: Option<oneshot::Receiver<()>>) {
    if let Some(prev) = prev {
        // a dropped sender also means the previous operation is over
        let _ = prev.await;
    }
}

impl<T: CollectionItem> Inner<T> {
    fn notify(&self) {
        let visible = self.cache.lock().visible_len();
        self.event_bus.emit_lossy(LensEvent::CollectionChanged {
            collection: T::COLLECTION.to_string(),
            owner_id: self.owner_id.clone(),
            visible,
        });
    }

    fn rolled_back(&self, entry_id: &str, operation: MutationKind, error: &Error) {
        warn!(
            collection = T::COLLECTION,
            entry_id,
            ?operation,
            error = %error,
            "Remote write failed, local change reverted"
        );
        self.event_bus.emit_lossy(LensEvent::MutationRolledBack {
            collection: T::COLLECTION.to_string(),
            entry_id: entry_id.to_string(),
            operation,
            reason: error.to_string(),
        });
        self.notify();
    }

    fn reconcile(&self, snapshot: Vec<Entry<T>>) {
        let count = snapshot.len();
        self.cache.lock().reconcile(snapshot);
        debug!(collection = T::COLLECTION, owner_id = %self.owner_id, count, "Reconciled snapshot");
        self.notify();
    }

    /// Create with the payload as added; edits made since then follow as
    /// their own queued updates
    async fn run_create(&self, key: &str, item: T) -> Result<String> {
        if self.cache.lock().find(key).is_none() {
            return Err(Error::Conflict(format!(
                "Entry {} was discarded before it was written",
                key
            )));
        }

        match self.remote.create(&item).await {
            Ok(remote_id) => {
                {
                    let mut cache = self.cache.lock();
                    // a slot that is gone or being removed stays that way
                    if let Some(slot) = cache.find_mut(key) {
                        slot.acknowledge(remote_id.clone());
                    }
                }
                info!(collection = T::COLLECTION, entry_id = %remote_id, "Entry created");
                self.notify();

                let entry = Entry {
                    id: remote_id.clone(),
                    item,
                };
                if let Some(effects) = &self.effects {
                    if let Err(e) = effects.after_create(&entry).await {
                        warn!(
                            collection = T::COLLECTION,
                            entry_id = %remote_id,
                            error = %e,
                            "Secondary write after create failed"
                        );
                    }
                }
                Ok(remote_id)
            }
            Err(e) => {
                self.cache.lock().remove(key);
                self.rolled_back(key, MutationKind::Create, &e);
                Err(e)
            }
        }
    }

    async fn run_delete(&self, key: &str) -> Result<()> {
        let target = {
            let cache = self.cache.lock();
            cache
                .find(key)
                .map(|slot| (slot.remote_id.clone(), slot.item.clone()))
        };

        // create never landed, or a snapshot already dropped it: nothing remote to delete
        let Some((Some(remote_id), item)) = target else {
            self.cache.lock().remove(key);
            return Ok(());
        };

        match self.remote.delete(&remote_id).await {
            Ok(()) => {
                self.cache.lock().remove(key);
                info!(collection = T::COLLECTION, entry_id = %remote_id, "Entry deleted");
                self.notify();

                if let Some(effects) = &self.effects {
                    let entry = Entry {
                        id: remote_id.clone(),
                        item,
                    };
                    if let Err(e) = effects.after_delete(&entry).await {
                        warn!(
                            collection = T::COLLECTION,
                            entry_id = %remote_id,
                            error = %e,
                            "Secondary write after delete failed"
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut cache = self.cache.lock();
                    if let Some(slot) = cache.find_mut(key) {
                        if slot.state == EntryState::PendingDelete {
                            slot.state = EntryState::Confirmed;
                        }
                    }
                }
                self.rolled_back(&remote_id, MutationKind::Delete, &e);
                Err(e)
            }
        }
    }

    async fn run_update(&self, key: &str, version: u64, previous: T) -> Result<()> {
        let target = {
            let cache = self.cache.lock();
            cache
                .find(key)
                .map(|slot| (slot.remote_id.clone(), slot.item.clone()))
        };

        // the create it waited for failed, or the entry was dropped locally
        let Some((Some(remote_id), item)) = target else {
            debug!(collection = T::COLLECTION, entry_id = key, "Entry gone before update");
            return Err(Error::Conflict(format!(
                "Entry {} was discarded before it was written",
                key
            )));
        };

        match self.remote.update(&remote_id, &item).await {
            Ok(()) => {
                {
                    let mut cache = self.cache.lock();
                    if let Some(slot) = cache.find_mut(key) {
                        if slot.version == version && slot.state == EntryState::PendingUpdate {
                            slot.state = EntryState::Confirmed;
                        }
                    }
                }
                debug!(collection = T::COLLECTION, entry_id = %remote_id, "Entry updated");
                self.notify();

                if let Some(effects) = &self.effects {
                    let entry = Entry {
                        id: remote_id.clone(),
                        item,
                    };
                    if let Err(e) = effects.after_update(&previous, &entry).await {
                        warn!(
                            collection = T::COLLECTION,
                            entry_id = %remote_id,
                            error = %e,
                            "Secondary write after update failed"
                        );
                    }
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut cache = self.cache.lock();
                    if let Some(slot) = cache.find_mut(key) {
                        // a newer edit owns the slot now
                        if slot.version == version {
                            slot.item = previous;
                            if slot.state == EntryState::PendingUpdate {
                                slot.state = EntryState::Confirmed;
                            }
                        }
                    }
                }
                self.rolled_back(&remote_id, MutationKind::Update, &e);
                Err(e)
            }
        }
    }
}
