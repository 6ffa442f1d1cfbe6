//! Local cache of one owner's collection
//!
//! Ordered newest first. Entries removed locally stay in the cache, hidden,
//! until the remote delete settles so a failed delete can restore them in
//! place. Each slot also carries the completion signal of the last remote
//! operation queued for it; the next operation waits on that signal, which
//! keeps the remote writes of one entry in issuance order.

use crate::store::{CollectionItem, Entry};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Lifecycle state of a locally cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Added locally, remote create in flight
    PendingCreate,
    /// Matches the authoritative store as far as this client knows
    Confirmed,
    /// Edited locally, remote update in flight
    PendingUpdate,
    /// Removed locally, remote delete in flight (hidden)
    PendingDelete,
}

impl EntryState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, EntryState::PendingDelete)
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, EntryState::Confirmed)
    }
}

/// Entry as seen by callers
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEntry<T> {
    /// Authoritative id once known, the temporary id before that
    pub id: String,
    pub item: T,
    pub state: EntryState,
}

pub(crate) struct Slot<T> {
    /// Id the slot was created under (temporary for local adds)
    pub key: String,
    pub remote_id: Option<String>,
    pub item: T,
    pub state: EntryState,
    /// Bumped on every local edit so a late failure only reverts its own edit
    pub version: u64,
    tail: Option<oneshot::Receiver<()>>,
}

impl<T: Clone> Slot<T> {
    pub fn pending(key: String, item: T) -> Self {
        Self {
            key,
            remote_id: None,
            item,
            state: EntryState::PendingCreate,
            version: 0,
            tail: None,
        }
    }

    pub fn confirmed(entry: Entry<T>) -> Self {
        Self {
            key: entry.id.clone(),
            remote_id: Some(entry.id),
            item: entry.item,
            state: EntryState::Confirmed,
            version: 0,
            tail: None,
        }
    }

    pub fn id(&self) -> &str {
        self.remote_id.as_deref().unwrap_or(&self.key)
    }

    pub fn matches(&self, id: &str) -> bool {
        self.key == id || self.remote_id.as_deref() == Some(id)
    }

    pub fn to_local(&self) -> LocalEntry<T> {
        LocalEntry {
            id: self.id().to_string(),
            item: self.item.clone(),
            state: self.state,
        }
    }

    /// Queue a remote operation behind the previous one on this slot
    ///
    /// Returns the signal to wait for before starting, and the sender to
    /// drop (or fire) once this operation has settled.
    pub fn chain(&mut self) -> (Option<oneshot::Receiver<()>>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (self.tail.replace(rx), tx)
    }

    /// Record the authoritative id returned by the remote create
    ///
    /// Edits made while the create was in flight still have their update
    /// queued, so such a slot moves on to `PendingUpdate`.
    pub fn acknowledge(&mut self, remote_id: String) {
        self.remote_id = Some(remote_id);
        if self.state == EntryState::PendingCreate {
            self.state = if self.version > 0 {
                EntryState::PendingUpdate
            } else {
                EntryState::Confirmed
            };
        }
    }
}

impl<T: CollectionItem> Slot<T> {
    /// True when `entry` is the remote copy of this slot
    fn is_copy(&self, entry: &Entry<T>) -> bool {
        match &self.remote_id {
            Some(id) => id == &entry.id,
            None => {
                self.item.target_id() == entry.item.target_id()
                    && self.item.created_at() == entry.item.created_at()
            }
        }
    }
}

pub(crate) struct LocalCache<T> {
    slots: Vec<Slot<T>>,
}

impl<T> Default for LocalCache<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T: Clone> LocalCache<T> {
    pub fn visible(&self) -> Vec<LocalEntry<T>> {
        self.slots
            .iter()
            .filter(|s| s.state.is_visible())
            .map(Slot::to_local)
            .collect()
    }

    pub fn visible_len(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_visible()).count()
    }

    pub fn find(&self, id: &str) -> Option<&Slot<T>> {
        self.slots.iter().find(|s| s.matches(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Slot<T>> {
        self.slots.iter_mut().find(|s| s.matches(id))
    }

    pub fn find_visible_mut(&mut self, id: &str) -> Option<&mut Slot<T>> {
        self.slots
            .iter_mut()
            .find(|s| s.state.is_visible() && s.matches(id))
    }

    pub fn any_visible(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.slots
            .iter()
            .any(|s| s.state.is_visible() && predicate(&s.item))
    }

    pub fn push_front(&mut self, slot: Slot<T>) {
        self.slots.insert(0, slot);
    }

    pub fn remove(&mut self, id: &str) -> Option<Slot<T>> {
        let pos = self.slots.iter().position(|s| s.matches(id))?;
        Some(self.slots.remove(pos))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T: CollectionItem> LocalCache<T> {
    /// Replace confirmed state with an authoritative snapshot
    ///
    /// Entries whose create is not acknowledged yet (pending creates, and
    /// pending deletes that never got an id) stay as they are. When the
    /// snapshot already holds their remote copy, matched by target and
    /// creation time, the slot takes over its id instead of the copy being
    /// added a second time. Pending deletes and updates keep their local
    /// state while the snapshot still has the entry. Everything else comes
    /// from the snapshot.
    pub fn reconcile(&mut self, snapshot: Vec<Entry<T>>) {
        let previous = std::mem::take(&mut self.slots);
        let mut unacked: Vec<Slot<T>> = Vec::new();
        let mut by_remote: HashMap<String, Slot<T>> = HashMap::new();

        for slot in previous {
            match (slot.state, slot.remote_id.clone()) {
                (EntryState::PendingCreate, _) | (EntryState::PendingDelete, None) => {
                    unacked.push(slot)
                }
                (_, Some(id)) => {
                    by_remote.insert(id, slot);
                }
                (_, None) => {}
            }
        }

        let mut from_snapshot = Vec::with_capacity(snapshot.len());
        for entry in snapshot {
            if let Some(slot) = unacked.iter_mut().find(|s| s.is_copy(&entry)) {
                if slot.remote_id.is_none() {
                    slot.remote_id = Some(entry.id);
                }
                continue;
            }
            match by_remote.remove(&entry.id) {
                Some(slot)
                    if matches!(
                        slot.state,
                        EntryState::PendingDelete | EntryState::PendingUpdate
                    ) =>
                {
                    from_snapshot.push(slot);
                }
                Some(mut slot) => {
                    slot.item = entry.item;
                    slot.state = EntryState::Confirmed;
                    from_snapshot.push(slot);
                }
                None => from_snapshot.push(Slot::confirmed(entry)),
            }
        }

        unacked.extend(from_snapshot);
        self.slots = unacked;
    }
}
