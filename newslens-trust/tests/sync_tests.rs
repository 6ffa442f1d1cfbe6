//! Integration tests for optimistic sync of bookmarks
//!
//! The default `#[tokio::test]` runtime is single-threaded, so nothing a
//! mutation spawns can run before the test awaits. Assertions made right
//! after `add`/`remove` therefore observe the purely local state.

use async_trait::async_trait;
use newslens_common::events::{EventBus, LensEvent, MutationKind};
use newslens_common::uuid_utils::is_temp_id;
use newslens_common::{Document, Error, Result, TrustScore};
use newslens_trust::bookmarks::{
    BookmarkOptions, BookmarkUpdate, CollectionOptions, SearchFilters,
};
use newslens_trust::store::{
    DocumentStore, Entry, FaultKind, MemoryStore, RemoteCollection, SnapshotFeed, StoreOp,
};
use newslens_trust::sync::EntryState;
use newslens_trust::{Bookmark, BookmarkCollection, Bookmarks};
use std::sync::Arc;
use std::time::Duration;

fn document(id: &str, category: &str) -> Document {
    let mut doc = Document::new(id, format!("Story {}", id), TrustScore::NEUTRAL);
    doc.summary = format!("Summary of {}", id);
    doc.category = category.to_string();
    doc
}

async fn store_with(docs: &[Document]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for doc in docs {
        store.put_document(doc).await.unwrap();
    }
    store
}

fn bookmarks_for(owner: &str, store: &Arc<MemoryStore>, bus: &EventBus) -> Bookmarks {
    let remote: Arc<dyn RemoteCollection<Bookmark>> = store.clone();
    bookmarks_over(owner, remote, store, bus)
}

fn bookmarks_over(
    owner: &str,
    remote: Arc<dyn RemoteCollection<Bookmark>>,
    store: &Arc<MemoryStore>,
    bus: &EventBus,
) -> Bookmarks {
    let folders: Arc<dyn RemoteCollection<BookmarkCollection>> = store.clone();
    let documents: Arc<dyn DocumentStore> = store.clone();
    Bookmarks::new(owner, remote, folders, documents, bus.clone())
}

/// Remote whose create lands right away but is acknowledged late, the way a
/// push store can deliver the new snapshot before the write call returns
struct LateAck {
    store: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl RemoteCollection<Bookmark> for LateAck {
    async fn list(&self, owner_id: &str) -> Result<Vec<Entry<Bookmark>>> {
        RemoteCollection::<Bookmark>::list(self.store.as_ref(), owner_id).await
    }

    async fn create(&self, item: &Bookmark) -> Result<String> {
        let id = self.store.create(item).await?;
        tokio::time::sleep(self.delay).await;
        Ok(id)
    }

    async fn update(&self, id: &str, item: &Bookmark) -> Result<()> {
        self.store.update(id, item).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        RemoteCollection::<Bookmark>::delete(self.store.as_ref(), id).await
    }

    fn watch(&self, owner_id: &str) -> SnapshotFeed<Bookmark> {
        RemoteCollection::<Bookmark>::watch(self.store.as_ref(), owner_id)
    }
}

async fn remote_bookmarks(store: &MemoryStore, owner: &str) -> Vec<Entry<Bookmark>> {
    RemoteCollection::<Bookmark>::list(store, owner).await.unwrap()
}

async fn remote_folders(store: &MemoryStore, owner: &str) -> Vec<Entry<BookmarkCollection>> {
    RemoteCollection::<BookmarkCollection>::list(store, owner)
        .await
        .unwrap()
}

async fn bookmark_count(store: &MemoryStore, doc: &str) -> i64 {
    store.get_document(doc).await.unwrap().unwrap().bookmark_count
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn document_ids(bookmarks: &Bookmarks) -> Vec<String> {
    bookmarks
        .list()
        .into_iter()
        .map(|e| e.item.document_id)
        .collect()
}

// ============================================================================
// Optimistic add
// ============================================================================

#[tokio::test]
async fn test_add_visible_before_remote_write() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bus = EventBus::new(64);
    let bookmarks = bookmarks_for("u1", &store, &bus);

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    assert!(is_temp_id(&pending.entry.id));
    assert_eq!(pending.entry.state, EntryState::PendingCreate);
    assert!(bookmarks.is_bookmarked("d1"));
    assert_eq!(bookmarks.list().len(), 1);
    assert_eq!(store.entry_count("bookmarks").await, 0);

    let remote_id = pending.ticket.wait().await.unwrap();
    assert!(!is_temp_id(&remote_id));

    let entries = bookmarks.list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, remote_id);
    assert_eq!(entries[0].state, EntryState::Confirmed);
    assert_eq!(store.entry_count("bookmarks").await, 1);
    assert_eq!(bookmark_count(&store, "d1").await, 1);
}

#[tokio::test]
async fn test_failed_add_restores_previous_view() {
    let docs = [document("d1", "a"), document("d2", "b"), document("d3", "c")];
    let store = store_with(&docs).await;
    let bus = EventBus::new(64);
    let bookmarks = bookmarks_for("u1", &store, &bus);

    for doc in &docs[..2] {
        let pending = bookmarks.add(doc, BookmarkOptions::default()).unwrap();
        pending.ticket.wait().await.unwrap();
    }
    let before = bookmarks.list();

    let mut rx = bus.subscribe();
    store.fail_next(StoreOp::Create, 1, FaultKind::Transient);
    let pending = bookmarks.add(&docs[2], BookmarkOptions::default()).unwrap();
    assert_eq!(bookmarks.list().len(), 3);

    let err = pending.ticket.wait().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(bookmarks.list(), before);
    assert!(!bookmarks.is_bookmarked("d3"));
    assert_eq!(bookmark_count(&store, "d3").await, 0);

    let mut rolled_back = false;
    while let Ok(event) = rx.try_recv() {
        if let LensEvent::MutationRolledBack { operation, .. } = event {
            assert_eq!(operation, MutationKind::Create);
            rolled_back = true;
        }
    }
    assert!(rolled_back);
}

#[tokio::test]
async fn test_duplicate_bookmark_rejected() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(16));

    let _pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    let err = bookmarks.add(&d1, BookmarkOptions::default()).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(bookmarks.list().len(), 1);
}

// ============================================================================
// Optimistic remove
// ============================================================================

#[tokio::test]
async fn test_failed_remove_restores_entry_in_place() {
    let docs = [document("d1", "a"), document("d2", "b"), document("d3", "c")];
    let store = store_with(&docs).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    for doc in &docs {
        let pending = bookmarks.add(doc, BookmarkOptions::default()).unwrap();
        pending.ticket.wait().await.unwrap();
    }
    let before = bookmarks.list();
    assert_eq!(document_ids(&bookmarks), vec!["d3", "d2", "d1"]);

    store.fail_next(StoreOp::Delete, 1, FaultKind::Conflict);
    let ticket = bookmarks.remove_document("d2").unwrap();
    assert_eq!(document_ids(&bookmarks), vec!["d3", "d1"]);

    let err = ticket.wait().await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(bookmarks.list(), before);
    assert_eq!(store.entry_count("bookmarks").await, 3);
    assert_eq!(bookmark_count(&store, "d2").await, 1);
}

#[tokio::test]
async fn test_remove_unknown_id_fails_synchronously() {
    let store = store_with(&[]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(16));
    assert!(matches!(
        bookmarks.remove("no-such-id"),
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_remove_before_create_lands_does_not_resurrect() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    store.set_latency(StoreOp::Create, Duration::from_millis(20));

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    let removal = bookmarks.remove(&pending.entry.id).unwrap();
    assert!(bookmarks.list().is_empty());

    // the create still lands first, but its acknowledgment must not bring it back
    pending.ticket.wait().await.unwrap();
    assert!(bookmarks.list().is_empty());

    removal.wait().await.unwrap();
    assert!(bookmarks.list().is_empty());
    assert_eq!(store.entry_count("bookmarks").await, 0);
    assert_eq!(bookmark_count(&store, "d1").await, 0);
}

#[tokio::test]
async fn test_remove_after_failed_create_is_noop() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    store.fail_next(StoreOp::Create, 1, FaultKind::Transient);

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    let removal = bookmarks.remove(&pending.entry.id).unwrap();

    assert!(pending.ticket.wait().await.is_err());
    removal.wait().await.unwrap();
    assert!(bookmarks.list().is_empty());
    assert_eq!(store.entry_count("bookmarks").await, 0);
}

// ============================================================================
// Updates
// ============================================================================

#[tokio::test]
async fn test_mark_read_confirmed() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    let id = bookmarks
        .add(&d1, BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    let ticket = bookmarks.mark_read(&id).unwrap();
    let local = bookmarks.list().remove(0);
    assert!(local.item.is_read);
    assert_eq!(local.state, EntryState::PendingUpdate);

    ticket.wait().await.unwrap();
    let local = bookmarks.list().remove(0);
    assert_eq!(local.state, EntryState::Confirmed);
    assert_eq!(local.item.reading_progress, Some(100));

    let remote: Vec<_> = RemoteCollection::<Bookmark>::list(store.as_ref(), "u1")
        .await
        .unwrap();
    assert!(remote[0].item.is_read);
}

#[tokio::test]
async fn test_update_behind_failed_create_fails() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    store.fail_next(StoreOp::Create, 1, FaultKind::Transient);

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    let update = bookmarks.mark_read(&pending.entry.id).unwrap();

    assert!(pending.ticket.wait().await.unwrap_err().is_transient());
    let err = update.wait().await.unwrap_err();
    assert!(err.is_conflict());
    assert!(bookmarks.list().is_empty());
    assert_eq!(store.entry_count("bookmarks").await, 0);
}

#[tokio::test]
async fn test_edit_during_create_stays_pending_until_written() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    store.set_latency(StoreOp::Create, Duration::from_millis(30));
    store.set_latency(StoreOp::Update, Duration::from_millis(60));

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    let update = bookmarks.mark_read(&pending.entry.id).unwrap();

    let id = pending.ticket.wait().await.unwrap();
    let local = bookmarks.list().remove(0);
    assert_eq!(local.id, id);
    assert_eq!(local.state, EntryState::PendingUpdate);

    // the snapshot still has the unread copy; the queued edit wins locally
    assert!(!remote_bookmarks(&store, "u1").await[0].item.is_read);
    bookmarks.refresh().await.unwrap();
    let local = bookmarks.list().remove(0);
    assert!(local.item.is_read);
    assert_eq!(local.state, EntryState::PendingUpdate);

    update.wait().await.unwrap();
    assert_eq!(bookmarks.list()[0].state, EntryState::Confirmed);
    assert!(remote_bookmarks(&store, "u1").await[0].item.is_read);
}

#[tokio::test]
async fn test_failed_update_restores_previous_payload() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    let id = bookmarks
        .add(&d1, BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    store.fail_next(StoreOp::Update, 1, FaultKind::Transient);
    let ticket = bookmarks
        .update(
            &id,
            BookmarkUpdate {
                notes: Some("read later".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(bookmarks.list()[0].item.notes.as_deref(), Some("read later"));

    assert!(ticket.wait().await.is_err());
    let local = bookmarks.list().remove(0);
    assert_eq!(local.item.notes, None);
    assert_eq!(local.state, EntryState::Confirmed);
}

// ============================================================================
// Secondary counter
// ============================================================================

#[tokio::test]
async fn test_counter_failure_does_not_fail_add() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    store.fail_next(StoreOp::Counter, 1, FaultKind::Transient);

    let id = bookmarks
        .add(&d1, BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();
    assert_eq!(bookmarks.list()[0].id, id);
    assert_eq!(bookmark_count(&store, "d1").await, 0);
}

#[tokio::test]
async fn test_bookmark_of_unstored_document_skips_counter() {
    let store = store_with(&[]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    let ghost = document("ghost", "misc");
    let pending = bookmarks.add(&ghost, BookmarkOptions::default()).unwrap();
    pending.ticket.wait().await.unwrap();
    assert_eq!(store.entry_count("bookmarks").await, 1);

    let removal = bookmarks.remove_document("ghost").unwrap();
    removal.wait().await.unwrap();
    assert_eq!(store.entry_count("bookmarks").await, 0);
}

// ============================================================================
// Snapshots and reconciliation
// ============================================================================

#[tokio::test]
async fn test_reconcile_keeps_pending_create() {
    let docs = [document("d1", "a"), document("d2", "b")];
    let store = store_with(&docs).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    bookmarks
        .add(&docs[0], BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    store.set_latency(StoreOp::Create, Duration::from_millis(20));
    let pending = bookmarks.add(&docs[1], BookmarkOptions::default()).unwrap();

    // a snapshot taken before the second create landed
    bookmarks.refresh().await.unwrap();
    assert_eq!(document_ids(&bookmarks), vec!["d2", "d1"]);
    assert_eq!(bookmarks.list()[0].state, EntryState::PendingCreate);

    pending.ticket.wait().await.unwrap();
    bookmarks.refresh().await.unwrap();
    assert_eq!(bookmarks.list().len(), 2);
    assert!(bookmarks.list().iter().all(|e| e.state == EntryState::Confirmed));
}

#[tokio::test]
async fn test_snapshot_before_create_ack_shows_entry_once() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let late: Arc<dyn RemoteCollection<Bookmark>> = Arc::new(LateAck {
        store: Arc::clone(&store),
        delay: Duration::from_millis(50),
    });
    let bookmarks = bookmarks_over("u1", late, &store, &EventBus::new(64));

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.entry_count("bookmarks").await, 1);

    bookmarks.refresh().await.unwrap();
    let stored_id = remote_bookmarks(&store, "u1").await[0].id.clone();
    let entries = bookmarks.list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, stored_id);
    assert_eq!(entries[0].state, EntryState::PendingCreate);
    // still reachable under the temporary id
    assert!(bookmarks.coordinator().get(&pending.entry.id).is_some());

    let id = pending.ticket.wait().await.unwrap();
    assert_eq!(id, stored_id);
    let entries = bookmarks.list();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].state, EntryState::Confirmed);

    bookmarks.refresh().await.unwrap();
    assert_eq!(bookmarks.list().len(), 1);
    assert_eq!(bookmark_count(&store, "d1").await, 1);
}

#[tokio::test]
async fn test_snapshot_before_create_ack_keeps_removal_hidden() {
    let d1 = document("d1", "politics");
    let store = store_with(&[d1.clone()]).await;
    let late: Arc<dyn RemoteCollection<Bookmark>> = Arc::new(LateAck {
        store: Arc::clone(&store),
        delay: Duration::from_millis(50),
    });
    let bookmarks = bookmarks_over("u1", late, &store, &EventBus::new(64));

    let pending = bookmarks.add(&d1, BookmarkOptions::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let removal = bookmarks.remove(&pending.entry.id).unwrap();

    bookmarks.refresh().await.unwrap();
    assert!(bookmarks.list().is_empty());
    assert!(!bookmarks.is_bookmarked("d1"));

    pending.ticket.wait().await.unwrap();
    removal.wait().await.unwrap();
    assert!(bookmarks.list().is_empty());
    assert_eq!(store.entry_count("bookmarks").await, 0);
}

#[tokio::test]
async fn test_subscription_follows_other_device() {
    let docs = [document("d1", "a"), document("d2", "b")];
    let store = store_with(&docs).await;
    let bus = EventBus::new(64);
    let phone = bookmarks_for("u1", &store, &bus);
    let laptop = bookmarks_for("u1", &store, &bus);

    let handle = laptop.subscribe();
    assert!(handle.is_active());

    phone
        .add(&docs[0], BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();
    assert!(eventually(|| laptop.is_bookmarked("d1")).await);

    handle.unsubscribe();
    phone
        .add(&docs[1], BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!laptop.is_bookmarked("d2"));
    assert_eq!(laptop.list().len(), 1);
}

#[tokio::test]
async fn test_other_owner_not_visible() {
    let d1 = document("d1", "a");
    let store = store_with(&[d1.clone()]).await;
    let bus = EventBus::new(64);
    let alice = bookmarks_for("alice", &store, &bus);
    let bob = bookmarks_for("bob", &store, &bus);

    alice
        .add(&d1, BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();
    bob.refresh().await.unwrap();
    assert!(bob.list().is_empty());
    assert_eq!(bookmark_count(&store, "d1").await, 1);
}

// ============================================================================
// Folders
// ============================================================================

#[tokio::test]
async fn test_create_collection() {
    let store = store_with(&[]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    let pending = bookmarks
        .create_collection(
            "  Weekend reads ",
            CollectionOptions {
                color: Some("#3366ff".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(is_temp_id(&pending.entry.id));
    assert_eq!(pending.entry.item.name, "Weekend reads");
    assert_eq!(bookmarks.collections().len(), 1);

    let err = bookmarks
        .create_collection("Weekend reads", CollectionOptions::default())
        .unwrap_err();
    assert!(err.is_validation());
    assert!(bookmarks
        .create_collection("   ", CollectionOptions::default())
        .unwrap_err()
        .is_validation());

    let id = pending.ticket.wait().await.unwrap();
    let folders = remote_folders(&store, "u1").await;
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, id);
    assert_eq!(folders[0].item.color.as_deref(), Some("#3366ff"));
    assert_eq!(folders[0].item.bookmark_count, 0);
    // folders and bookmarks are stored apart
    assert_eq!(store.entry_count("bookmarks").await, 0);
}

fn count_of(folders: &[Entry<BookmarkCollection>], id: &str) -> i64 {
    folders
        .iter()
        .find(|f| f.id == id)
        .map(|f| f.item.bookmark_count)
        .unwrap()
}

#[tokio::test]
async fn test_folder_counts_follow_bookmarks() {
    let docs = [document("d1", "a"), document("d2", "b")];
    let store = store_with(&docs).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    let mut folder_ids = Vec::new();
    for name in ["Work", "Home"] {
        let pending = bookmarks
            .create_collection(name, CollectionOptions::default())
            .unwrap();
        folder_ids.push(pending.ticket.wait().await.unwrap());
    }

    let mut ids = Vec::new();
    for doc in &docs {
        let options = BookmarkOptions {
            folder_id: Some(folder_ids[0].clone()),
            ..Default::default()
        };
        ids.push(bookmarks.add(doc, options).unwrap().ticket.wait().await.unwrap());
    }
    let folders = remote_folders(&store, "u1").await;
    assert_eq!(count_of(&folders, &folder_ids[0]), 2);

    // moving a bookmark shifts one count
    bookmarks
        .update(
            &ids[0],
            BookmarkUpdate {
                folder_id: Some(folder_ids[1].clone()),
                ..Default::default()
            },
        )
        .unwrap()
        .wait()
        .await
        .unwrap();
    let folders = remote_folders(&store, "u1").await;
    assert_eq!(count_of(&folders, &folder_ids[0]), 1);
    assert_eq!(count_of(&folders, &folder_ids[1]), 1);

    bookmarks.remove(&ids[1]).unwrap().wait().await.unwrap();
    let folders = remote_folders(&store, "u1").await;
    assert_eq!(count_of(&folders, &folder_ids[0]), 0);

    bookmarks.refresh().await.unwrap();
    let local = bookmarks.collections();
    assert_eq!(local.len(), 2);
    assert!(local.iter().all(|f| f.state == EntryState::Confirmed));
    let home = local.iter().find(|f| f.item.name == "Home").unwrap();
    assert_eq!(home.item.bookmark_count, 1);
    assert_eq!(bookmarks.stats().collections, 2);
}

#[tokio::test]
async fn test_folder_counter_failure_does_not_fail_add() {
    let d1 = document("d1", "a");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    let folder_id = bookmarks
        .create_collection("Work", CollectionOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    store.fail_next(StoreOp::Update, 1, FaultKind::Transient);
    let options = BookmarkOptions {
        folder_id: Some(folder_id),
        ..Default::default()
    };
    let id = bookmarks.add(&d1, options).unwrap().ticket.wait().await.unwrap();
    assert_eq!(bookmarks.list()[0].id, id);
    assert_eq!(bookmark_count(&store, "d1").await, 1);
    assert_eq!(remote_folders(&store, "u1").await[0].item.bookmark_count, 0);
}

#[tokio::test]
async fn test_unknown_folder_skips_counter() {
    let d1 = document("d1", "a");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    let options = BookmarkOptions {
        folder_id: Some("no-such-folder".to_string()),
        ..Default::default()
    };
    bookmarks.add(&d1, options).unwrap().ticket.wait().await.unwrap();
    assert_eq!(bookmark_count(&store, "d1").await, 1);
    assert!(remote_folders(&store, "u1").await.is_empty());
}

// ============================================================================
// Local queries
// ============================================================================

#[tokio::test]
async fn test_stats_and_search() {
    let docs = [
        document("d1", "politics"),
        document("d2", "politics"),
        document("d3", "science"),
    ];
    let store = store_with(&docs).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));

    let mut ids = Vec::new();
    for doc in &docs {
        let options = BookmarkOptions {
            tags: vec![format!("tag-{}", doc.category)],
            ..Default::default()
        };
        ids.push(bookmarks.add(doc, options).unwrap().ticket.wait().await.unwrap());
    }
    bookmarks.mark_read(&ids[0]).unwrap().wait().await.unwrap();

    let stats = bookmarks.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.unread, 2);
    assert_eq!(stats.recently_added.len(), 3);
    assert_eq!(stats.top_categories[0].category, "politics");
    assert_eq!(stats.top_categories[0].count, 2);

    let hits = bookmarks.search("TAG-POLITICS", &SearchFilters::default());
    assert_eq!(hits.len(), 2);

    let unread_politics = bookmarks.search(
        "story",
        &SearchFilters {
            category: Some("politics".to_string()),
            is_read: Some(false),
            ..Default::default()
        },
    );
    assert_eq!(unread_politics.len(), 1);
    assert_eq!(unread_politics[0].item.document_id, "d2");
}

#[tokio::test]
async fn test_clear_forgets_local_entries_only() {
    let d1 = document("d1", "a");
    let store = store_with(&[d1.clone()]).await;
    let bookmarks = bookmarks_for("u1", &store, &EventBus::new(64));
    bookmarks
        .add(&d1, BookmarkOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    bookmarks
        .create_collection("Work", CollectionOptions::default())
        .unwrap()
        .ticket
        .wait()
        .await
        .unwrap();

    bookmarks.clear();
    assert!(bookmarks.list().is_empty());
    assert!(bookmarks.collections().is_empty());
    assert_eq!(store.entry_count("bookmarks").await, 1);

    bookmarks.refresh().await.unwrap();
    assert!(bookmarks.is_bookmarked("d1"));
    assert_eq!(bookmarks.collections().len(), 1);
}
