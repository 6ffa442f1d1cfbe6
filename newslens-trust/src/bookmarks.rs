//! Bookmarks
//!
//! A user's saved documents and the named folders they are filed in, each
//! kept through its own [`OptimisticCoordinator`]. The target document's
//! `bookmark_count` and the folder's `bookmark_count` are maintained as
//! best-effort follow-up writes.

use crate::store::{CollectionItem, DocumentStore, Entry, RemoteCollection};
use crate::sync::{
    LocalEntry, OptimisticCoordinator, PendingAdd, SecondaryEffects, SubscriptionHandle, Ticket,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newslens_common::events::EventBus;
use newslens_common::{time, Document, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Number of entries in [`BookmarkStats::recently_added`]
pub const RECENT_LIMIT: usize = 5;
/// Number of entries in [`BookmarkStats::top_categories`]
pub const TOP_CATEGORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

/// A saved document with the user's reading metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub owner_id: String,
    pub document_id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    /// 0-100
    #[serde(default)]
    pub reading_progress: Option<u8>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub bookmarked_at: DateTime<Utc>,
}

impl CollectionItem for Bookmark {
    const COLLECTION: &'static str = "bookmarks";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn target_id(&self) -> &str {
        &self.document_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.bookmarked_at
    }
}

/// Named folder grouping a user's bookmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkCollection {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Bookmarks filed here, maintained by [`BookmarkCounter`]
    #[serde(default)]
    pub bookmark_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionItem for BookmarkCollection {
    const COLLECTION: &'static str = "bookmark_collections";

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Folder names are unique per owner
    fn target_id(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Optional metadata given when creating a folder
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Optional metadata given when saving
#[derive(Debug, Clone, Default)]
pub struct BookmarkOptions {
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub priority: Priority,
}

impl Bookmark {
    /// Unread bookmark of `document` copying its title, summary and category
    pub fn for_document(owner_id: &str, document: &Document, options: BookmarkOptions) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            document_id: document.id.clone(),
            title: document.title.clone(),
            summary: document.summary.clone(),
            category: document.category.clone(),
            tags: options.tags,
            notes: options.notes,
            is_read: false,
            read_at: None,
            reading_progress: None,
            folder_id: options.folder_id,
            priority: options.priority,
            bookmarked_at: time::now(),
        }
    }

    fn matches_term(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term)
            || self.summary.to_lowercase().contains(&term)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&term))
    }
}

/// Metadata edit; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct BookmarkUpdate {
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub is_read: Option<bool>,
    pub reading_progress: Option<u8>,
    pub folder_id: Option<String>,
    pub priority: Option<Priority>,
}

impl BookmarkUpdate {
    /// Apply to a bookmark
    ///
    /// Marking read without an explicit progress stamps `read_at` and sets
    /// the progress to 100.
    pub fn apply(self, bookmark: &mut Bookmark) {
        if let Some(tags) = self.tags {
            bookmark.tags = tags;
        }
        if let Some(notes) = self.notes {
            bookmark.notes = Some(notes);
        }
        if let Some(folder_id) = self.folder_id {
            bookmark.folder_id = Some(folder_id);
        }
        if let Some(priority) = self.priority {
            bookmark.priority = priority;
        }
        if let Some(progress) = self.reading_progress {
            bookmark.reading_progress = Some(progress.min(100));
        }
        if let Some(is_read) = self.is_read {
            bookmark.is_read = is_read;
            if is_read && self.reading_progress.is_none() {
                bookmark.read_at = Some(time::now());
                bookmark.reading_progress = Some(100);
            }
        }
    }
}

/// Narrowing for [`Bookmarks::search`]
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub folder_id: Option<String>,
    pub is_read: Option<bool>,
}

impl SearchFilters {
    fn accepts(&self, bookmark: &Bookmark) -> bool {
        if let Some(category) = &self.category {
            if &bookmark.category != category {
                return false;
            }
        }
        if let Some(folder_id) = &self.folder_id {
            if bookmark.folder_id.as_ref() != Some(folder_id) {
                return false;
            }
        }
        if let Some(is_read) = self.is_read {
            if bookmark.is_read != is_read {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Summary of the locally visible bookmarks
#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkStats {
    pub total: usize,
    pub unread: usize,
    pub collections: usize,
    pub recently_added: Vec<LocalEntry<Bookmark>>,
    pub top_categories: Vec<CategoryCount>,
}

/// Keeps `Document::bookmark_count` and `BookmarkCollection::bookmark_count`
/// in step with confirmed bookmarks
///
/// The document and folder writes are attempted independently; a missing
/// document or folder is skipped.
pub struct BookmarkCounter {
    documents: Arc<dyn DocumentStore>,
    folders: Arc<dyn RemoteCollection<BookmarkCollection>>,
}

impl BookmarkCounter {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        folders: Arc<dyn RemoteCollection<BookmarkCollection>>,
    ) -> Self {
        Self { documents, folders }
    }

    async fn adjust_document(&self, entry: &Entry<Bookmark>, delta: i64) -> Result<()> {
        match self
            .documents
            .adjust_bookmark_count(&entry.item.document_id, delta)
            .await
        {
            Err(Error::Conflict(reason)) => {
                warn!(
                    document_id = %entry.item.document_id,
                    entry_id = %entry.id,
                    %reason,
                    "Bookmark counter skipped"
                );
                Ok(())
            }
            other => other,
        }
    }

    async fn adjust_folder(&self, owner_id: &str, folder_id: Option<&str>, delta: i64) -> Result<()> {
        let Some(folder_id) = folder_id else {
            return Ok(());
        };
        let folders = self.folders.list(owner_id).await?;
        let Some(mut folder) = folders.into_iter().find(|f| f.id == folder_id) else {
            warn!(%folder_id, owner_id, "Folder counter skipped, no such folder");
            return Ok(());
        };

        folder.item.bookmark_count = (folder.item.bookmark_count + delta).max(0);
        folder.item.updated_at = time::now();
        match self.folders.update(&folder.id, &folder.item).await {
            Err(Error::Conflict(reason)) => {
                warn!(%folder_id, %reason, "Folder counter skipped");
                Ok(())
            }
            other => other,
        }
    }

    async fn adjust(&self, entry: &Entry<Bookmark>, delta: i64) -> Result<()> {
        let document = self.adjust_document(entry, delta).await;
        let folder = self
            .adjust_folder(&entry.item.owner_id, entry.item.folder_id.as_deref(), delta)
            .await;
        document.and(folder)
    }
}

#[async_trait]
impl SecondaryEffects<Bookmark> for BookmarkCounter {
    async fn after_create(&self, entry: &Entry<Bookmark>) -> Result<()> {
        self.adjust(entry, 1).await
    }

    async fn after_delete(&self, entry: &Entry<Bookmark>) -> Result<()> {
        self.adjust(entry, -1).await
    }

    /// Moving a bookmark between folders shifts one count
    async fn after_update(&self, previous: &Bookmark, entry: &Entry<Bookmark>) -> Result<()> {
        if previous.folder_id == entry.item.folder_id {
            return Ok(());
        }
        let owner_id = &entry.item.owner_id;
        let left = self
            .adjust_folder(owner_id, previous.folder_id.as_deref(), -1)
            .await;
        let joined = self
            .adjust_folder(owner_id, entry.item.folder_id.as_deref(), 1)
            .await;
        left.and(joined)
    }
}

/// One user's bookmarks and bookmark folders
pub struct Bookmarks {
    coordinator: OptimisticCoordinator<Bookmark>,
    collections: OptimisticCoordinator<BookmarkCollection>,
}

impl Bookmarks {
    pub fn new(
        owner_id: impl Into<String>,
        remote: Arc<dyn RemoteCollection<Bookmark>>,
        folders: Arc<dyn RemoteCollection<BookmarkCollection>>,
        documents: Arc<dyn DocumentStore>,
        event_bus: EventBus,
    ) -> Self {
        let owner_id = owner_id.into();
        let counter = Arc::new(BookmarkCounter::new(documents, Arc::clone(&folders)));
        Self {
            coordinator: OptimisticCoordinator::with_effects(
                owner_id.clone(),
                remote,
                counter,
                event_bus.clone(),
            ),
            collections: OptimisticCoordinator::new(owner_id, folders, event_bus),
        }
    }

    pub fn coordinator(&self) -> &OptimisticCoordinator<Bookmark> {
        &self.coordinator
    }

    pub fn collection_coordinator(&self) -> &OptimisticCoordinator<BookmarkCollection> {
        &self.collections
    }

    /// Create a folder; it shows up locally right away
    ///
    /// Blank names and names already in use are rejected with
    /// `Error::Validation`.
    pub fn create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<PendingAdd<BookmarkCollection>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Folder name is required".to_string()));
        }
        if self.collections.is_saved(name) {
            return Err(Error::Validation(format!("Folder {} already exists", name)));
        }
        let now = time::now();
        Ok(self.collections.add(BookmarkCollection {
            owner_id: self.collections.owner_id().to_string(),
            name: name.to_string(),
            description: options.description,
            color: options.color,
            icon: options.icon,
            is_default: false,
            bookmark_count: 0,
            created_at: now,
            updated_at: now,
        }))
    }

    /// Visible folders, newest first
    pub fn collections(&self) -> Vec<LocalEntry<BookmarkCollection>> {
        self.collections.local_entries()
    }

    /// Save a document; it shows up locally right away
    ///
    /// A document that is already saved is rejected with `Error::Validation`.
    pub fn add(&self, document: &Document, options: BookmarkOptions) -> Result<PendingAdd<Bookmark>> {
        if self.is_bookmarked(&document.id) {
            return Err(Error::Validation(format!(
                "Document {} is already bookmarked",
                document.id
            )));
        }
        let bookmark = Bookmark::for_document(self.coordinator.owner_id(), document, options);
        Ok(self.coordinator.add(bookmark))
    }

    /// Remove a bookmark by its (temporary or authoritative) id
    pub fn remove(&self, id: &str) -> Result<Ticket<()>> {
        self.coordinator.remove(id)
    }

    /// Remove whichever bookmark points at `document_id`
    pub fn remove_document(&self, document_id: &str) -> Result<Ticket<()>> {
        let entry = self
            .coordinator
            .local_entries()
            .into_iter()
            .find(|e| e.item.document_id == document_id)
            .ok_or_else(|| Error::NotFound(format!("Document {} is not bookmarked", document_id)))?;
        self.coordinator.remove(&entry.id)
    }

    pub fn is_bookmarked(&self, document_id: &str) -> bool {
        self.coordinator.is_saved(document_id)
    }

    pub fn update(&self, id: &str, update: BookmarkUpdate) -> Result<Ticket<()>> {
        self.coordinator.update(id, |bookmark| update.apply(bookmark))
    }

    pub fn mark_read(&self, id: &str) -> Result<Ticket<()>> {
        self.update(
            id,
            BookmarkUpdate {
                is_read: Some(true),
                ..Default::default()
            },
        )
    }

    /// Visible bookmarks, newest first
    pub fn list(&self) -> Vec<LocalEntry<Bookmark>> {
        self.coordinator.local_entries()
    }

    pub fn stats(&self) -> BookmarkStats {
        let entries = self.coordinator.local_entries();

        let mut categories: HashMap<&str, usize> = HashMap::new();
        for entry in &entries {
            *categories.entry(entry.item.category.as_str()).or_default() += 1;
        }
        let mut top_categories: Vec<CategoryCount> = categories
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        top_categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
        top_categories.truncate(TOP_CATEGORY_LIMIT);

        BookmarkStats {
            total: entries.len(),
            unread: entries.iter().filter(|e| !e.item.is_read).count(),
            collections: self.collections.len(),
            recently_added: entries.iter().take(RECENT_LIMIT).cloned().collect(),
            top_categories,
        }
    }

    /// Case-insensitive match on title, summary or tags, then filters
    pub fn search(&self, term: &str, filters: &SearchFilters) -> Vec<LocalEntry<Bookmark>> {
        self.coordinator
            .local_entries()
            .into_iter()
            .filter(|e| filters.accepts(&e.item) && e.item.matches_term(term))
            .collect()
    }

    /// Fetch bookmarks and folders once
    pub async fn refresh(&self) -> Result<()> {
        self.coordinator.refresh().await?;
        self.collections.refresh().await
    }

    /// Follow remote changes to bookmarks and folders
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.coordinator
            .subscribe()
            .join(self.collections.subscribe())
    }

    /// Forget all local bookmarks and folders (sign-out)
    pub fn clear(&self) {
        self.coordinator.clear();
        self.collections.clear();
    }
}
