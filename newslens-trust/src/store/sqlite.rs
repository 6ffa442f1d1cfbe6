//! SQLite store
//!
//! Vote commits run inside one sqlx transaction: the vote row change, the
//! re-read of the document's votes and the statistics update either all land
//! or none do. Collection entries are kept as JSON payload rows.

use super::{
    sort_newest_first, CollectionItem, DocumentStore, Entry, RawEntry, Recompute,
    RemoteCollection, SnapshotFeed, SnapshotHub, VoteChange, VoteCommit, VoteStore,
};
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use async_trait::async_trait;
use newslens_common::time::{now, parse_rfc3339};
use newslens_common::{
    uuid_utils, BiasClass, Document, DocumentTrustStats, Error, Result, TrustScore, Vote,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

type VoteRow = (String, String, String, String, i64, i64, String);

type DocumentRow = (
    String,
    String,
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    f64,
    f64,
    i64,
    String,
    String,
);

type EntryRow = (String, String, String, String, String, String);

const VOTE_COLUMNS: &str = "id, user_id, document_id, bias, credibility, quality, voted_at";

/// Store backed by a sqlx SQLite pool
pub struct SqliteStore {
    pool: SqlitePool,
    hub: SnapshotHub,
    max_lock_wait_ms: u64,
}

impl SqliteStore {
    /// Wrap a pool whose schema was created by `newslens_common::db`
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_snapshot_capacity(pool, 16)
    }

    pub fn with_snapshot_capacity(pool: SqlitePool, capacity: usize) -> Self {
        Self {
            pool,
            hub: SnapshotHub::new(capacity),
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    /// Bound the time vote commits wait on a locked database
    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn owner_snapshot(&self, collection: &str, owner_id: &str) -> Result<Vec<RawEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, collection, owner_id, target_id, payload, created_at
            FROM collection_entries
            WHERE collection = ? AND owner_id = ?
            "#,
        )
        .bind(collection)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = rows
            .into_iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>>>()?;
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// Push a fresh snapshot to watchers; failures only cost a missed push
    async fn publish(&self, collection: &str, owner_id: &str) {
        if !self.hub.is_watched(collection, owner_id) {
            return;
        }
        match self.owner_snapshot(collection, owner_id).await {
            Ok(snapshot) => self.hub.publish(collection, owner_id, snapshot),
            Err(e) => warn!(collection, owner_id, error = %e, "Failed to read snapshot for watchers"),
        }
    }
}

fn vote_from_row(row: VoteRow) -> Result<Vote> {
    let (id, user_id, document_id, bias, credibility, quality, voted_at) = row;
    Ok(Vote {
        id,
        user_id,
        document_id,
        bias: bias.parse::<BiasClass>()?,
        credibility: rating_from_db(credibility)?,
        quality: rating_from_db(quality)?,
        voted_at: parse_rfc3339(&voted_at)?,
    })
}

fn rating_from_db(value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::Internal(format!("Rating out of range in database: {}", value)))
}

fn share_from_db(value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| Error::Internal(format!("Bias share out of range in database: {}", value)))
}

fn document_from_row(row: DocumentRow) -> Result<Document> {
    let (
        id,
        title,
        summary,
        category,
        total_votes,
        left,
        center,
        right,
        average_credibility,
        average_quality,
        bookmark_count,
        created_at,
        updated_at,
    ) = row;

    Ok(Document {
        id,
        title,
        summary,
        category,
        stats: DocumentTrustStats {
            total_votes: u32::try_from(total_votes).unwrap_or(0),
            bias_score: TrustScore::new(
                share_from_db(left)?,
                share_from_db(center)?,
                share_from_db(right)?,
            )?,
            average_credibility,
            average_quality,
        },
        bookmark_count,
        created_at: parse_rfc3339(&created_at)?,
        updated_at: parse_rfc3339(&updated_at)?,
    })
}

fn entry_from_row(row: EntryRow) -> Result<RawEntry> {
    let (id, collection, owner_id, target_id, payload, created_at) = row;
    Ok(RawEntry {
        id,
        collection,
        owner_id,
        target_id,
        created_at: parse_rfc3339(&created_at)?,
        payload: serde_json::from_str(&payload)?,
    })
}

async fn document_exists(tx: &mut Transaction<'_, Sqlite>, id: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

async fn find_vote(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    document_id: &str,
) -> Result<Option<Vote>> {
    let sql = format!(
        "SELECT {} FROM votes WHERE user_id = ? AND document_id = ?",
        VOTE_COLUMNS
    );
    let row: Option<VoteRow> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await?;
    row.map(vote_from_row).transpose()
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn put_document(&self, document: &Document) -> Result<()> {
        let score = document.stats.bias_score;
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, summary, category, total_votes,
                bias_left, bias_center, bias_right,
                average_credibility, average_quality, bookmark_count,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                category = excluded.category,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.summary)
        .bind(&document.category)
        .bind(i64::from(document.stats.total_votes))
        .bind(i64::from(score.left))
        .bind(i64::from(score.center))
        .bind(i64::from(score.right))
        .bind(document.stats.average_credibility)
        .bind(document.stats.average_quality)
        .bind(document.bookmark_count)
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, title, summary, category, total_votes,
                   bias_left, bias_center, bias_right,
                   average_credibility, average_quality, bookmark_count,
                   created_at, updated_at
            FROM documents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(document_from_row).transpose()
    }

    async fn adjust_bookmark_count(&self, id: &str, delta: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET bookmark_count = MAX(0, bookmark_count + ?) WHERE id = ?",
        )
        .bind(delta)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!("Document {} does not exist", id)));
        }
        Ok(())
    }
}

impl SqliteStore {
    async fn commit_once(
        &self,
        change: VoteChange,
        recompute: Recompute,
    ) -> Result<Option<VoteCommit>> {
        let mut tx = self.pool.begin().await?;
        let document_id = change.document_id().to_string();

        let (vote, replaced) = match change {
            VoteChange::Retract {
                user_id,
                document_id,
            } => {
                let result = sqlx::query("DELETE FROM votes WHERE user_id = ? AND document_id = ?")
                    .bind(&user_id)
                    .bind(&document_id)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    tx.rollback().await?;
                    return Ok(None);
                }
                (None, false)
            }
            VoteChange::Upsert {
                user_id,
                document_id,
                input,
                voted_at,
            } => {
                if !document_exists(&mut tx, &document_id).await? {
                    return Err(Error::Conflict(format!(
                        "Document {} does not exist",
                        document_id
                    )));
                }

                match find_vote(&mut tx, &user_id, &document_id).await? {
                    Some(existing) if existing.voted_at > voted_at => {
                        debug!(%user_id, %document_id, "Ignoring vote older than stored vote");
                        (Some(existing), true)
                    }
                    Some(existing) => {
                        sqlx::query(
                            "UPDATE votes SET bias = ?, credibility = ?, quality = ?, voted_at = ? WHERE id = ?",
                        )
                        .bind(input.bias.as_str())
                        .bind(i64::from(input.credibility))
                        .bind(i64::from(input.quality))
                        .bind(voted_at.to_rfc3339())
                        .bind(&existing.id)
                        .execute(&mut *tx)
                        .await?;
                        let updated = Vote {
                            bias: input.bias,
                            credibility: input.credibility,
                            quality: input.quality,
                            voted_at,
                            ..existing
                        };
                        (Some(updated), true)
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
                        sqlx::query(
                            "INSERT INTO votes (id, user_id, document_id, bias, credibility, quality, voted_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                        )
                        .bind(&vote.id)
                        .bind(&vote.user_id)
                        .bind(&vote.document_id)
                        .bind(vote.bias.as_str())
                        .bind(i64::from(vote.credibility))
                        .bind(i64::from(vote.quality))
                        .bind(vote.voted_at.to_rfc3339())
                        .execute(&mut *tx)
                        .await?;
                        (Some(vote), false)
                    }
                }
            }
        };

        let sql = format!("SELECT {} FROM votes WHERE document_id = ?", VOTE_COLUMNS);
        let rows: Vec<VoteRow> = sqlx::query_as(&sql)
            .bind(&document_id)
            .fetch_all(&mut *tx)
            .await?;
        let current = rows
            .into_iter()
            .map(vote_from_row)
            .collect::<Result<Vec<_>>>()?;
        let stats = recompute(&current);
        let score = stats.bias_score;

        sqlx::query(
            r#"
            UPDATE documents SET
                total_votes = ?,
                bias_left = ?, bias_center = ?, bias_right = ?,
                average_credibility = ?, average_quality = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(i64::from(stats.total_votes))
        .bind(i64::from(score.left))
        .bind(i64::from(score.center))
        .bind(i64::from(score.right))
        .bind(stats.average_credibility)
        .bind(stats.average_quality)
        .bind(now().to_rfc3339())
        .bind(&document_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(VoteCommit {
            vote,
            replaced,
            stats,
        }))
    }
}

#[async_trait]
impl VoteStore for SqliteStore {
    async fn commit(&self, change: VoteChange, recompute: Recompute) -> Result<Option<VoteCommit>> {
        retry_on_lock("vote commit", self.max_lock_wait_ms, || {
            self.commit_once(change.clone(), recompute)
        })
        .await
    }

    async fn votes_for_document(&self, document_id: &str) -> Result<Vec<Vote>> {
        let sql = format!("SELECT {} FROM votes WHERE document_id = ?", VOTE_COLUMNS);
        let rows: Vec<VoteRow> = sqlx::query_as(&sql)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(vote_from_row).collect()
    }

    async fn votes_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<Vote>> {
        let sql = format!("SELECT {} FROM votes WHERE user_id = ?", VOTE_COLUMNS);
        let rows: Vec<VoteRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        let mut votes = rows
            .into_iter()
            .map(vote_from_row)
            .collect::<Result<Vec<_>>>()?;
        // sort parsed timestamps rather than text: offsets may differ between writers
        votes.sort_by(|a, b| b.voted_at.cmp(&a.voted_at));
        votes.truncate(limit);
        Ok(votes)
    }

    async fn all_votes(&self) -> Result<Vec<Vote>> {
        let sql = format!("SELECT {} FROM votes", VOTE_COLUMNS);
        let rows: Vec<VoteRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(vote_from_row).collect()
    }
}

#[async_trait]
impl<T: CollectionItem> RemoteCollection<T> for SqliteStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<Entry<T>>> {
        self.owner_snapshot(T::COLLECTION, owner_id)
            .await?
            .iter()
            .map(RawEntry::decode)
            .collect()
    }

    async fn create(&self, item: &T) -> Result<String> {
        let raw = RawEntry::encode(uuid_utils::generate().to_string(), item)?;
        sqlx::query(
            r#"
            INSERT INTO collection_entries (id, collection, owner_id, target_id, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&raw.id)
        .bind(&raw.collection)
        .bind(&raw.owner_id)
        .bind(&raw.target_id)
        .bind(raw.payload.to_string())
        .bind(raw.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.publish(T::COLLECTION, item.owner_id()).await;
        Ok(raw.id)
    }

    async fn update(&self, id: &str, item: &T) -> Result<()> {
        let raw = RawEntry::encode(id.to_string(), item)?;
        let result = sqlx::query(
            r#"
            UPDATE collection_entries
            SET owner_id = ?, target_id = ?, payload = ?, created_at = ?
            WHERE id = ? AND collection = ?
            "#,
        )
        .bind(&raw.owner_id)
        .bind(&raw.target_id)
        .bind(raw.payload.to_string())
        .bind(raw.created_at.to_rfc3339())
        .bind(id)
        .bind(T::COLLECTION)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict(format!("Entry {} no longer exists", id)));
        }
        self.publish(T::COLLECTION, item.owner_id()).await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let owner: Option<(String,)> = sqlx::query_as(
            "SELECT owner_id FROM collection_entries WHERE id = ? AND collection = ?",
        )
        .bind(id)
        .bind(T::COLLECTION)
        .fetch_optional(&self.pool)
        .await?;

        let Some((owner_id,)) = owner else {
            return Ok(());
        };

        sqlx::query("DELETE FROM collection_entries WHERE id = ? AND collection = ?")
            .bind(id)
            .bind(T::COLLECTION)
            .execute(&self.pool)
            .await?;

        self.publish(T::COLLECTION, &owner_id).await;
        Ok(())
    }

    fn watch(&self, owner_id: &str) -> SnapshotFeed<T> {
        self.hub.subscribe::<T>(owner_id)
    }
}

