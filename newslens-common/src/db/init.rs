//! Database initialization
//!
//! Creates the SQLite file and schema on first run; every statement is
//! idempotent so opening an existing database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the snapshot readers proceed while a vote commit holds the writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// In-memory database with the full schema (tests and dry runs)
///
/// Limited to one connection: every pooled connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    create_documents_table(pool).await?;
    create_votes_table(pool).await?;
    create_collection_entries_table(pool).await?;
    Ok(())
}

/// Shared documents and their denormalized trust statistics
async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            total_votes INTEGER NOT NULL DEFAULT 0,
            bias_left INTEGER NOT NULL DEFAULT 33,
            bias_center INTEGER NOT NULL DEFAULT 34,
            bias_right INTEGER NOT NULL DEFAULT 33,
            average_credibility REAL NOT NULL DEFAULT 0,
            average_quality REAL NOT NULL DEFAULT 0,
            bookmark_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (bias_left + bias_center + bias_right = 100)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per (user, document) pair
async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            bias TEXT NOT NULL CHECK (bias IN ('left', 'center', 'right')),
            credibility INTEGER NOT NULL CHECK (credibility BETWEEN 1 AND 5),
            quality INTEGER NOT NULL CHECK (quality BETWEEN 1 AND 5),
            voted_at TEXT NOT NULL,
            UNIQUE (user_id, document_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_document ON votes(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_user ON votes(user_id, voted_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Per-user collections (bookmarks, ...) with a JSON payload
async fn create_collection_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_entries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_collection_owner ON collection_entries(collection, owner_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
