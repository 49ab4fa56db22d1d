//! Blacklist store trait and SQLite implementation.

use crate::error::StoreResult;
use crate::models::SyncStatusRow;
use async_trait::async_trait;
use drl_core::SyncStatus;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Bulk inserts and deletes are paged to bound per-statement size. Paging is
/// a transaction-size optimization only: the final set equals applying the
/// whole batch at once.
pub const PAGE: usize = 1000;

/// Location of the store file under the configured base path.
pub const STORE_RELATIVE_PATH: &str = "DgcReaderData/Blacklist/Italy/italian-drl.ldb";

const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sync_status (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        current_version INTEGER NOT NULL DEFAULT 0,
        current_version_id TEXT NOT NULL DEFAULT '',
        target_version INTEGER NOT NULL DEFAULT 0,
        target_version_id TEXT NOT NULL DEFAULT '',
        target_chunks_count INTEGER NOT NULL DEFAULT 0,
        target_chunk_size INTEGER NOT NULL DEFAULT 0,
        target_total_number_ucvi INTEGER NOT NULL DEFAULT 0,
        last_chunk_saved INTEGER NOT NULL DEFAULT 0,
        last_check TEXT
    )",
    "CREATE TABLE IF NOT EXISTS blacklist_entries (
        hashed_ucvi TEXT PRIMARY KEY
    ) WITHOUT ROWID",
];

/// Mutation persisted for one downloaded chunk.
///
/// The optional wipe runs in the same transaction as the inserts and the
/// status update, so no reader can observe an empty mirror between a full
/// replacement's wipe and its first entries.
#[derive(Debug, Clone, Copy)]
pub struct ChunkApply<'a> {
    /// Wipe the whole blacklist first (first chunk of a full replacement).
    pub wipe_first: bool,
    pub insertions: &'a [String],
    pub deletions: &'a [String],
}

/// Row counts observed while applying a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkApplyStats {
    /// Entries actually inserted (already-present hashes are skipped).
    pub inserted: u64,
    pub deleted: u64,
}

/// The local store interface consumed by the sync engine and the provider.
///
/// Every method is a single atomic operation on the underlying database.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Load the singleton status row, creating it with defaults on first
    /// access.
    async fn load_or_init_status(&self) -> StoreResult<SyncStatus>;

    /// Persist the status row.
    async fn update_status(&self, status: &SyncStatus) -> StoreResult<()>;

    /// Membership test on the hashed identifier.
    async fn contains_hashed_ucvi(&self, hashed_ucvi: &str) -> StoreResult<bool>;

    /// Insert hashes that are not yet present. Returns how many were new.
    async fn bulk_insert_missing(&self, hashes: &[String]) -> StoreResult<u64>;

    /// Delete hashes. Returns how many were removed.
    async fn bulk_delete(&self, hashes: &[String]) -> StoreResult<u64>;

    /// Number of persisted blacklist entries.
    async fn count_entries(&self) -> StoreResult<i64>;

    /// Apply one chunk's mutations and the resulting status in a single
    /// transaction.
    async fn apply_chunk(
        &self,
        apply: ChunkApply<'_>,
        status: &SyncStatus,
    ) -> StoreResult<ChunkApplyStats>;

    /// Wipe all blacklist entries and persist the caller's (reset) status in
    /// a single transaction. The status row itself is preserved.
    async fn reset(&self, status: &SyncStatus) -> StoreResult<()>;
}

/// SQLite-backed blacklist store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the store at an explicit file path.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids "database is locked" failures when membership queries
            // race the refresh task.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Open the store at its conventional location under a base directory.
    pub async fn open_under(base_path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(base_path.as_ref().join(STORE_RELATIVE_PATH)).await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Apply the schema. Additive only; unknown columns left by newer
    /// versions are ignored by the queries here.
    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Check database connectivity and health.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn update_status_tx(
    tx: &mut Transaction<'_, Sqlite>,
    status: &SyncStatus,
) -> StoreResult<()> {
    sqlx::query(
        "UPDATE sync_status SET
            current_version = ?, current_version_id = ?,
            target_version = ?, target_version_id = ?,
            target_chunks_count = ?, target_chunk_size = ?,
            target_total_number_ucvi = ?, last_chunk_saved = ?,
            last_check = ?
         WHERE id = 1",
    )
    .bind(status.current_version)
    .bind(&status.current_version_id)
    .bind(status.target_version)
    .bind(&status.target_version_id)
    .bind(status.target_chunks_count)
    .bind(status.target_chunk_size)
    .bind(status.target_total_number_ucvi)
    .bind(status.last_chunk_saved)
    .bind(status.last_check)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_missing_tx(
    tx: &mut Transaction<'_, Sqlite>,
    hashes: &[String],
) -> StoreResult<u64> {
    let mut inserted = 0u64;
    for page in hashes.chunks(PAGE) {
        let placeholders = vec!["(?)"; page.len()].join(", ");
        let sql = format!("INSERT OR IGNORE INTO blacklist_entries (hashed_ucvi) VALUES {placeholders}");
        let mut query = sqlx::query(&sql);
        for hash in page {
            query = query.bind(hash);
        }
        inserted += query.execute(&mut **tx).await?.rows_affected();
    }
    Ok(inserted)
}

async fn delete_tx(tx: &mut Transaction<'_, Sqlite>, hashes: &[String]) -> StoreResult<u64> {
    let mut deleted = 0u64;
    for page in hashes.chunks(PAGE) {
        let placeholders = vec!["?"; page.len()].join(", ");
        let sql = format!("DELETE FROM blacklist_entries WHERE hashed_ucvi IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for hash in page {
            query = query.bind(hash);
        }
        deleted += query.execute(&mut **tx).await?.rows_affected();
    }
    Ok(deleted)
}

#[async_trait]
impl BlacklistStore for SqliteStore {
    async fn load_or_init_status(&self) -> StoreResult<SyncStatus> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO sync_status (id) VALUES (1)")
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, SyncStatusRow>("SELECT * FROM sync_status WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_status(&self, status: &SyncStatus) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        update_status_tx(&mut tx, status).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn contains_hashed_ucvi(&self, hashed_ucvi: &str) -> StoreResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM blacklist_entries WHERE hashed_ucvi = ?")
                .bind(hashed_ucvi)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn bulk_insert_missing(&self, hashes: &[String]) -> StoreResult<u64> {
        if hashes.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let inserted = insert_missing_tx(&mut tx, hashes).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn bulk_delete(&self, hashes: &[String]) -> StoreResult<u64> {
        if hashes.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let deleted = delete_tx(&mut tx, hashes).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn count_entries(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blacklist_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn apply_chunk(
        &self,
        apply: ChunkApply<'_>,
        status: &SyncStatus,
    ) -> StoreResult<ChunkApplyStats> {
        let mut tx = self.pool.begin().await?;

        if apply.wipe_first {
            let wiped = sqlx::query("DELETE FROM blacklist_entries")
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if wiped > 0 {
                tracing::debug!(wiped, "dropped stale entries for full replacement");
            }
        }

        let inserted = insert_missing_tx(&mut tx, apply.insertions).await?;
        let deleted = delete_tx(&mut tx, apply.deletions).await?;
        update_status_tx(&mut tx, status).await?;

        tx.commit().await?;
        Ok(ChunkApplyStats { inserted, deleted })
    }

    async fn reset(&self, status: &SyncStatus) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM blacklist_entries")
            .execute(&mut *tx)
            .await?;
        update_status_tx(&mut tx, status).await?;
        tx.commit().await?;
        Ok(())
    }
}
