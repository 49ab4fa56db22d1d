//! Database models mapping to the store schema.

use drl_core::SyncStatus;
use sqlx::FromRow;
use time::OffsetDateTime;

/// The singleton synchronization status row (`id` is always 1).
#[derive(Debug, Clone, FromRow)]
pub struct SyncStatusRow {
    pub id: i64,
    pub current_version: i64,
    pub current_version_id: String,
    pub target_version: i64,
    pub target_version_id: String,
    pub target_chunks_count: i64,
    pub target_chunk_size: i64,
    pub target_total_number_ucvi: i64,
    pub last_chunk_saved: i64,
    pub last_check: Option<OffsetDateTime>,
}

impl From<SyncStatusRow> for SyncStatus {
    fn from(row: SyncStatusRow) -> Self {
        SyncStatus {
            current_version: row.current_version,
            current_version_id: row.current_version_id,
            target_version: row.target_version,
            target_version_id: row.target_version_id,
            target_chunks_count: row.target_chunks_count,
            target_chunk_size: row.target_chunk_size,
            target_total_number_ucvi: row.target_total_number_ucvi,
            last_chunk_saved: row.last_chunk_saved,
            last_check: row.last_check,
        }
    }
}
