//! Upstream wire model and progress events.

use crate::status::SyncStatus;
use serde::{Deserialize, Serialize};

/// Descriptor of the server's current published version.
///
/// Unknown fields are ignored so the upstream can add fields without breaking
/// older mirrors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: i64,
    /// Opaque server-supplied tag uniquely identifying the version payload.
    pub id: String,
    #[serde(default)]
    pub total_number_ucvi: i64,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub single_chunk_size: i64,
}

/// A differential update: identifiers added to and removed from the list
/// relative to the previous installed version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrlDelta {
    #[serde(default)]
    pub insertions: Vec<String>,
    #[serde(default)]
    pub deletions: Vec<String>,
}

/// One numbered slice of a version transition.
///
/// The server decides the form: `revoked_ucvi_list` carries a fragment of a
/// full snapshot, `delta` carries a differential update. Exactly one of the
/// two is populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    pub version: i64,
    pub id: String,
    #[serde(default)]
    pub total_number_ucvi: i64,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub single_chunk_size: i64,
    /// 1-based index of this chunk within the transition.
    pub chunk: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_ucvi_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<DrlDelta>,
}

impl ChunkData {
    /// Project the version descriptor carried by this chunk.
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            version: self.version,
            id: self.id.clone(),
            total_number_ucvi: self.total_number_ucvi,
            total_chunks: self.total_chunks,
            single_chunk_size: self.single_chunk_size,
        }
    }

    /// First chunk of a full (non-differential) replacement.
    ///
    /// Snapshot chunks past the first only ever insert: the server partitions
    /// the snapshot across chunks without repeating entries.
    pub fn is_snapshot_start(&self) -> bool {
        self.chunk == 1
            && self
                .revoked_ucvi_list
                .as_ref()
                .is_some_and(|list| !list.is_empty())
    }
}

/// Progress event emitted while a version transition is downloaded.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub current_version: i64,
    pub target_version: i64,
    pub last_chunk_saved: i64,
    pub target_chunks_count: i64,
    pub target_chunk_size: i64,
    /// Fraction of chunks persisted, in `0.0..=1.0`; `0.0` when no target is
    /// known.
    pub total_progress_percent: f32,
    /// The target has been fully applied and finalized.
    pub is_completed: bool,
}

impl DownloadProgress {
    /// Snapshot the progress of a status record.
    pub fn from_status(status: &SyncStatus, is_completed: bool) -> Self {
        let total_progress_percent = if status.target_chunks_count > 0 {
            status.last_chunk_saved as f32 / status.target_chunks_count as f32
        } else {
            0.0
        };
        Self {
            current_version: status.current_version,
            target_version: status.target_version,
            last_chunk_saved: status.last_chunk_saved,
            target_chunks_count: status.target_chunks_count,
            target_chunk_size: status.target_chunk_size,
            total_progress_percent,
            is_completed,
        }
    }
}
