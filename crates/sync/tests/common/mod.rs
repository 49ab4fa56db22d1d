//! Shared fixtures for sync-engine and provider tests.

use async_trait::async_trait;
use drl_client::{ClientError, ClientResult, DrlSource};
use drl_core::{ChunkData, DrlDelta, HashedUcvi, VersionInfo};
use drl_store::{SqliteStore, StoreResult};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;

/// Hash a cleartext identifier into its persisted form.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn h(ucvi: &str) -> String {
    HashedUcvi::compute(ucvi).to_base64()
}

/// Create a store backed by a temporary directory.
#[allow(dead_code)]
pub async fn test_store() -> StoreResult<(Arc<SqliteStore>, TempDir)> {
    let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
    let store = SqliteStore::open_under(temp_dir.path()).await?;
    Ok((Arc::new(store), temp_dir))
}

#[derive(Clone)]
struct Publication {
    version: VersionInfo,
    chunks: Vec<ChunkData>,
}

#[derive(Default)]
struct Inner {
    publication: Option<Publication>,
    /// Publication swapped in after the current version's chunk N is served.
    swap_after: Option<(i64, Publication)>,
    /// Chunk fetches with an index above this value fail.
    fail_chunks_above: Option<i64>,
    fail_status: bool,
    status_delay: Option<Duration>,
    chunk_delay: Option<Duration>,
    status_calls: usize,
    chunk_calls: usize,
    requested_chunks: Vec<i64>,
}

/// A scripted upstream DRL service with call instrumentation.
#[derive(Default)]
pub struct FakeDrl {
    inner: Mutex<Inner>,
}

#[allow(dead_code)]
impl FakeDrl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_publication(
        version: i64,
        id: &str,
        chunk_lists: Vec<Vec<String>>,
        total_ucvi: i64,
    ) -> Publication {
        let info = VersionInfo {
            version,
            id: id.to_string(),
            total_number_ucvi: total_ucvi,
            total_chunks: chunk_lists.len() as i64,
            single_chunk_size: 1000,
        };
        let chunks = chunk_lists
            .into_iter()
            .enumerate()
            .map(|(i, list)| ChunkData {
                version: info.version,
                id: info.id.clone(),
                total_number_ucvi: info.total_number_ucvi,
                total_chunks: info.total_chunks,
                single_chunk_size: info.single_chunk_size,
                chunk: i as i64 + 1,
                revoked_ucvi_list: Some(list),
                delta: None,
            })
            .collect();
        Publication {
            version: info,
            chunks,
        }
    }

    fn delta_publication(
        version: i64,
        id: &str,
        chunk_deltas: Vec<(Vec<String>, Vec<String>)>,
        total_ucvi: i64,
    ) -> Publication {
        let info = VersionInfo {
            version,
            id: id.to_string(),
            total_number_ucvi: total_ucvi,
            total_chunks: chunk_deltas.len() as i64,
            single_chunk_size: 1000,
        };
        let chunks = chunk_deltas
            .into_iter()
            .enumerate()
            .map(|(i, (insertions, deletions))| ChunkData {
                version: info.version,
                id: info.id.clone(),
                total_number_ucvi: info.total_number_ucvi,
                total_chunks: info.total_chunks,
                single_chunk_size: info.single_chunk_size,
                chunk: i as i64 + 1,
                revoked_ucvi_list: None,
                delta: Some(DrlDelta {
                    insertions,
                    deletions,
                }),
            })
            .collect();
        Publication {
            version: info,
            chunks,
        }
    }

    /// Publish a full-snapshot version partitioned across the given chunks.
    pub fn publish_snapshot(
        &self,
        version: i64,
        id: &str,
        chunk_lists: Vec<Vec<String>>,
        total_ucvi: i64,
    ) {
        self.lock().publication = Some(Self::snapshot_publication(
            version,
            id,
            chunk_lists,
            total_ucvi,
        ));
    }

    /// Publish a differential version.
    pub fn publish_delta(
        &self,
        version: i64,
        id: &str,
        chunk_deltas: Vec<(Vec<String>, Vec<String>)>,
        total_ucvi: i64,
    ) {
        self.lock().publication =
            Some(Self::delta_publication(version, id, chunk_deltas, total_ucvi));
    }

    /// After chunk `after_chunk` of the current version is served, swap in a
    /// new snapshot publication for all subsequent calls.
    pub fn publish_snapshot_after_chunk(
        &self,
        after_chunk: i64,
        version: i64,
        id: &str,
        chunk_lists: Vec<Vec<String>>,
        total_ucvi: i64,
    ) {
        self.lock().swap_after = Some((
            after_chunk,
            Self::snapshot_publication(version, id, chunk_lists, total_ucvi),
        ));
    }

    /// Make chunk fetches above the given index fail until cleared.
    pub fn fail_chunks_above(&self, index: i64) {
        self.lock().fail_chunks_above = Some(index);
    }

    /// Clear a chunk failure injection.
    pub fn clear_chunk_failures(&self) {
        self.lock().fail_chunks_above = None;
    }

    /// Make status fetches fail until cleared.
    pub fn fail_status(&self, fail: bool) {
        self.lock().fail_status = fail;
    }

    /// Delay every status response.
    pub fn set_status_delay(&self, delay: Duration) {
        self.lock().status_delay = Some(delay);
    }

    /// Delay every chunk response, keeping a download in flight long enough
    /// for concurrency assertions.
    pub fn set_chunk_delay(&self, delay: Duration) {
        self.lock().chunk_delay = Some(delay);
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub fn chunk_calls(&self) -> usize {
        self.lock().chunk_calls
    }

    /// Chunk indices requested, in order.
    pub fn requested_chunks(&self) -> Vec<i64> {
        self.lock().requested_chunks.clone()
    }

    pub fn reset_counters(&self) {
        let mut inner = self.lock();
        inner.status_calls = 0;
        inner.chunk_calls = 0;
        inner.requested_chunks.clear();
    }
}

fn upstream(status: u16, body: &str) -> ClientError {
    ClientError::Upstream {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl DrlSource for FakeDrl {
    async fn get_status(&self, _known_version: i64) -> ClientResult<VersionInfo> {
        let (response, delay) = {
            let mut inner = self.lock();
            inner.status_calls += 1;
            let response = if inner.fail_status {
                Err(upstream(500, "status unavailable"))
            } else {
                inner
                    .publication
                    .as_ref()
                    .map(|p| p.version.clone())
                    .ok_or_else(|| upstream(404, "no published version"))
            };
            (response, inner.status_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn get_chunk(&self, _from_version: i64, chunk: i64) -> ClientResult<ChunkData> {
        let (response, delay) = {
            let mut inner = self.lock();
            inner.chunk_calls += 1;
            inner.requested_chunks.push(chunk);

            if inner.fail_chunks_above.is_some_and(|above| chunk > above) {
                return Err(upstream(500, "chunk unavailable"));
            }

            let publication = inner
                .publication
                .as_ref()
                .ok_or_else(|| upstream(404, "no published version"))?;
            let response = publication
                .chunks
                .get(chunk as usize - 1)
                .cloned()
                .ok_or_else(|| upstream(404, "chunk out of range"))?;

            let should_swap = inner
                .swap_after
                .as_ref()
                .is_some_and(|(after, _)| chunk >= *after);
            if should_swap && let Some((_, next)) = inner.swap_after.take() {
                inner.publication = Some(next);
            }

            (response, inner.chunk_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(response)
    }
}
