//! Upstream DRL service client.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use drl_core::{ChunkData, VersionInfo};
use reqwest::Url;
use serde::de::DeserializeOwned;

/// Source of version descriptors and chunks.
///
/// Implemented by [`HttpDrlClient`] against the real service and by scripted
/// fakes in sync-engine tests.
#[async_trait]
pub trait DrlSource: Send + Sync {
    /// Fetch the server's current published version descriptor, hinting the
    /// locally installed version.
    async fn get_status(&self, known_version: i64) -> ClientResult<VersionInfo>;

    /// Fetch one 1-based chunk of the transition from `from_version`. The
    /// server decides whether the response is a snapshot fragment or a delta.
    async fn get_chunk(&self, from_version: i64, chunk: i64) -> ClientResult<ChunkData>;
}

/// HTTP implementation of [`DrlSource`].
#[derive(Clone)]
pub struct HttpDrlClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpDrlClient {
    /// Create a client for the given service base URL.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        // A trailing slash makes Url::join treat the last path segment as a
        // directory instead of replacing it.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url =
            Url::parse(&normalized).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl DrlSource for HttpDrlClient {
    async fn get_status(&self, known_version: i64) -> ClientResult<VersionInfo> {
        let mut url = self.url("status")?;
        url.query_pairs_mut()
            .append_pair("version", &known_version.to_string());
        self.fetch_json(url).await
    }

    async fn get_chunk(&self, from_version: i64, chunk: i64) -> ClientResult<ChunkData> {
        let mut url = self.url("chunk")?;
        url.query_pairs_mut()
            .append_pair("version", &from_version.to_string())
            .append_pair("chunk", &chunk.to_string());
        self.fetch_json(url).await
    }
}
