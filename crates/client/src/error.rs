//! Remote client error types.

use thiserror::Error;

/// Errors from the upstream DRL service.
///
/// Retries are the caller's concern; the client reports each failure once.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

/// Result type for remote client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
