//! HTTP client for the upstream DRL service.

pub mod client;
pub mod error;

pub use client::{DrlSource, HttpDrlClient};
pub use error::{ClientError, ClientResult};
