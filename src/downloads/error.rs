use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to materialize cache entry: {0}")]
    Materialize(#[from] CacheError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the streaming HTTP client.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("connection timeout")]
    Timeout,

    #[error("HTTP {status} from {url}")]
    BadStatus { status: u16, url: String },

    #[error("too many redirects")]
    TooManyRedirects,
}

pub type Result<T> = std::result::Result<T, DownloadError>;
