use thiserror::Error;

use crate::storage::BodyStoreError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("body store error: {0}")]
    Body(#[from] BodyStoreError),

    #[error("reserved namespace name: {0}")]
    ReservedNamespace(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
