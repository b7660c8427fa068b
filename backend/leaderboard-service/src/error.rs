/// Error types for leaderboard-service
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("chunk task failed: {0}")]
    ChunkJoin(#[from] tokio::task::JoinError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for refresh operations
pub type Result<T> = std::result::Result<T, RefreshError>;
