//! Storage layer error types.

use crate::storage::buffer::FrameId;
use crate::storage::page::BlockId;
use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Buffer pool exhausted: every frame is pinned")]
    Exhausted,

    #[error("Pin count underflow: frame {slot} is not pinned")]
    PinCountUnderflow { slot: FrameId },

    #[error("Invalid replacement policy: {0}")]
    InvalidPolicyConfiguration(String),

    #[error("Invalid pool capacity: {0} (must be greater than zero)")]
    InvalidCapacity(usize),

    #[error("Stale frame handle: frame {slot} no longer holds {block}")]
    StaleHandle { slot: FrameId, block: BlockId },

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Offset out of bounds: {offset} + {len} exceeds page size")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
