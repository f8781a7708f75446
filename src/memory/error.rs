//! Memory manager errors
//!
//! Every operation returns a [`MemoryResult`]. Errors are ordinary outcomes of
//! caller input; the manager never enters an unrecoverable state.

use thiserror::Error;

use super::block::BlockId;

/// Memory manager error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Zero size, or an id that is already live
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The id does not denote a live block
    #[error("Block not found: {id}")]
    NotFound { id: BlockId },

    /// Range outside the block, or over cells never written
    #[error(
        "Out of bounds: offset {offset} length {length} on block {id} (size: {size}, written: {written})"
    )]
    OutOfBounds {
        id: BlockId,
        offset: usize,
        length: usize,
        size: usize,
        written: usize,
    },

    /// No free run is long enough, even if the total free space would be
    #[error(
        "Insufficient contiguous memory: requested {requested}, largest free run {largest_free}, total free {total_free}"
    )]
    InsufficientMemory {
        requested: usize,
        largest_free: usize,
        total_free: usize,
    },
}

/// Error kind without payload, for coarse matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    OutOfBounds,
    InsufficientMemory,
}

impl MemoryError {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MemoryError::NotFound { .. } => ErrorKind::NotFound,
            MemoryError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            MemoryError::InsufficientMemory { .. } => ErrorKind::InsufficientMemory,
        }
    }

    /// True when defragmenting could let the same request succeed
    pub fn is_fragmentation(&self) -> bool {
        matches!(
            self,
            MemoryError::InsufficientMemory {
                requested,
                total_free,
                ..
            } if requested <= total_free
        )
    }

    pub(crate) fn not_found(id: &str) -> Self {
        MemoryError::NotFound { id: id.into() }
    }
}

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;
