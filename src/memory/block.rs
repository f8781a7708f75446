//! Blocks and the block table entries
//!
//! A [`Block`] records where an allocation lives in the address space and the
//! payload written into it so far. Blocks never leave the heap; callers see
//! them only through [`BlockInfo`] copies.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Caller-assigned block identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Create a block id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BlockId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for BlockId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// One live allocation
///
/// `data` grows up to the highest offset ever written; `None` entries below
/// that mark cells skipped by a write that started past the previous end.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub(crate) start: usize,
    pub(crate) size: usize,
    data: Vec<Option<u8>>,
}

impl Block {
    pub(crate) fn new(
        start: usize,
        size: usize,
    ) -> Self {
        Self {
            start,
            size,
            data: Vec::new(),
        }
    }

    /// Cells covered by this block
    pub(crate) fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    /// High-water mark of writes
    pub(crate) fn written(&self) -> usize {
        self.data.len()
    }

    /// Payload byte at `offset`, if it was ever written
    pub(crate) fn byte_at(
        &self,
        offset: usize,
    ) -> Option<u8> {
        self.data.get(offset).copied().flatten()
    }

    /// Check that `offset..offset + length` lies inside the block
    pub(crate) fn fits(
        &self,
        offset: usize,
        length: usize,
    ) -> bool {
        offset
            .checked_add(length)
            .is_some_and(|end| end <= self.size)
    }

    /// Copy `bytes` into the payload at `offset`. Caller checks bounds.
    pub(crate) fn store(
        &mut self,
        offset: usize,
        bytes: &[u8],
    ) {
        let end = offset + bytes.len();
        debug_assert!(end <= self.size);
        if bytes.is_empty() {
            return;
        }
        if self.data.len() < end {
            self.data.resize(end, None);
        }
        for (slot, &byte) in self.data[offset..end].iter_mut().zip(bytes) {
            *slot = Some(byte);
        }
    }

    /// Copy `offset..offset + length` out of the payload.
    ///
    /// Returns `None` if any cell in the range was never written. Caller
    /// checks the range against `size`.
    pub(crate) fn load(
        &self,
        offset: usize,
        length: usize,
    ) -> Option<Vec<u8>> {
        if length == 0 {
            return Some(Vec::new());
        }
        self.data
            .get(offset..offset + length)?
            .iter()
            .copied()
            .collect()
    }

    pub(crate) fn info(
        &self,
        id: &BlockId,
    ) -> BlockInfo {
        BlockInfo {
            id: id.clone(),
            start: self.start,
            size: self.size,
            written: self.written(),
        }
    }
}

/// Copy of a block's bookkeeping, handed out to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block id
    pub id: BlockId,
    /// Offset of the first cell
    pub start: usize,
    /// Number of cells
    pub size: usize,
    /// High-water mark of the payload
    pub written: usize,
}

impl BlockInfo {
    /// One past the last cell
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}
