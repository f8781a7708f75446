//! Simulated memory with first-fit allocation
//!
//! This module models a flat, fixed-size memory region. Blocks are carved out
//! of it first-fit, freed individually, and compacted toward offset 0 by
//! [`MemoryManager::defragment`] when fragmentation prevents an allocation.
//!
//! # Structure
//! - `address_space`: cell tags and free-run scanning
//! - `block`: block table entries and [`BlockInfo`] copies
//! - `heap`: the unsynchronized engine
//! - [`MemoryManager`]: the engine behind one lock
//!
//! # Concurrency
//! Every public operation holds the manager's mutex from validation to the
//! last bookkeeping write, so no caller ever sees a half-updated address space
//! or block table. Share a manager across threads with `Arc<MemoryManager>`.

mod address_space;
mod block;
mod error;
mod heap;
mod snapshot;

pub use address_space::Cell;
pub use block::{BlockId, BlockInfo};
pub use error::{ErrorKind, MemoryError, MemoryResult};
pub use snapshot::{MemorySnapshot, MemoryStats, FREE_MARK, OCCUPIED_MARK};

use parking_lot::Mutex;

use crate::util::config::MemoryConfig;
use heap::Heap;

/// Thread-safe memory manager
///
/// Owns the address space and the block table. Callers only exchange ids and
/// copied bytes with it.
///
/// # Example
///
/// ```
/// use memsim::memory::{ErrorKind, MemoryManager};
///
/// let memory = MemoryManager::new(10).unwrap();
/// assert_eq!(memory.allocate("a", 4), Ok(0));
/// assert_eq!(memory.allocate("b", 3), Ok(4));
/// memory.free("a").unwrap();
///
/// let err = memory.allocate("c", 5).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::InsufficientMemory);
///
/// memory.defragment();
/// assert_eq!(memory.allocate("c", 5), Ok(3));
/// ```
#[derive(Debug)]
pub struct MemoryManager {
    heap: Mutex<Heap>,
}

impl MemoryManager {
    /// Create a manager over `size` cells
    ///
    /// # Errors
    /// `InvalidArgument` if `size` is 0.
    pub fn new(size: usize) -> MemoryResult<Self> {
        let heap = Heap::new(size)?;
        tracing::debug!(size, "created memory manager");
        Ok(Self {
            heap: Mutex::new(heap),
        })
    }

    /// Create a manager from configuration
    pub fn from_config(config: &MemoryConfig) -> MemoryResult<Self> {
        Self::new(config.size)
    }

    /// Total number of cells
    pub fn capacity(&self) -> usize {
        self.heap.lock().capacity()
    }

    /// Allocate `size` cells for `id`
    ///
    /// Takes the lowest-start free run that is long enough and returns its
    /// start offset.
    ///
    /// # Errors
    /// - `InvalidArgument` if `size` is 0 or `id` is already live
    /// - `InsufficientMemory` if no single free run holds `size` cells
    pub fn allocate(
        &self,
        id: impl Into<BlockId>,
        size: usize,
    ) -> MemoryResult<usize> {
        let mut heap = self.heap.lock();
        let start = heap.allocate(id.into(), size)?;
        debug_check(&heap);
        Ok(start)
    }

    /// Allocate under a generated numeric id (`"1"`, `"2"`, ...)
    pub fn allocate_next(
        &self,
        size: usize,
    ) -> MemoryResult<(BlockId, usize)> {
        let mut heap = self.heap.lock();
        let allocation = heap.allocate_next(size)?;
        debug_check(&heap);
        Ok(allocation)
    }

    /// Free the block `id`; its payload is discarded
    ///
    /// # Errors
    /// `NotFound` if `id` is not live.
    pub fn free(
        &self,
        id: &str,
    ) -> MemoryResult<()> {
        let mut heap = self.heap.lock();
        heap.free(id)?;
        debug_check(&heap);
        Ok(())
    }

    /// Write `bytes` into block `id` starting at `offset`
    ///
    /// # Errors
    /// - `NotFound` if `id` is not live
    /// - `OutOfBounds` if the write would end past the block's size
    pub fn write(
        &self,
        id: &str,
        offset: usize,
        bytes: impl AsRef<[u8]>,
    ) -> MemoryResult<()> {
        self.heap.lock().write(id, offset, bytes.as_ref())
    }

    /// Read `length` bytes of block `id` starting at `offset`
    ///
    /// # Errors
    /// - `NotFound` if `id` is not live
    /// - `OutOfBounds` if the range ends past the block's size or covers a
    ///   cell that was never written
    pub fn read(
        &self,
        id: &str,
        offset: usize,
        length: usize,
    ) -> MemoryResult<Vec<u8>> {
        self.heap.lock().read(id, offset, length)
    }

    /// Compact all blocks toward offset 0, keeping their order and payloads
    ///
    /// Leaves a single free run at the tail. Returns the number of blocks
    /// that moved; a second call in a row returns 0.
    pub fn defragment(&self) -> usize {
        let mut heap = self.heap.lock();
        let moved = heap.defragment();
        debug_check(&heap);
        moved
    }

    /// Whether `id` is live
    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.heap.lock().contains(id)
    }

    /// Bookkeeping of block `id`
    pub fn block(
        &self,
        id: &str,
    ) -> Option<BlockInfo> {
        self.heap.lock().block_info(id)
    }

    /// Bookkeeping of every live block, lowest start first
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.heap
            .lock()
            .blocks_by_start()
            .into_iter()
            .map(|(id, block)| block.info(id))
            .collect()
    }

    /// Usage counters
    pub fn stats(&self) -> MemoryStats {
        MemoryStats::of(&self.heap.lock())
    }

    /// Consistent copy of the cells, blocks and memory map
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot::of(&self.heap.lock())
    }

    /// Verify that the cell tags match the block table exactly
    pub fn check_invariants(&self) -> Result<(), String> {
        self.heap.lock().check_invariants()
    }
}

fn debug_check(heap: &Heap) {
    debug_assert_eq!(heap.check_invariants(), Ok(()));
}
