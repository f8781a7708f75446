//! Allocation engine
//!
//! [`Heap`] pairs the address space with the block table and implements
//! first-fit allocation, freeing, payload access and compaction. It is not
//! synchronized; [`MemoryManager`](super::MemoryManager) puts it behind a lock.
//!
//! Every operation validates before it mutates, so a failed call leaves both
//! structures untouched.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::address_space::{AddressSpace, Cell};
use super::block::{Block, BlockId, BlockInfo};
use super::error::{MemoryError, MemoryResult};

/// Address space plus block table
#[derive(Debug)]
pub(crate) struct Heap {
    space: AddressSpace,
    blocks: HashMap<BlockId, Block>,
    /// Next number handed out by `allocate_next`
    next_id: u64,
}

impl Heap {
    /// Create a heap of `capacity` free cells
    pub(crate) fn new(capacity: usize) -> MemoryResult<Self> {
        if capacity == 0 {
            return Err(MemoryError::InvalidArgument(
                "memory size must be positive".to_string(),
            ));
        }
        Ok(Self {
            space: AddressSpace::new(capacity),
            blocks: HashMap::new(),
            next_id: 1,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.space.len()
    }

    pub(crate) fn space(&self) -> &AddressSpace {
        &self.space
    }

    pub(crate) fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.blocks.contains_key(id)
    }

    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Allocate `size` cells for `id` at the first free run that fits
    pub(crate) fn allocate(
        &mut self,
        id: BlockId,
        size: usize,
    ) -> MemoryResult<usize> {
        if size == 0 {
            return Err(MemoryError::InvalidArgument(format!(
                "allocation size for block {} must be positive",
                id
            )));
        }
        if self.blocks.contains_key(&id) {
            return Err(MemoryError::InvalidArgument(format!(
                "block {} is already allocated",
                id
            )));
        }

        let start = self.space.first_fit(size).ok_or_else(|| {
            let err = MemoryError::InsufficientMemory {
                requested: size,
                largest_free: self.space.largest_free_run(),
                total_free: self.space.free_cells(),
            };
            debug!(id = %id, size, "{}", err);
            err
        })?;

        self.space.mark(start..start + size, Cell::Occupied);
        debug!(id = %id, start, size, "allocated block");
        self.blocks.insert(id, Block::new(start, size));
        Ok(start)
    }

    /// Allocate under the next free numeric id
    pub(crate) fn allocate_next(
        &mut self,
        size: usize,
    ) -> MemoryResult<(BlockId, usize)> {
        let mut number = self.next_id;
        while self.blocks.contains_key(number.to_string().as_str()) {
            number += 1;
        }
        let id = BlockId::from(number);
        let start = self.allocate(id.clone(), size)?;
        self.next_id = number + 1;
        Ok((id, start))
    }

    /// Release the block and its cells
    pub(crate) fn free(
        &mut self,
        id: &str,
    ) -> MemoryResult<()> {
        let block = self
            .blocks
            .remove(id)
            .ok_or_else(|| MemoryError::not_found(id))?;
        self.space.mark(block.range(), Cell::Free);
        debug!(id, start = block.start, size = block.size, "freed block");
        Ok(())
    }

    /// Write `bytes` into the payload of `id` at `offset`
    pub(crate) fn write(
        &mut self,
        id: &str,
        offset: usize,
        bytes: &[u8],
    ) -> MemoryResult<()> {
        let block = self
            .blocks
            .get_mut(id)
            .ok_or_else(|| MemoryError::not_found(id))?;
        if !block.fits(offset, bytes.len()) {
            return Err(MemoryError::OutOfBounds {
                id: id.into(),
                offset,
                length: bytes.len(),
                size: block.size,
                written: block.written(),
            });
        }
        block.store(offset, bytes);
        trace!(id, offset, len = bytes.len(), "wrote payload");
        Ok(())
    }

    /// Copy `length` payload bytes of `id` starting at `offset`
    pub(crate) fn read(
        &self,
        id: &str,
        offset: usize,
        length: usize,
    ) -> MemoryResult<Vec<u8>> {
        let block = self
            .blocks
            .get(id)
            .ok_or_else(|| MemoryError::not_found(id))?;
        let out_of_bounds = || MemoryError::OutOfBounds {
            id: id.into(),
            offset,
            length,
            size: block.size,
            written: block.written(),
        };
        if !block.fits(offset, length) {
            return Err(out_of_bounds());
        }
        block.load(offset, length).ok_or_else(out_of_bounds)
    }

    /// Slide every block toward offset 0, keeping their order.
    ///
    /// Returns how many blocks changed position.
    pub(crate) fn defragment(&mut self) -> usize {
        let mut order: Vec<&mut Block> = self.blocks.values_mut().collect();
        order.sort_unstable_by_key(|block| block.start);

        self.space.clear();
        let mut cursor = 0;
        let mut moved = 0;
        for block in order {
            if block.start != cursor {
                trace!(from = block.start, to = cursor, size = block.size, "relocating block");
                block.start = cursor;
                moved += 1;
            }
            self.space.mark(block.range(), Cell::Occupied);
            cursor += block.size;
        }

        debug!(moved, used = cursor, "defragmented memory");
        moved
    }

    pub(crate) fn block_info(
        &self,
        id: &str,
    ) -> Option<BlockInfo> {
        self.blocks
            .get_key_value(id)
            .map(|(id, block)| block.info(id))
    }

    /// Live blocks, lowest start first
    pub(crate) fn blocks_by_start(&self) -> Vec<(&BlockId, &Block)> {
        let mut blocks: Vec<_> = self.blocks.iter().collect();
        blocks.sort_unstable_by_key(|(_, block)| block.start);
        blocks
    }

    /// Check that the cell tags match the block table exactly
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let mut expected = vec![Cell::Free; self.capacity()];
        let mut prev_end = 0;
        let mut prev_id: Option<&BlockId> = None;

        for (id, block) in self.blocks_by_start() {
            if block.size == 0 {
                return Err(format!("block {} has zero size", id));
            }
            if block.start + block.size > self.capacity() {
                return Err(format!(
                    "block {} spans {:?}, past the end of memory ({})",
                    id,
                    block.range(),
                    self.capacity()
                ));
            }
            if block.written() > block.size {
                return Err(format!(
                    "block {} holds {} bytes but has size {}",
                    id,
                    block.written(),
                    block.size
                ));
            }
            if let Some(prev) = prev_id {
                if block.start < prev_end {
                    return Err(format!("blocks {} and {} overlap", prev, id));
                }
            }
            expected[block.range()].fill(Cell::Occupied);
            prev_end = block.start + block.size;
            prev_id = Some(id);
        }

        match expected
            .iter()
            .zip(self.space.cells())
            .position(|(want, got)| want != got)
        {
            Some(cell) => Err(format!(
                "cell {} is tagged {:?} but the block table says {:?}",
                cell,
                self.space.cells()[cell],
                expected[cell]
            )),
            None => Ok(()),
        }
    }
}
