//! Point-in-time views of the memory
//!
//! Snapshots are plain copies taken inside one critical section, so they are
//! always internally consistent and can be inspected without holding the lock.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::address_space::Cell;
use super::block::BlockInfo;
use super::heap::Heap;

/// Marker for a free cell in the rendered memory map
pub const FREE_MARK: char = '-';
/// Marker for an occupied cell whose payload is unwritten or unprintable
pub const OCCUPIED_MARK: char = 'X';

/// Usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Total number of cells
    pub capacity: usize,
    /// Occupied cells
    pub used: usize,
    /// Free cells
    pub free: usize,
    /// Length of the longest free run
    pub largest_free_run: usize,
    /// Number of maximal free runs
    pub free_runs: usize,
    /// Live blocks
    pub blocks: usize,
}

impl MemoryStats {
    /// Share of free cells outside the largest free run (0.0 to 1.0)
    pub fn fragmentation(&self) -> f64 {
        if self.free == 0 {
            0.0
        } else {
            1.0 - self.largest_free_run as f64 / self.free as f64
        }
    }

    pub(crate) fn of(heap: &Heap) -> Self {
        let space = heap.space();
        let free = space.free_cells();
        Self {
            capacity: space.len(),
            used: space.len() - free,
            free,
            largest_free_run: space.largest_free_run(),
            free_runs: space.free_runs().count(),
            blocks: heap.block_count(),
        }
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "capacity={} used={} free={} largest_free_run={} free_runs={} blocks={} fragmentation={:.2}",
            self.capacity,
            self.used,
            self.free,
            self.largest_free_run,
            self.free_runs,
            self.blocks,
            self.fragmentation()
        )
    }
}

/// Copy of the whole memory state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Cell tags, in address order
    pub cells: Vec<Cell>,
    /// Live blocks, lowest start first
    pub blocks: Vec<BlockInfo>,
    /// Memory map, one char per cell
    pub map: String,
    /// Usage counters
    pub stats: MemoryStats,
}

impl MemorySnapshot {
    pub(crate) fn of(heap: &Heap) -> Self {
        let cells = heap.space().cells().to_vec();
        let mut map: Vec<char> = cells
            .iter()
            .map(|cell| match cell {
                Cell::Free => FREE_MARK,
                Cell::Occupied => OCCUPIED_MARK,
            })
            .collect();

        let mut blocks = Vec::with_capacity(heap.block_count());
        for (id, block) in heap.blocks_by_start() {
            for (offset, slot) in map[block.range()].iter_mut().enumerate() {
                if let Some(byte) = block.byte_at(offset).filter(u8::is_ascii_graphic) {
                    *slot = byte as char;
                }
            }
            blocks.push(block.info(id));
        }

        Self {
            cells,
            blocks,
            map: map.into_iter().collect(),
            stats: MemoryStats::of(heap),
        }
    }

    /// Block occupying `cell`, if any
    pub fn owner_of(
        &self,
        cell: usize,
    ) -> Option<&BlockInfo> {
        self.blocks
            .iter()
            .find(|block| block.start <= cell && cell < block.end())
    }
}

impl fmt::Display for MemorySnapshot {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.map)
    }
}
