//! Address space of the simulated region
//!
//! A fixed-length row of cells, each either free or occupied. The address
//! space only knows tags; which block owns a cell is the block table's
//! business.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Tag of a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Free,
    Occupied,
}

/// Fixed-length sequence of cells
#[derive(Debug, Clone)]
pub(crate) struct AddressSpace {
    cells: Vec<Cell>,
}

impl AddressSpace {
    /// Create an address space of `len` free cells
    pub(crate) fn new(len: usize) -> Self {
        Self {
            cells: vec![Cell::Free; len],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Tag every cell in `range`
    pub(crate) fn mark(
        &mut self,
        range: Range<usize>,
        cell: Cell,
    ) {
        self.cells[range].fill(cell);
    }

    /// Tag every cell free
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::Free);
    }

    /// Maximal runs of free cells, lowest start first
    pub(crate) fn free_runs(&self) -> FreeRuns<'_> {
        FreeRuns {
            cells: &self.cells,
            pos: 0,
        }
    }

    /// Start of the first maximal free run holding at least `size` cells
    pub(crate) fn first_fit(
        &self,
        size: usize,
    ) -> Option<usize> {
        self.free_runs()
            .find(|run| run.len() >= size)
            .map(|run| run.start)
    }

    /// Length of the longest free run
    pub(crate) fn largest_free_run(&self) -> usize {
        self.free_runs().map(|run| run.len()).max().unwrap_or(0)
    }

    /// Number of free cells
    pub(crate) fn free_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Cell::Free).count()
    }
}

/// Iterator over maximal free runs
pub(crate) struct FreeRuns<'a> {
    cells: &'a [Cell],
    pos: usize,
}

impl Iterator for FreeRuns<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.cells.len();
        while self.pos < len && self.cells[self.pos] == Cell::Occupied {
            self.pos += 1;
        }
        if self.pos == len {
            return None;
        }
        let start = self.pos;
        while self.pos < len && self.cells[self.pos] == Cell::Free {
            self.pos += 1;
        }
        Some(start..self.pos)
    }
}
