//! Property tests for the memory manager using proptest
//!
//! Random operation sequences are replayed against the manager and a plain
//! model of the block payloads; first-fit placement is recomputed from the
//! previous snapshot.

use std::collections::HashMap;

use memsim::memory::{Cell, ErrorKind, MemoryManager};
use proptest::prelude::*;

const CAPACITY: usize = 24;

#[derive(Debug, Clone)]
enum Op {
    Alloc(u8, usize),
    Free(u8),
    Write(u8, usize, Vec<u8>),
    Read(u8, usize, usize),
    Defrag,
}

/// Strategy for generating single operations over a small id space
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, 0usize..9).prop_map(|(id, size)| Op::Alloc(id, size)),
        2 => (0u8..6).prop_map(Op::Free),
        3 => (0u8..6, 0usize..9, prop::collection::vec(any::<u8>(), 0..5))
            .prop_map(|(id, offset, bytes)| Op::Write(id, offset, bytes)),
        3 => (0u8..6, 0usize..9, 0usize..5)
            .prop_map(|(id, offset, len)| Op::Read(id, offset, len)),
        1 => Just(Op::Defrag),
    ]
}

/// First free run of at least `size` cells, computed from raw cell tags
fn expected_first_fit(
    cells: &[Cell],
    size: usize,
) -> Option<usize> {
    (0..cells.len()).find(|&start| {
        start + size <= cells.len()
            && cells[start..start + size].iter().all(|&c| c == Cell::Free)
            && (start == 0 || cells[start - 1] == Cell::Occupied)
    })
}

/// Payload model: size plus written cells
type Model = HashMap<String, (usize, Vec<Option<u8>>)>;

fn apply(
    memory: &MemoryManager,
    model: &mut Model,
    op: &Op,
) -> Result<(), TestCaseError> {
    match op {
        Op::Alloc(id, size) => {
            let id = id.to_string();
            let before = memory.snapshot();
            let result = memory.allocate(id.as_str(), *size);
            if *size == 0 || model.contains_key(&id) {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
            } else {
                match expected_first_fit(&before.cells, *size) {
                    Some(start) => {
                        prop_assert_eq!(result, Ok(start));
                        model.insert(id, (*size, Vec::new()));
                    }
                    None => {
                        prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::InsufficientMemory)
                    }
                }
            }
        }
        Op::Free(id) => {
            let id = id.to_string();
            let result = memory.free(&id);
            if model.remove(&id).is_some() {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
            }
        }
        Op::Write(id, offset, bytes) => {
            let id = id.to_string();
            let result = memory.write(&id, *offset, bytes);
            match model.get_mut(&id) {
                None => prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound),
                Some((size, _)) if offset + bytes.len() > *size => {
                    prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfBounds)
                }
                Some((_, data)) => {
                    prop_assert!(result.is_ok());
                    let end = offset + bytes.len();
                    if !bytes.is_empty() && data.len() < end {
                        data.resize(end, None);
                    }
                    for (i, &b) in bytes.iter().enumerate() {
                        data[offset + i] = Some(b);
                    }
                    // round trip
                    prop_assert_eq!(&memory.read(&id, *offset, bytes.len()).unwrap(), bytes);
                }
            }
        }
        Op::Read(id, offset, len) => {
            let id = id.to_string();
            let result = memory.read(&id, *offset, *len);
            match model.get(&id) {
                None => prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound),
                Some((size, _)) if offset + len > *size => {
                    prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfBounds)
                }
                Some((_, data)) => {
                    let expected: Option<Vec<u8>> = if *len == 0 {
                        Some(Vec::new())
                    } else {
                        data.get(*offset..offset + len)
                            .and_then(|cells| cells.iter().copied().collect())
                    };
                    match expected {
                        Some(bytes) => prop_assert_eq!(result, Ok(bytes)),
                        None => {
                            prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfBounds)
                        }
                    }
                }
            }
        }
        Op::Defrag => {
            let order: Vec<_> = memory.blocks().into_iter().map(|b| b.id).collect();
            memory.defragment();

            let after = memory.blocks();
            let mut cursor = 0;
            for (block, id) in after.iter().zip(&order) {
                prop_assert_eq!(&block.id, id);
                prop_assert_eq!(block.start, cursor);
                cursor += block.size;
            }
            prop_assert_eq!(memory.stats().free_runs, usize::from(cursor < CAPACITY));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_operations_match_model(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let memory = MemoryManager::new(CAPACITY).unwrap();
        let mut model = Model::new();
        for op in &ops {
            apply(&memory, &mut model, op)?;
            prop_assert_eq!(memory.check_invariants(), Ok(()));
            prop_assert_eq!(memory.blocks().len(), model.len());
        }
    }

    #[test]
    fn prop_defragment_is_idempotent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let memory = MemoryManager::new(CAPACITY).unwrap();
        let mut model = Model::new();
        for op in &ops {
            apply(&memory, &mut model, op)?;
        }
        memory.defragment();
        let first = memory.snapshot();
        prop_assert_eq!(memory.defragment(), 0);
        prop_assert_eq!(memory.snapshot(), first);
    }

    #[test]
    fn prop_largest_run_boundary(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let memory = MemoryManager::new(CAPACITY).unwrap();
        let mut model = Model::new();
        for op in &ops {
            apply(&memory, &mut model, op)?;
        }
        let stats = memory.stats();
        prop_assume!(stats.largest_free_run > 0);

        if stats.largest_free_run < stats.free {
            let err = memory.allocate("over-largest", stats.largest_free_run + 1).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InsufficientMemory);
            prop_assert!(err.is_fragmentation());
        }
        prop_assert!(memory.allocate("largest", stats.largest_free_run).is_ok());
    }
}
