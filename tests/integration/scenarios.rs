//! End-to-end allocation scenarios

use memsim::memory::{ErrorKind, MemoryError, MemoryManager};

#[test]
fn test_fragmentation_then_defragment() {
    let memory = MemoryManager::new(10).unwrap();
    assert_eq!(memory.allocate("a", 4), Ok(0));
    assert_eq!(memory.allocate("b", 3), Ok(4));

    memory.free("a").unwrap();
    assert_eq!(memory.snapshot().to_string(), "----XXX---");

    let err = memory.allocate("c", 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientMemory);
    assert!(err.is_fragmentation());

    memory.defragment();
    assert_eq!(memory.block("b").unwrap().start, 0);
    assert_eq!(memory.allocate("c", 5), Ok(3));
    assert_eq!(memory.snapshot().to_string(), "XXXXXXXX--");
}

#[test]
fn test_write_read_and_bounds() {
    let memory = MemoryManager::new(10).unwrap();
    memory.allocate("a", 4).unwrap();
    memory.allocate("b", 3).unwrap();

    memory.write("b", 1, "xy").unwrap();
    assert_eq!(memory.read("b", 1, 2).unwrap(), b"xy");

    let err = memory.read("b", 0, 4).unwrap_err();
    assert!(matches!(err, MemoryError::OutOfBounds { size: 3, .. }));
}

#[test]
fn test_invalid_arguments() {
    let memory = MemoryManager::new(10).unwrap();
    assert_eq!(
        memory.allocate("x", 0).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    memory.allocate("x", 5).unwrap();
    assert_eq!(
        memory.allocate("x", 5).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
}

#[test]
fn test_data_survives_relocation() {
    let memory = MemoryManager::new(12).unwrap();
    memory.allocate("gap1", 2).unwrap();
    memory.allocate("p", 3).unwrap();
    memory.allocate("gap2", 4).unwrap();
    memory.allocate("q", 3).unwrap();
    memory.write("p", 0, "abc").unwrap();
    memory.write("q", 1, "yz").unwrap();

    memory.free("gap1").unwrap();
    memory.free("gap2").unwrap();
    assert_eq!(memory.defragment(), 2);

    assert_eq!(memory.block("p").unwrap().start, 0);
    assert_eq!(memory.block("q").unwrap().start, 3);
    assert_eq!(memory.read("p", 0, 3).unwrap(), b"abc");
    assert_eq!(memory.read("q", 1, 2).unwrap(), b"yz");
    assert_eq!(memory.snapshot().to_string(), "abcXyz------");
}

#[test]
fn test_freed_data_not_visible_to_new_block() {
    let memory = MemoryManager::new(4).unwrap();
    memory.allocate("old", 4).unwrap();
    memory.write("old", 0, "secr").unwrap();
    memory.free("old").unwrap();

    memory.allocate("new", 4).unwrap();
    assert_eq!(memory.block("new").unwrap().written, 0);
    for offset in 0..4 {
        assert_eq!(
            memory.read("new", offset, 1).unwrap_err().kind(),
            ErrorKind::OutOfBounds
        );
    }
    assert_eq!(memory.snapshot().to_string(), "XXXX");
}

#[test]
fn test_demo_walkthrough() {
    let memory = MemoryManager::new(5).unwrap();
    let log = memsim::demo(&memory).unwrap();
    assert_eq!(
        log,
        vec![
            "Initial memory: -----",
            "Allocated blocks 1, 2, 3, 4, 5: XXXXX",
            "Freed blocks 2 and 4: X-X-X",
            "Allocation failed: Insufficient contiguous memory: requested 2, largest free run 1, total free 2",
            "Defragmented (2 block(s) moved): XXX--",
            "Allocated block 6: XXXXX",
            "Wrote to block 1: AXXXX",
            "Read from block 1: A",
        ]
    );
}
