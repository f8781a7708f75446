//! memsim - simulated memory allocator
//!
//! A fixed-size, cell-addressed memory region with first-fit allocation,
//! per-block payloads and compaction. Nothing here touches real process
//! memory; it is a harness for studying allocation and fragmentation.
//!
//! # Example
//!
//! ```
//! use memsim::memory::MemoryManager;
//!
//! let memory = MemoryManager::new(10).unwrap();
//! memory.allocate("b", 3).unwrap();
//! memory.write("b", 1, "xy").unwrap();
//! assert_eq!(memory.read("b", 1, 2).unwrap(), b"xy");
//! ```

#![doc(html_root_url = "https://docs.rs/memsim")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod memory;
pub mod repl;
pub mod script;
pub mod workload;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use memory::{BlockId, ErrorKind, MemoryError, MemoryManager, MemoryResult};

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::script::Script;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name
pub const NAME: &str = "memsim";

/// Run a command script against `memory`, collecting every output line
///
/// # Example
///
/// ```
/// use memsim::{run, MemoryManager, Result};
///
/// fn main() -> Result<()> {
///     let memory = MemoryManager::new(10)?;
///     let out = run(&memory, "alloc a 4\nalloc b 3\nshow")?;
///     assert_eq!(out.last().unwrap(), "XXXXXXX---");
///     Ok(())
/// }
/// ```
pub fn run(
    memory: &MemoryManager,
    source: &str,
) -> Result<Vec<String>> {
    let script = Script::parse(source)?;
    debug!(commands = script.len(), "running script");
    let mut outputs = Vec::with_capacity(script.len());
    script.execute(memory, |line| outputs.push(line))?;
    Ok(outputs)
}

/// Run a command script file against `memory`
pub fn run_file(
    memory: &MemoryManager,
    path: &Path,
) -> Result<Vec<String>> {
    debug!(path = %path.display(), "reading script");
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    run(memory, &source)
}

/// Replay the classic fragmentation walkthrough on a 5-cell memory
///
/// Five one-cell blocks, free the 2nd and 4th, fail a two-cell request,
/// defragment, retry, then write and read one byte. Each step's memory map
/// is reported.
pub fn demo(memory: &MemoryManager) -> Result<Vec<String>> {
    let mut log = Vec::new();
    log.push(format!("Initial memory: {}", memory.snapshot()));

    let mut ids = Vec::new();
    for _ in 0..5 {
        let (id, _) = memory.allocate_next(1)?;
        ids.push(id);
    }
    log.push(format!(
        "Allocated blocks {}: {}",
        ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", "),
        memory.snapshot()
    ));

    memory.free(ids[1].as_str())?;
    memory.free(ids[3].as_str())?;
    log.push(format!(
        "Freed blocks {} and {}: {}",
        ids[1],
        ids[3],
        memory.snapshot()
    ));

    let id = match memory.allocate_next(2) {
        Ok((id, _)) => id,
        Err(err) => {
            log.push(format!("Allocation failed: {}", err));
            let moved = memory.defragment();
            log.push(format!(
                "Defragmented ({} block(s) moved): {}",
                moved,
                memory.snapshot()
            ));
            memory.allocate_next(2)?.0
        }
    };
    log.push(format!("Allocated block {}: {}", id, memory.snapshot()));

    memory.write(ids[0].as_str(), 0, "A")?;
    log.push(format!("Wrote to block {}: {}", ids[0], memory.snapshot()));
    let data = memory.read(ids[0].as_str(), 0, 1)?;
    log.push(format!(
        "Read from block {}: {}",
        ids[0],
        String::from_utf8_lossy(&data)
    ));

    Ok(log)
}
