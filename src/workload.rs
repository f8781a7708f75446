//! Randomized allocation workloads
//!
//! Drives a [`MemoryManager`] with a seeded mix of allocations, frees, writes
//! and reads, and reports how often fragmentation got in the way. Used by the
//! `stress` command and the benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::memory::{BlockId, MemoryManager, MemoryStats};

/// Workload parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// RNG seed; the same seed replays the same operations
    pub seed: u64,
    /// Number of operations to issue
    pub operations: usize,
    /// Largest block size requested
    pub max_block: usize,
    /// Defragment and retry once when an allocation fails to fragmentation
    pub defragment_on_failure: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 1000,
            max_block: 8,
            defragment_on_failure: true,
        }
    }
}

/// Counters collected while running a workload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkloadReport {
    pub allocations: usize,
    pub failed_allocations: usize,
    /// Failures where the total free space would have been enough
    pub fragmented_failures: usize,
    /// Allocations that only succeeded after defragmenting
    pub rescued_allocations: usize,
    pub defragmentations: usize,
    pub frees: usize,
    pub writes: usize,
    pub reads: usize,
    pub final_stats: Option<MemoryStats>,
}

struct Live {
    id: BlockId,
    size: usize,
    written: usize,
}

/// Run the workload against `memory`
///
/// Ids issued by the workload are prefixed with `w`, so they do not collide
/// with the numeric ids of `allocate_next`.
pub fn run_workload(
    memory: &MemoryManager,
    config: &WorkloadConfig,
) -> WorkloadReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut report = WorkloadReport::default();
    let mut live: Vec<Live> = Vec::new();
    let max_block = config.max_block.max(1);

    for step in 0..config.operations {
        let roll = rng.random_range(0..100);
        if roll < 45 || live.is_empty() {
            let size = rng.random_range(1..=max_block);
            let id = BlockId::new(format!("w{}", step));
            if allocate(memory, config, &mut report, &id, size) {
                live.push(Live { id, size, written: 0 });
            } else {
                report.failed_allocations += 1;
            }
        } else if roll < 75 {
            let victim = live.swap_remove(rng.random_range(0..live.len()));
            if memory.free(victim.id.as_str()).is_ok() {
                report.frees += 1;
            }
        } else if roll < 90 {
            let index = rng.random_range(0..live.len());
            let block = &mut live[index];
            let len = rng.random_range(1..=block.size);
            let payload: Vec<u8> = (0..len).map(|_| rng.random_range(b'a'..=b'z')).collect();
            if memory.write(block.id.as_str(), 0, &payload).is_ok() {
                block.written = block.written.max(len);
                report.writes += 1;
            }
        } else {
            let block = &live[rng.random_range(0..live.len())];
            if block.written > 0 && memory.read(block.id.as_str(), 0, block.written).is_ok() {
                report.reads += 1;
            }
        }
    }

    let stats = memory.stats();
    info!(
        allocations = report.allocations,
        failed = report.failed_allocations,
        defragmentations = report.defragmentations,
        "workload finished: {}",
        stats
    );
    report.final_stats = Some(stats);
    report
}

fn allocate(
    memory: &MemoryManager,
    config: &WorkloadConfig,
    report: &mut WorkloadReport,
    id: &BlockId,
    size: usize,
) -> bool {
    let err = match memory.allocate(id.clone(), size) {
        Ok(_) => {
            report.allocations += 1;
            return true;
        }
        Err(err) => err,
    };

    if !err.is_fragmentation() {
        return false;
    }
    report.fragmented_failures += 1;
    if !config.defragment_on_failure {
        return false;
    }

    memory.defragment();
    report.defragmentations += 1;
    debug!(id = %id, size, "retrying allocation after defragmenting");
    if memory.allocate(id.clone(), size).is_ok() {
        report.allocations += 1;
        report.rescued_allocations += 1;
        true
    } else {
        false
    }
}
