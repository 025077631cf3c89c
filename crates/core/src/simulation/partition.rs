//! Worker-slot sizing and object partitioning

use crate::simulation::config::SimulationConfig;

/// Cores left free for the UI and the OS
const RESERVED_CORES: usize = 2;

/// `max(cores - 2, 1)`
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .saturating_sub(RESERVED_CORES)
        .max(1)
}

/// Worker slots for a run: the configured count or the default
pub fn worker_count(config: &SimulationConfig) -> usize {
    config
        .worker_threads
        .unwrap_or_else(default_worker_count)
        .max(1)
}

/// Deal object indices round-robin across `slots` partitions
///
/// Always returns exactly `slots` partitions (some may be empty) so per-slot
/// progress counters line up with worker slots.
pub fn round_robin(object_count: usize, slots: usize) -> Vec<Vec<usize>> {
    let slots = slots.max(1);
    let mut partitions = vec![Vec::with_capacity(object_count / slots + 1); slots];
    for index in 0..object_count {
        partitions[index % slots].push(index);
    }
    partitions
}
