//! Optimizer pipeline: precompute which cells exchange heat
//!
//! Three passes run in order, each over every partition before the next starts:
//! 1. [`ClearingOptimizer`] empties all link lists.
//! 2. [`NeighborsOptimizer`] links 4-connected contacts (adjacency + radiation).
//! 3. [`RadiationOptimizer`] adds line-of-sight radiation partners.
//!
//! The pipeline runs when a simulation starts from Stopped, or resumes with a
//! dirty topology. Link lists are then read-only for the whole run.

pub mod clearing;
pub mod neighbors;
pub mod progress;
pub mod radiation;

pub use clearing::ClearingOptimizer;
pub use neighbors::NeighborsOptimizer;
pub use progress::{OptimizerProgress, SlotProgress};
pub use radiation::{RadiationOptimizer, RAY_DIRECTIONS};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::time::Instant;

use crate::core_types::point::grid_key;
use crate::grid::cell::CellRef;
use crate::grid::registry::ObjectRegistry;
use crate::simulation::config::SimulationConfig;

/// Read-only lookups shared by every pass of one pipeline run
#[derive(Debug)]
pub struct PassContext<'a> {
    pub registry: &'a ObjectRegistry,
    pub config: &'a SimulationConfig,
    /// Per object: grid position of each external cell -> cell index
    pub external: Vec<FxHashMap<(i64, i64), usize>>,
    /// Every cell by grid position. Overlapping objects keep the later one.
    pub occupancy: FxHashMap<(i64, i64), CellRef>,
}

impl<'a> PassContext<'a> {
    pub fn new(registry: &'a ObjectRegistry, config: &'a SimulationConfig) -> Self {
        let external = registry
            .objects()
            .par_iter()
            .map(|object| {
                object
                    .external_indices()
                    .iter()
                    .map(|&i| (grid_key(&object.cells()[i].position()), i))
                    .collect()
            })
            .collect();

        let mut occupancy = FxHashMap::default();
        occupancy.reserve(registry.cell_count());
        for (object_index, object) in registry.objects().iter().enumerate() {
            for (cell_index, cell) in object.cells().iter().enumerate() {
                occupancy.insert(
                    grid_key(&cell.position()),
                    CellRef::new(object_index, cell_index),
                );
            }
        }

        Self {
            registry,
            config,
            external,
            occupancy,
        }
    }
}

/// One optimizer pass over a partition of objects
pub trait OptimizerPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Process the objects at `partition`, reporting progress as objects finish
    fn run(&self, ctx: &PassContext<'_>, partition: &[usize], progress: SlotProgress<'_>);
}

/// Passes in pipeline order
pub fn optimizer_passes() -> [&'static dyn OptimizerPass; 3] {
    [&ClearingOptimizer, &NeighborsOptimizer, &RadiationOptimizer]
}

/// Link totals after a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizerReport {
    pub adjacent_links: usize,
    pub radiation_links: usize,
}

impl OptimizerReport {
    fn collect(registry: &ObjectRegistry) -> Self {
        registry
            .objects()
            .par_iter()
            .flat_map_iter(|o| o.cells().iter())
            .map(|cell| {
                let links = cell.links();
                OptimizerReport {
                    adjacent_links: links.adjacent.len(),
                    radiation_links: links.radiation.len(),
                }
            })
            .reduce(OptimizerReport::default, |a, b| OptimizerReport {
                adjacent_links: a.adjacent_links + b.adjacent_links,
                radiation_links: a.radiation_links + b.radiation_links,
            })
    }
}

/// Run the full pipeline over `partitions`
///
/// Call inside the engine's worker pool (`ThreadPool::install`) so passes fan out
/// over its threads. Each pass is joined before the next starts; `progress`
/// ends at 100 for every slot.
pub fn optimize(
    registry: &ObjectRegistry,
    partitions: &[Vec<usize>],
    config: &SimulationConfig,
    progress: &OptimizerProgress,
) -> OptimizerReport {
    let started = Instant::now();
    progress.reset(partitions.len());
    let ctx = PassContext::new(registry, config);
    let passes = optimizer_passes();

    for (pass_index, pass) in passes.iter().enumerate() {
        partitions
            .par_iter()
            .enumerate()
            .for_each(|(slot, partition)| {
                pass.run(&ctx, partition, progress.slot(slot, pass_index, passes.len()));
            });
        tracing::debug!(pass = pass.name(), "Optimizer pass complete");
    }
    progress.finish();

    let report = OptimizerReport::collect(registry);
    tracing::info!(
        objects = registry.len(),
        adjacent_links = report.adjacent_links,
        radiation_links = report.radiation_links,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Optimizer finished"
    );
    report
}
