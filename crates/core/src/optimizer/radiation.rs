//! Radiation pass: line-of-sight partners along eight rays
//!
//! From every external cell, walk each compass and diagonal direction one grid
//! step at a time up to `radiation_depth`. The first occupied position stops the
//! ray. If it belongs to another object it becomes a radiation partner of the
//! origin cell; the reverse link is not added.

use crate::core_types::point::grid_key;
use crate::grid::cell::CellRef;
use crate::optimizer::progress::SlotProgress;
use crate::optimizer::{OptimizerPass, PassContext};

/// Unit steps of the eight rays
pub const RAY_DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct RadiationOptimizer;

impl OptimizerPass for RadiationOptimizer {
    fn name(&self) -> &'static str {
        "radiation"
    }

    fn run(&self, ctx: &PassContext<'_>, partition: &[usize], progress: SlotProgress<'_>) {
        let depth = i64::from(ctx.config.radiation_depth);
        for (done, &index) in partition.iter().enumerate() {
            let Some(object) = ctx.registry.objects().get(index) else {
                continue;
            };
            for &cell_index in object.external_indices() {
                let cell = &object.cells()[cell_index];
                let (x, y) = grid_key(&cell.position());
                for (dx, dy) in RAY_DIRECTIONS {
                    let hit = (1..=depth)
                        .find_map(|k| ctx.occupancy.get(&(x + k * dx, y + k * dy)).copied());
                    if let Some(target) = hit.filter(|t: &CellRef| t.object as usize != index) {
                        cell.link_radiation(target);
                    }
                }
            }
            progress.update(done + 1, partition.len());
        }
    }
}
