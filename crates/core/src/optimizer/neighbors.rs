//! Neighbors pass: 4-connected contact between cells
//!
//! Inside an object every cell links its grid neighbors. Across objects only
//! external cells are considered; a touching pair is linked both ways into the
//! adjacency and radiation lists. Cross-partition writes are safe because
//! linking deduplicates under the target cell's `links` lock.

use crate::core_types::point::grid_key;
use crate::grid::cell::CellRef;
use crate::grid::object::CompositeObject;
use crate::optimizer::progress::SlotProgress;
use crate::optimizer::{OptimizerPass, PassContext};

/// Grid offsets of the four edge neighbors
const EDGE_NEIGHBORS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Copy, Default)]
pub struct NeighborsOptimizer;

impl NeighborsOptimizer {
    fn link_interior(object_index: usize, object: &CompositeObject) {
        let (width, height) = object.size();
        for j in 0..height {
            for i in 0..width {
                let Some(cell) = object.cell_at(i, j) else { continue };
                let neighbors = [
                    i.checked_add(1).map(|x| (x, j)),
                    i.checked_sub(1).map(|x| (x, j)),
                    j.checked_add(1).map(|y| (i, y)),
                    j.checked_sub(1).map(|y| (i, y)),
                ];
                for (x, y) in neighbors.into_iter().flatten() {
                    if let Some(other) = object.cell_index(x, y) {
                        cell.link_adjacent(CellRef::new(object_index, other));
                    }
                }
            }
        }
    }

    /// Whether any cell of `a` could touch a cell of `b`
    fn boxes_meet(a: &CompositeObject, b: &CompositeObject) -> bool {
        let (a_min, a_max) = a.visible_area();
        let (b_min, b_max) = b.visible_area();
        a_min.x <= b_max.x && b_min.x <= a_max.x && a_min.y <= b_max.y && b_min.y <= a_max.y
    }

    fn link_contacts(ctx: &PassContext<'_>, index: usize, object: &CompositeObject) {
        for (other_index, other) in ctx.registry.objects().iter().enumerate() {
            if other_index == index || !Self::boxes_meet(object, other) {
                continue;
            }
            let Some(external) = ctx.external.get(other_index) else {
                continue;
            };
            for &cell_index in object.external_indices() {
                let cell = &object.cells()[cell_index];
                let (x, y) = grid_key(&cell.position());
                for (dx, dy) in EDGE_NEIGHBORS {
                    let Some(&other_cell) = external.get(&(x + dx, y + dy)) else {
                        continue;
                    };
                    let here = CellRef::new(index, cell_index);
                    let there = CellRef::new(other_index, other_cell);
                    let Some(partner) = ctx.registry.cell(there) else {
                        continue;
                    };
                    cell.link_adjacent(there);
                    cell.link_radiation(there);
                    partner.link_adjacent(here);
                    partner.link_radiation(here);
                }
            }
        }
    }
}

impl OptimizerPass for NeighborsOptimizer {
    fn name(&self) -> &'static str {
        "neighbors"
    }

    fn run(&self, ctx: &PassContext<'_>, partition: &[usize], progress: SlotProgress<'_>) {
        for (done, &index) in partition.iter().enumerate() {
            if let Some(object) = ctx.registry.objects().get(index) {
                Self::link_interior(index, object);
                Self::link_contacts(ctx, index, object);
            }
            progress.update(done + 1, partition.len());
        }
    }
}
