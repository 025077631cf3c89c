//! Clearing pass: drop every link before the graph is rebuilt

use crate::optimizer::progress::SlotProgress;
use crate::optimizer::{OptimizerPass, PassContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct ClearingOptimizer;

impl OptimizerPass for ClearingOptimizer {
    fn name(&self) -> &'static str {
        "clearing"
    }

    fn run(&self, ctx: &PassContext<'_>, partition: &[usize], progress: SlotProgress<'_>) {
        for (done, &index) in partition.iter().enumerate() {
            if let Some(object) = ctx.registry.objects().get(index) {
                for cell in object.cells() {
                    cell.clear_optimization_squares();
                }
            }
            progress.update(done + 1, partition.len());
        }
    }
}
