//! Heat-transfer laws and the per-cell phase-change state machine

pub mod conduction;
pub mod convection;
pub mod phase_change;
pub mod radiation;

pub use conduction::{combined_conductivity, ConductionManager};
pub use convection::ConvectionManager;
pub use phase_change::{apply_energy, heat_capacity, ApplyFault, ApplyParams, ThermalState};
pub use radiation::{combined_emissivity, view_factor, RadiationManager};

use crate::grid::registry::ObjectRegistry;
use crate::simulation::config::SimulationConfig;

/// One physical law applied over a partition of objects
///
/// Implementations are stateless. They read temperatures and the optimizer's link
/// lists, and only ever write through [`crate::grid::Cell::add_energy_delta`], so
/// disjoint partitions may run concurrently.
pub trait HeatTransfer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Accumulate this law's energy deltas for every cell of the objects at `partition`
    ///
    /// # Arguments
    ///
    /// * `registry` - Object set; indices in `partition` refer to its object list
    /// * `partition` - Object indices owned by the calling worker slot
    /// * `config` - Frame timestep, ambient conditions and coefficients
    fn transfer_heat(&self, registry: &ObjectRegistry, partition: &[usize], config: &SimulationConfig);
}

/// Managers in the order a frame runs them
pub fn transfer_managers() -> [&'static dyn HeatTransfer; 3] {
    [&ConductionManager, &ConvectionManager, &RadiationManager]
}

/// Faces of a square cell not touching any neighbor
#[inline]
pub(crate) fn exposed_faces(adjacent: usize) -> f64 {
    4usize.saturating_sub(adjacent) as f64
}
