//! Conduction between touching cells and to ambient air
//!
//! Discretized Fourier's law with a combined conductivity:
//! ```text
//! k' = 2·k1·k2 / (k1 + k2)
//! ΔQ = k' · (T1 − T2) · Δt
//! ```
//! Each cell subtracts only its own side of the exchange. Adjacency lists are
//! symmetric, so the partner computes and applies the opposite half when it is
//! visited.

use crate::core_types::units::Joules;
use crate::grid::registry::ObjectRegistry;
use crate::physics::{exposed_faces, HeatTransfer};
use crate::simulation::config::SimulationConfig;

/// Combined conductivity of two contacting materials; zero if either side is zero
#[inline]
pub fn combined_conductivity(k1: f64, k2: f64) -> f64 {
    if k1 <= 0.0 || k2 <= 0.0 {
        return 0.0;
    }
    2.0 * k1 * k2 / (k1 + k2)
}

/// Conduction manager
#[derive(Debug, Clone, Copy, Default)]
pub struct ConductionManager;

impl HeatTransfer for ConductionManager {
    fn name(&self) -> &'static str {
        "conduction"
    }

    fn transfer_heat(&self, registry: &ObjectRegistry, partition: &[usize], config: &SimulationConfig) {
        let dt = config.time_step();
        for object in partition.iter().filter_map(|&i| registry.objects().get(i)) {
            for cell in object.cells() {
                let own = cell.snapshot();
                let k1 = cell.material().thermal_conductivity(own.effective_phase());

                let links = cell.links();
                let mut lost = 0.0;
                for partner in links.adjacent.iter().filter_map(|&r| registry.cell(r)) {
                    let other = partner.snapshot();
                    let k2 = partner
                        .material()
                        .thermal_conductivity(other.effective_phase());
                    lost += combined_conductivity(k1, k2) * (own.temperature - other.temperature) * dt;
                }
                let adjacent = links.adjacent.len();
                drop(links);

                if config.objects_lose_heat_to_air {
                    let k_air = combined_conductivity(k1, config.air_thermal_conductivity);
                    lost += k_air
                        * (own.temperature - config.air_temperature)
                        * dt
                        * exposed_faces(adjacent);
                }

                if lost != 0.0 {
                    cell.add_energy_delta(Joules::new(-lost));
                }
            }
        }
    }
}
