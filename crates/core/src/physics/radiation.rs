//! Radiative exchange between visible cells and to ambient air
//!
//! Stefan-Boltzmann with a combined emissivity and an inverse-distance view factor:
//! ```text
//! e' = e1·e2 / (1/e1 + 1/e2 − 1)
//! F  = clamp(1 / d, 0, 1)
//! Q  = e'·σ·A·F·(T1⁴ − T2⁴)·Δt / 2
//! ```
//! Partners farther than `√2 × radiation_depth` cells are ignored. Only the
//! visiting cell's side is applied. Partner lists come from the radiation
//! optimizer and need not be symmetric.

use crate::core_types::units::Joules;
use crate::grid::registry::ObjectRegistry;
use crate::physics::{exposed_faces, HeatTransfer};
use crate::simulation::config::SimulationConfig;

/// Combined emissivity of two grey surfaces; zero if either is non-emissive
#[inline]
pub fn combined_emissivity(e1: f64, e2: f64) -> f64 {
    if e1 <= 0.0 || e2 <= 0.0 {
        return 0.0;
    }
    e1 * e2 / (1.0 / e1 + 1.0 / e2 - 1.0)
}

/// Inverse-distance view factor, in grid cells
#[inline]
pub fn view_factor(distance: f64) -> f64 {
    if distance <= 0.0 {
        return 1.0;
    }
    (1.0 / distance).clamp(0.0, 1.0)
}

/// Radiation manager
#[derive(Debug, Clone, Copy, Default)]
pub struct RadiationManager;

impl HeatTransfer for RadiationManager {
    fn name(&self) -> &'static str {
        "radiation"
    }

    fn transfer_heat(&self, registry: &ObjectRegistry, partition: &[usize], config: &SimulationConfig) {
        let dt = config.time_step();
        let area = config.cell_area();
        let sigma = config.stefan_boltzmann;
        let cutoff = config.radiation_cutoff();

        for object in partition.iter().filter_map(|&i| registry.objects().get(i)) {
            for cell in object.cells() {
                let own = cell.snapshot();
                let e1 = cell.material().emissivity(own.effective_phase());
                let t1_4 = own.temperature.powi(4);

                let links = cell.links();
                let mut lost = 0.0;
                for partner in links.radiation.iter().filter_map(|&r| registry.cell(r)) {
                    let distance = (cell.position() - partner.position()).norm();
                    if distance > cutoff {
                        continue;
                    }
                    let other = partner.snapshot();
                    let e2 = partner.material().emissivity(other.effective_phase());
                    let e = combined_emissivity(e1, e2);
                    lost += e
                        * sigma
                        * area
                        * view_factor(distance)
                        * (t1_4 - other.temperature.powi(4))
                        * dt
                        / 2.0;
                }
                let adjacent = links.adjacent.len();
                drop(links);

                if config.objects_lose_heat_to_air {
                    lost += e1
                        * sigma
                        * area
                        * (t1_4 - config.air_temperature.powi(4))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::material::Material;
    use crate::core_types::point::Point;
    use crate::core_types::units::Kelvin;
    use crate::grid::cell::CellRef;
    use crate::grid::object::CompositeObject;
    use std::sync::Arc;

    fn facing(distance: f64) -> ObjectRegistry {
        let iron = Arc::new(Material::iron());
        let mut registry = ObjectRegistry::new();
        registry
            .add_object(CompositeObject::grain_square(
                "Hot",
                Point::new(0.0, 0.0),
                Arc::clone(&iron),
                Kelvin::new(1000.0),
            ))
            .unwrap();
        registry
            .add_object(CompositeObject::grain_square(
                "Cold",
                Point::new(distance, 0.0),
                iron,
                Kelvin::new(300.0),
            ))
            .unwrap();
        registry.objects()[0].cells()[0].link_radiation(CellRef::new(1, 0));
        registry
    }

    #[test]
    fn test_combined_emissivity() {
        assert_eq!(combined_emissivity(0.0, 0.9), 0.0);
        // Both black bodies
        assert!((combined_emissivity(1.0, 1.0) - 1.0).abs() < 1e-12);
        let e = combined_emissivity(0.5, 0.5);
        assert!((e - 0.25 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_view_factor_clamped() {
        assert_eq!(view_factor(0.5), 1.0);
        assert_eq!(view_factor(1.0), 1.0);
        assert!((view_factor(4.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_one_directional_link_only_moves_origin() {
        let registry = facing(3.0);
        let config = SimulationConfig {
            objects_lose_heat_to_air: false,
            ..Default::default()
        };
        RadiationManager.transfer_heat(&registry, &[0, 1], &config);
        let hot = *registry.objects()[0].cells()[0].energy_delta();
        let cold = *registry.objects()[1].cells()[0].energy_delta();
        let e = combined_emissivity(0.3, 0.3);
        let expected = -e
            * config.stefan_boltzmann
            * 0.01
            * (1.0 / 3.0)
            * (1000.0_f64.powi(4) - 300.0_f64.powi(4))
            / 60.0
            / 2.0;
        assert!((hot - expected).abs() < 1e-9);
        assert_eq!(cold, 0.0);
    }

    #[test]
    fn test_partner_beyond_cutoff_ignored() {
        let registry = facing(20.0);
        let config = SimulationConfig {
            objects_lose_heat_to_air: false,
            radiation_depth: 10,
            ..Default::default()
        };
        RadiationManager.transfer_heat(&registry, &[0], &config);
        assert_eq!(*registry.objects()[0].cells()[0].energy_delta(), 0.0);
    }

    #[test]
    fn test_air_radiation_gated_by_flag() {
        let registry = facing(3.0);
        registry.objects()[0].cells()[0].clear_optimization_squares();
        let config = SimulationConfig::default();
        RadiationManager.transfer_heat(&registry, &[0], &config);
        let expected = -0.3
            * config.stefan_boltzmann
            * 0.01
            * (1000.0_f64.powi(4) - 293.15_f64.powi(4))
            / 60.0
            * 4.0;
        assert!((*registry.objects()[0].cells()[0].energy_delta() - expected).abs() < 1e-9);
    }
}
