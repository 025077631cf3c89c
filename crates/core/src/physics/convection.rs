//! Convection inside a fluid body
//!
//! Applies only between two phase-tracked cells of the same material sharing the
//! same non-solid phase. The per-pair transfer is clamped to
//! `max_convection_transfer` to keep the explicit scheme stable.

use crate::core_types::material::Phase;
use crate::core_types::units::Joules;
use crate::grid::registry::ObjectRegistry;
use crate::physics::HeatTransfer;
use crate::simulation::config::SimulationConfig;

/// Convection manager
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvectionManager;

impl ConvectionManager {
    fn coefficient(phase: Phase, config: &SimulationConfig) -> Option<f64> {
        match phase {
            Phase::Solid => None,
            Phase::Liquid => Some(config.liquid_convection_coefficient),
            Phase::Gas => Some(config.gas_convection_coefficient),
        }
    }
}

impl HeatTransfer for ConvectionManager {
    fn name(&self) -> &'static str {
        "convection"
    }

    fn transfer_heat(&self, registry: &ObjectRegistry, partition: &[usize], config: &SimulationConfig) {
        let dt = config.time_step();
        let cap = config.max_convection_transfer;
        for object in partition.iter().filter_map(|&i| registry.objects().get(i)) {
            for cell in object.cells() {
                let own = cell.snapshot();
                let Some(phase) = own.phase else { continue };
                let Some(h) = Self::coefficient(phase, config) else {
                    continue;
                };

                let mut lost = 0.0;
                for partner in cell
                    .links()
                    .adjacent
                    .iter()
                    .filter_map(|&r| registry.cell(r))
                {
                    if partner.material().name != cell.material().name {
                        continue;
                    }
                    let other = partner.snapshot();
                    if other.phase != Some(phase) {
                        continue;
                    }
                    lost += (h * (own.temperature - other.temperature) * dt).clamp(-cap, cap);
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

    fn linked(material: Material, tracked: bool, t1: f64, t2: f64) -> ObjectRegistry {
        let material = Arc::new(material);
        let mut registry = ObjectRegistry::new();
        let object = if tracked {
            CompositeObject::state_rectangle("Body", Point::new(0.0, 0.0), 2, 1, material, Kelvin::new(t1))
        } else {
            CompositeObject::rectangle("Body", Point::new(0.0, 0.0), 2, 1, material, Kelvin::new(t1))
        };
        registry.add_object(object).unwrap();
        let cells = registry.objects()[0].cells();
        cells[1].set_temperature(Kelvin::new(t2));
        cells[0].link_adjacent(CellRef::new(0, 1));
        cells[1].link_adjacent(CellRef::new(0, 0));
        registry
    }

    #[test]
    fn test_liquid_pair_exchanges() {
        let registry = linked(Material::water(), true, 310.0, 300.0);
        let config = SimulationConfig::default();
        ConvectionManager.transfer_heat(&registry, &[0], &config);
        let cells = registry.objects()[0].cells();
        let expected = -500.0 * 10.0 / 60.0;
        assert!((*cells[0].energy_delta() - expected).abs() < 1e-9);
        assert!((*cells[1].energy_delta() + expected).abs() < 1e-9);
    }

    #[test]
    fn test_transfer_is_clamped() {
        let registry = linked(Material::water(), true, 370.0, 280.0);
        let config = SimulationConfig {
            liquid_convection_coefficient: 1.0e6,
            ..Default::default()
        };
        ConvectionManager.transfer_heat(&registry, &[0], &config);
        assert_eq!(*registry.objects()[0].cells()[0].energy_delta(), -1000.0);
    }

    #[test]
    fn test_solid_and_untracked_cells_skip() {
        let ice = linked(Material::water(), true, 260.0, 250.0);
        let plain = linked(Material::water(), false, 310.0, 300.0);
        let config = SimulationConfig::default();
        ConvectionManager.transfer_heat(&ice, &[0], &config);
        ConvectionManager.transfer_heat(&plain, &[0], &config);
        assert_eq!(*ice.objects()[0].cells()[0].energy_delta(), 0.0);
        assert_eq!(*plain.objects()[0].cells()[0].energy_delta(), 0.0);
    }

    #[test]
    fn test_mixed_phase_pair_skips() {
        // 300 K liquid next to 380 K steam
        let registry = linked(Material::water(), true, 300.0, 380.0);
        ConvectionManager.transfer_heat(&registry, &[0], &SimulationConfig::default());
        assert_eq!(*registry.objects()[0].cells()[0].energy_delta(), 0.0);
    }
}
