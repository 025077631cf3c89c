//! End-to-end thermal behavior over small hand-built scenes

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use thedyx_core::core_types::material::Material;
use thedyx_core::optimizer::{optimize, OptimizerProgress};
use thedyx_core::physics::{heat_capacity, ConductionManager, HeatTransfer};
use thedyx_core::simulation::round_robin;
use thedyx_core::{
    CellRef, CompositeObject, Joules, Kelvin, ObjectRegistry, Phase, Point, RegistryError,
    SimulationConfig,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn conduction_only() -> SimulationConfig {
    SimulationConfig {
        objects_lose_heat_to_air: false,
        worker_threads: Some(2),
        ..Default::default()
    }
}

fn optimized(registry: &ObjectRegistry, config: &SimulationConfig) {
    let progress = OptimizerProgress::new();
    optimize(registry, &round_robin(registry.len(), 2), config, &progress);
    assert!(progress.is_complete());
}

fn two_cells(material: &Arc<Material>, t1: f64, t2: f64) -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();
    registry
        .add_object(CompositeObject::grain_square(
            "A",
            Point::new(0.0, 0.0),
            Arc::clone(material),
            Kelvin::new(t1),
        ))
        .unwrap();
    registry
        .add_object(CompositeObject::grain_square(
            "B",
            Point::new(1.0, 0.0),
            Arc::clone(material),
            Kelvin::new(t2),
        ))
        .unwrap();
    registry
}

#[test]
fn test_conduction_moves_both_cells_toward_each_other() {
    let copper = Arc::new(Material::copper());
    let registry = two_cells(&copper, 200.0, 0.0);
    let config = conduction_only();
    optimized(&registry, &config);

    ConductionManager.transfer_heat(&registry, &[0, 1], &config);
    registry
        .apply_energy_delta(&[0, 1], config.apply_params())
        .unwrap();

    let a = *registry.get("A").unwrap().cells()[0].temperature();
    let b = *registry.get("B").unwrap().cells()[0].temperature();
    assert!(a < 200.0);
    assert!(b > 0.0);
    assert!(a > b);

    let capacity = heat_capacity(&copper, Phase::Solid, config.cell_area());
    let expected_shift = 401.0 * 200.0 / 60.0 / capacity;
    assert_abs_diff_eq!(a, 200.0 - expected_shift, epsilon = 1e-9);
    assert_abs_diff_eq!(b, expected_shift, epsilon = 1e-9);
}

#[test]
fn test_conduction_deltas_cancel() {
    let iron = Arc::new(Material::iron());
    let registry = two_cells(&iron, 650.0, 280.0);
    let config = conduction_only();
    optimized(&registry, &config);

    ConductionManager.transfer_heat(&registry, &[0, 1], &config);
    let a = *registry.objects()[0].cells()[0].energy_delta();
    let b = *registry.objects()[1].cells()[0].energy_delta();
    assert!(a < 0.0);
    assert_abs_diff_eq!(a + b, 0.0, epsilon = 1e-9);
}

#[test]
fn test_latent_heat_pins_ice_at_melting_point() {
    let water = Arc::new(Material::water());
    let ice = CompositeObject::state_grain_square(
        "Ice",
        Point::new(0.0, 0.0),
        Arc::clone(&water),
        Kelvin::new(272.0),
    );
    let config = SimulationConfig::default();
    let cell = &ice.cells()[0];
    assert_eq!(cell.phase(), Some(Phase::Solid));

    cell.add_energy_delta(Joules::new(100_000.0));
    ice.apply_energy_delta(config.apply_params()).unwrap();
    assert_abs_diff_eq!(*cell.temperature(), 273.15, epsilon = 1e-9);
    assert_eq!(cell.phase(), Some(Phase::Solid));
    let banked = *cell.latent_energy();
    assert!(banked > 0.0);

    let threshold = water.melting_energy * config.cell_area() * water.density(Phase::Solid);
    cell.add_energy_delta(Joules::new(threshold - banked + 1_000.0));
    ice.apply_energy_delta(config.apply_params()).unwrap();
    assert_eq!(cell.phase(), Some(Phase::Liquid));
    assert!(*cell.temperature() > 273.15);
    assert_eq!(*cell.latent_energy(), 0.0);
}

#[test]
fn test_temperature_never_negative() {
    let mut rng = StdRng::seed_from_u64(0x7e44);
    let config = SimulationConfig::default();
    for material in [Material::water(), Material::lead(), Material::glass()] {
        let material = Arc::new(material);
        for tracked in [false, true] {
            let object = if tracked {
                CompositeObject::state_rectangle("Body", Point::new(0.0, 0.0), 3, 2, Arc::clone(&material), Kelvin::new(300.0))
            } else {
                CompositeObject::rectangle("Body", Point::new(0.0, 0.0), 3, 2, Arc::clone(&material), Kelvin::new(300.0))
            };
            for _ in 0..50 {
                for cell in object.cells() {
                    cell.add_energy_delta(Joules::new(-rng.random_range(1.0..1.0e12)));
                }
                object.apply_energy_delta(config.apply_params()).unwrap();
                for cell in object.cells() {
                    assert!(*cell.temperature() >= 0.0);
                    assert_eq!(*cell.energy_delta(), 0.0);
                }
            }
        }
    }
}

#[test]
fn test_duplicate_names_rejected() {
    let iron = Arc::new(Material::iron());
    let mut registry = ObjectRegistry::new();
    registry
        .add_object(CompositeObject::grain_square("A", Point::new(0.0, 0.0), Arc::clone(&iron), Kelvin::new(300.0)))
        .unwrap();
    let result = registry.add_object(CompositeObject::rectangle(
        "A",
        Point::new(5.0, 5.0),
        2,
        2,
        iron,
        Kelvin::new(300.0),
    ));
    assert_eq!(result, Err(RegistryError::NameConflict("A".into())));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_touching_boundary_cells_are_mutual_partners() {
    let glass = Arc::new(Material::glass());
    let mut registry = ObjectRegistry::new();
    registry
        .add_object(CompositeObject::rectangle("Top", Point::new(0.0, 0.0), 3, 2, Arc::clone(&glass), Kelvin::new(300.0)))
        .unwrap();
    registry
        .add_object(CompositeObject::rectangle("Bottom", Point::new(1.0, 2.0), 3, 2, glass, Kelvin::new(300.0)))
        .unwrap();
    optimized(&registry, &SimulationConfig::default());

    let top = registry.get("Top").unwrap();
    let bottom = registry.get("Bottom").unwrap();
    // Top (2,1) sits at (2,1); Bottom (1,0) sits at (2,2)
    let top_ref = CellRef::new(0, top.cell_index(2, 1).unwrap());
    let bottom_ref = CellRef::new(1, bottom.cell_index(1, 0).unwrap());
    let top_cell = top.cell_at(2, 1).unwrap();
    let bottom_cell = bottom.cell_at(1, 0).unwrap();

    assert!(top_cell.links().adjacent.contains(&bottom_ref));
    assert!(bottom_cell.links().adjacent.contains(&top_ref));
    assert!(top_cell.links().radiation.contains(&bottom_ref));
    assert!(bottom_cell.links().radiation.contains(&top_ref));

    // Top (0,1) at (0,1) has nothing below it
    assert_eq!(top.cell_at(0, 1).unwrap().adjacent_count(), 2);
}

#[test]
fn test_heat_spreads_through_a_bar() {
    let copper = Arc::new(Material::copper());
    let mut registry = ObjectRegistry::new();
    registry
        .add_object(CompositeObject::rectangle("Bar", Point::new(0.0, 0.0), 10, 1, copper, Kelvin::new(300.0)))
        .unwrap();
    let config = conduction_only();
    optimized(&registry, &config);
    let bar = registry.get("Bar").unwrap();
    bar.cell_at(0, 0).unwrap().set_temperature(Kelvin::new(1000.0));

    for _ in 0..600 {
        ConductionManager.transfer_heat(&registry, &[0], &config);
        registry.apply_energy_delta(&[0], config.apply_params()).unwrap();
    }

    let temperatures: Vec<f64> = bar.cells().iter().map(|c| *c.temperature()).collect();
    assert!(temperatures.windows(2).all(|w| w[0] >= w[1]));
    assert!(temperatures[3] > 300.0);
    // Closed system: the mean is unchanged
    let mean = temperatures.iter().sum::<f64>() / 10.0;
    assert_abs_diff_eq!(mean, 370.0, epsilon = 1e-6);
}
