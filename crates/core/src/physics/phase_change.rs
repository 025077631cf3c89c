//! Energy-to-temperature conversion and the Solid/Liquid/Gas state machine
//!
//! Plain cells convert accumulated energy directly:
//! ```text
//! ΔT = E / (a² · c(phase) · ρ(phase))
//! ```
//! with `a` the grid step. Phase-tracking cells pin their temperature at a phase
//! boundary and bank the excess energy in a latent accumulator until
//! `latent_heat · a² · ρ(phase)` has been absorbed (or released), then switch
//! phase and carry the remainder forward as a temperature change in the new phase.
//!
//! Energy flowing away from a boundary changes temperature directly; the bank is
//! kept until the next phase switch.

use crate::core_types::material::{Material, Phase};

/// Mutable thermal state of one cell, guarded by the cell's lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalState {
    /// Current temperature (K)
    pub temperature: f64,
    /// Energy accumulated this frame, not yet applied (J)
    pub energy_delta: f64,
    /// `None` for cells that do not track phase
    pub phase: Option<Phase>,
    /// Energy banked at a phase boundary (J, never negative)
    pub latent_energy: f64,
}

/// Why applying an energy delta failed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyFault {
    NanEnergy,
    NonFinite,
    Ceiling(f64),
}

/// Static inputs for one apply call
#[derive(Debug, Clone, Copy)]
pub struct ApplyParams {
    /// Grid step (m)
    pub grid_step: f64,
    /// Temperatures at or above this abort the run (K)
    pub temperature_ceiling: f64,
}

/// A phase boundary a cell can cross
#[derive(Debug, Clone, Copy)]
struct Boundary {
    temperature: f64,
    latent_heat: f64,
    next: Phase,
}

/// Consume the accumulated energy delta and update temperature and phase
///
/// The delta is always reset to zero, including when a fault is returned.
pub fn apply_energy(
    state: &mut ThermalState,
    material: &Material,
    gas_allowed: bool,
    fixed_temperature: bool,
    params: ApplyParams,
) -> Result<(), ApplyFault> {
    let energy = state.energy_delta;
    state.energy_delta = 0.0;

    if fixed_temperature {
        return Ok(());
    }
    if energy.is_nan() {
        return Err(ApplyFault::NanEnergy);
    }

    let area = params.grid_step * params.grid_step;
    match state.phase {
        None => {
            state.temperature += energy / heat_capacity(material, Phase::Solid, area);
        }
        Some(_) => step_phase(state, material, gas_allowed, area, energy),
    }

    if state.temperature < 0.0 {
        state.temperature = 0.0;
    }
    if !state.temperature.is_finite() {
        return Err(ApplyFault::NonFinite);
    }
    if state.temperature >= params.temperature_ceiling {
        return Err(ApplyFault::Ceiling(state.temperature));
    }
    Ok(())
}

/// Energy needed to raise one cell by 1 K in the given phase (J/K)
#[inline]
pub fn heat_capacity(material: &Material, phase: Phase, area: f64) -> f64 {
    area * material.specific_heat(phase) * material.density(phase)
}

fn upper_boundary(material: &Material, phase: Phase, gas_allowed: bool) -> Option<Boundary> {
    match phase {
        Phase::Solid => Some(Boundary {
            temperature: *material.melting_temperature,
            latent_heat: material.melting_energy,
            next: Phase::Liquid,
        }),
        Phase::Liquid if gas_allowed => Some(Boundary {
            temperature: *material.boiling_temperature,
            latent_heat: material.boiling_energy,
            next: Phase::Gas,
        }),
        Phase::Liquid | Phase::Gas => None,
    }
}

fn lower_boundary(material: &Material, phase: Phase) -> Option<Boundary> {
    match phase {
        Phase::Solid => None,
        Phase::Liquid => Some(Boundary {
            temperature: *material.melting_temperature,
            latent_heat: material.melting_energy,
            next: Phase::Solid,
        }),
        Phase::Gas => Some(Boundary {
            temperature: *material.boiling_temperature,
            latent_heat: material.boiling_energy,
            next: Phase::Liquid,
        }),
    }
}

fn step_phase(
    state: &mut ThermalState,
    material: &Material,
    gas_allowed: bool,
    area: f64,
    energy: f64,
) {
    let Some(phase) = state.phase else {
        return;
    };

    if energy == 0.0 {
        return;
    }

    let capacity = heat_capacity(material, phase, area);
    let projected = state.temperature + energy / capacity;

    if energy > 0.0 {
        if let Some(boundary) = upper_boundary(material, phase, gas_allowed) {
            if projected >= boundary.temperature {
                let to_boundary = (boundary.temperature - state.temperature).max(0.0) * capacity;
                state.temperature = boundary.temperature;
                state.latent_energy += energy - to_boundary;
                let threshold = boundary.latent_heat * area * material.density(phase);
                if state.latent_energy >= threshold {
                    let remainder = state.latent_energy - threshold;
                    state.latent_energy = 0.0;
                    state.phase = Some(boundary.next);
                    state.temperature += remainder / heat_capacity(material, boundary.next, area);
                }
                return;
            }
        }
    } else if let Some(boundary) = lower_boundary(material, phase) {
        if projected <= boundary.temperature {
            let to_boundary = (state.temperature - boundary.temperature).max(0.0) * capacity;
            state.temperature = boundary.temperature;
            state.latent_energy += -energy - to_boundary;
            let threshold = boundary.latent_heat * area * material.density(phase);
            if state.latent_energy >= threshold {
                let remainder = state.latent_energy - threshold;
                state.latent_energy = 0.0;
                state.phase = Some(boundary.next);
                state.temperature -= remainder / heat_capacity(material, boundary.next, area);
            }
            return;
        }
    }

    state.temperature = projected;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PARAMS: ApplyParams = ApplyParams {
        grid_step: 0.1,
        temperature_ceiling: 10_000.0,
    };

    fn tracked(temperature: f64, phase: Phase) -> ThermalState {
        ThermalState {
            temperature,
            energy_delta: 0.0,
            phase: Some(phase),
            latent_energy: 0.0,
        }
    }

    fn melt_threshold(water: &Material) -> f64 {
        water.melting_energy * 0.01 * water.density_solid
    }

    #[test]
    fn test_plain_cell_uses_solid_constants() {
        let copper = Material::copper();
        let mut state = ThermalState {
            temperature: 300.0,
            energy_delta: 0.0,
            phase: None,
            latent_energy: 0.0,
        };
        let capacity = heat_capacity(&copper, Phase::Solid, 0.01);
        state.energy_delta = capacity * 5.0;
        apply_energy(&mut state, &copper, true, false, PARAMS).unwrap();
        assert_relative_eq!(state.temperature, 305.0, epsilon = 1e-9);
        assert_eq!(state.energy_delta, 0.0);
    }

    #[test]
    fn test_fixed_temperature_consumes_energy_without_change() {
        let iron = Material::iron();
        let mut state = tracked(500.0, Phase::Solid);
        state.energy_delta = 1.0e9;
        apply_energy(&mut state, &iron, true, true, PARAMS).unwrap();
        assert_eq!(state.temperature, 500.0);
        assert_eq!(state.energy_delta, 0.0);
    }

    #[test]
    fn test_floor_at_zero() {
        let water = Material::water();
        let mut state = tracked(5.0, Phase::Solid);
        state.energy_delta = -1.0e12;
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();
        assert_eq!(state.temperature, 0.0);
    }

    #[test]
    fn test_nan_energy_is_fatal() {
        let water = Material::water();
        let mut state = tracked(300.0, Phase::Liquid);
        state.energy_delta = f64::NAN;
        assert_eq!(
            apply_energy(&mut state, &water, true, false, PARAMS),
            Err(ApplyFault::NanEnergy)
        );
        assert_eq!(state.energy_delta, 0.0);
    }

    #[test]
    fn test_ceiling_is_fatal() {
        let copper = Material::copper();
        let mut state = ThermalState {
            temperature: 9_999.0,
            energy_delta: 1.0e9,
            phase: None,
            latent_energy: 0.0,
        };
        assert!(matches!(
            apply_energy(&mut state, &copper, true, false, PARAMS),
            Err(ApplyFault::Ceiling(t)) if t >= 10_000.0
        ));
    }

    #[test]
    fn test_melting_pins_then_transitions() {
        let water = Material::water();
        let mut state = tracked(272.0, Phase::Solid);
        let to_melt = (273.15 - 272.0) * heat_capacity(&water, Phase::Solid, 0.01);
        state.energy_delta = to_melt + 100.0;
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();
        assert_eq!(state.phase, Some(Phase::Solid));
        assert_relative_eq!(state.temperature, 273.15);
        assert_relative_eq!(state.latent_energy, 100.0, epsilon = 1e-6);

        let threshold = melt_threshold(&water);
        state.energy_delta = threshold - 100.0 + 418.6 * 10.0;
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();
        assert_eq!(state.phase, Some(Phase::Liquid));
        assert_eq!(state.latent_energy, 0.0);
        // 4186 J over a liquid capacity of 0.01 * 4186 * 1000 J/K
        assert_relative_eq!(state.temperature, 273.25, epsilon = 1e-6);
    }

    #[test]
    fn test_freezing_releases_latent_heat() {
        let water = Material::water();
        let mut state = tracked(274.15, Phase::Liquid);
        let to_boundary = heat_capacity(&water, Phase::Liquid, 0.01);
        let threshold = water.melting_energy * 0.01 * water.density_liquid;
        state.energy_delta = -(to_boundary + threshold + 1.0);
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();
        assert_eq!(state.phase, Some(Phase::Solid));
        assert!(state.temperature < 273.15);
        assert_relative_eq!(state.temperature, 273.15, epsilon = 1e-3);
    }

    #[test]
    fn test_boiling_requires_gas_allowed() {
        let water = Material::water();
        let to_boundary = (373.15 - 370.0) * heat_capacity(&water, Phase::Liquid, 0.01);
        let threshold = water.boiling_energy * 0.01 * water.density_liquid;

        let mut allowed = tracked(370.0, Phase::Liquid);
        allowed.energy_delta = to_boundary + threshold + 1.0;
        apply_energy(&mut allowed, &water, true, false, PARAMS).unwrap();
        assert_eq!(allowed.phase, Some(Phase::Gas));
        assert!(allowed.temperature >= 373.15);

        let mut blocked = tracked(370.0, Phase::Liquid);
        blocked.energy_delta = 2.0e5;
        apply_energy(&mut blocked, &water, false, false, PARAMS).unwrap();
        assert_eq!(blocked.phase, Some(Phase::Liquid));
        assert!(blocked.temperature > 373.15);
    }

    #[test]
    fn test_condensing_gas() {
        let water = Material::water();
        let mut state = tracked(380.0, Phase::Gas);
        let to_boundary = (380.0 - 373.15) * heat_capacity(&water, Phase::Gas, 0.01);
        let threshold = water.boiling_energy * 0.01 * water.density_gas;
        state.energy_delta = -(to_boundary + threshold + 418.6);
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();
        assert_eq!(state.phase, Some(Phase::Liquid));
        assert!(state.temperature < 373.15);
        assert_relative_eq!(state.temperature, 373.14, epsilon = 1e-3);
    }

    #[test]
    fn test_reversed_flow_keeps_bank_and_cools() {
        let water = Material::water();
        let mut state = tracked(273.15, Phase::Solid);
        state.latent_energy = 500.0;
        state.energy_delta = -200.0;
        apply_energy(&mut state, &water, true, false, PARAMS).unwrap();

        let capacity = heat_capacity(&water, Phase::Solid, 0.01);
        assert_relative_eq!(state.temperature, 273.15 - 200.0 / capacity, epsilon = 1e-12);
        assert_relative_eq!(state.latent_energy, 500.0);
        assert_eq!(state.phase, Some(Phase::Solid));
    }
}
