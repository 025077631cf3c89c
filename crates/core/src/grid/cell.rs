//! Grain squares: the atomic thermal unit
//!
//! Every cell carries two independent locks:
//! - `thermal` guards temperature, pending energy, phase and the latent bank.
//!   Transfer managers take it briefly to read a temperature or add energy, and
//!   the apply step takes it to convert energy into temperature.
//! - `links` guards the adjacency and radiation-partner lists. Only the optimizer
//!   writes them; frames only read.
//!
//! Transfer managers hold a cell's `links` read guard while locking partners'
//! `thermal` state. Nothing takes another lock while holding a `thermal` lock, and
//! `links` is only written while no frame runs, so these never deadlock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use crate::core_types::material::{Material, Phase};
use crate::core_types::point::Point;
use crate::core_types::units::{Joules, Kelvin};
use crate::physics::phase_change::{apply_energy, ApplyFault, ApplyParams, ThermalState};

/// Index-based reference to a cell: object slot in the registry, cell slot in the object
///
/// Valid until the registry's object list or any object's cell array changes; the
/// optimizer rebuilds all references before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub object: u32,
    pub cell: u32,
}

impl CellRef {
    pub const fn new(object: usize, cell: usize) -> Self {
        Self {
            object: object as u32,
            cell: cell as u32,
        }
    }
}

/// Heat-exchange partners computed by the optimizer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellLinks {
    /// Conduction / convection partners (4-connected contact)
    pub adjacent: Vec<CellRef>,
    /// Radiation partners
    pub radiation: Vec<CellRef>,
}

/// Temperature and phase read under one lock acquisition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSnapshot {
    pub temperature: f64,
    pub phase: Option<Phase>,
}

impl CellSnapshot {
    /// Phase used to select material constants (untracked cells read solid constants)
    #[inline]
    pub fn effective_phase(&self) -> Phase {
        self.phase.unwrap_or(Phase::Solid)
    }
}

/// One grain square
#[derive(Debug)]
pub struct Cell {
    position: Point,
    material: Arc<Material>,
    simulation_temperature: Kelvin,
    phase_tracking: bool,
    fixed_temperature: bool,
    gas_allowed: bool,
    thermal: Mutex<ThermalState>,
    links: RwLock<CellLinks>,
}

impl Cell {
    /// Create a cell at its reset temperature
    pub fn new(
        position: Point,
        material: Arc<Material>,
        simulation_temperature: Kelvin,
        phase_tracking: bool,
        fixed_temperature: bool,
        gas_allowed: bool,
    ) -> Self {
        let phase =
            phase_tracking.then(|| material.phase_at(simulation_temperature, gas_allowed));
        Self {
            position,
            material,
            simulation_temperature,
            phase_tracking,
            fixed_temperature,
            gas_allowed,
            thermal: Mutex::new(ThermalState {
                temperature: *simulation_temperature,
                energy_delta: 0.0,
                phase,
                latent_energy: 0.0,
            }),
            links: RwLock::new(CellLinks::default()),
        }
    }

    fn thermal(&self) -> MutexGuard<'_, ThermalState> {
        self.thermal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Replace the material; only valid while the engine is not running
    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
        self.reset_temperature();
    }

    pub fn simulation_temperature(&self) -> Kelvin {
        self.simulation_temperature
    }

    pub fn is_phase_tracking(&self) -> bool {
        self.phase_tracking
    }

    pub fn is_fixed_temperature(&self) -> bool {
        self.fixed_temperature
    }

    pub fn is_gas_allowed(&self) -> bool {
        self.gas_allowed
    }

    pub fn temperature(&self) -> Kelvin {
        Kelvin::clamped(self.thermal().temperature)
    }

    /// Overwrite the current temperature (UI edits, test setup)
    pub fn set_temperature(&self, temperature: Kelvin) {
        let mut state = self.thermal();
        state.temperature = *temperature;
        if self.phase_tracking {
            state.phase = Some(self.material.phase_at(temperature, self.gas_allowed));
            state.latent_energy = 0.0;
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.thermal().phase
    }

    pub fn latent_energy(&self) -> Joules {
        Joules::new(self.thermal().latent_energy)
    }

    /// Energy accumulated this frame and not yet applied
    pub fn energy_delta(&self) -> Joules {
        Joules::new(self.thermal().energy_delta)
    }

    pub fn snapshot(&self) -> CellSnapshot {
        let state = self.thermal();
        CellSnapshot {
            temperature: state.temperature,
            phase: state.phase,
        }
    }

    /// Accumulate energy for this frame
    #[inline]
    pub fn add_energy_delta(&self, amount: Joules) {
        self.thermal().energy_delta += *amount;
    }

    /// Convert the accumulated energy into a temperature change and reset it
    pub fn apply_energy_delta(&self, params: ApplyParams) -> Result<Kelvin, ApplyFault> {
        let mut state = self.thermal();
        apply_energy(
            &mut state,
            &self.material,
            self.gas_allowed,
            self.fixed_temperature,
            params,
        )?;
        Ok(Kelvin::clamped(state.temperature))
    }

    /// Return to the reset temperature, with phase derived from it
    pub fn reset_temperature(&self) {
        let mut state = self.thermal();
        state.temperature = *self.simulation_temperature;
        state.energy_delta = 0.0;
        state.latent_energy = 0.0;
        state.phase = self
            .phase_tracking
            .then(|| self.material.phase_at(self.simulation_temperature, self.gas_allowed));
    }

    /// Read access to the optimizer's link lists
    pub fn links(&self) -> RwLockReadGuard<'_, CellLinks> {
        self.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of conduction partners
    pub fn adjacent_count(&self) -> usize {
        self.links().adjacent.len()
    }

    /// Empty both link lists
    pub fn clear_optimization_squares(&self) {
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        links.adjacent.clear();
        links.radiation.clear();
    }

    /// Add a conduction partner; returns false if it was already linked
    pub fn link_adjacent(&self, other: CellRef) -> bool {
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        if links.adjacent.contains(&other) {
            return false;
        }
        links.adjacent.push(other);
        true
    }

    /// Add a radiation partner; returns false if it was already linked
    pub fn link_radiation(&self, other: CellRef) -> bool {
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        if links.radiation.contains(&other) {
            return false;
        }
        links.radiation.push(other);
        true
    }

    /// Axis-aligned 4-connected contact: one shared coordinate, the other 1 apart
    pub fn are_touching(&self, other: &Cell) -> bool {
        positions_touch(&self.position, &other.position)
    }
}

/// 4-connectivity test on grid positions
#[inline]
pub fn positions_touch(a: &Point, b: &Point) -> bool {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    (dx == 0.0 && dy == 1.0) || (dy == 0.0 && dx == 1.0)
}
