//! Composite objects: rectangular arrays of grain squares
//!
//! Four object kinds share one representation. They differ only in whether their
//! cells track phase and whether they are pinned to a single cell:
//!
//! | Kind               | Size   | Phase tracking |
//! |--------------------|--------|----------------|
//! | `GrainSquare`      | 1×1    | no             |
//! | `StateGrainSquare` | 1×1    | yes            |
//! | `Rectangle`        | w×h    | no             |
//! | `StateRectangle`   | w×h    | yes            |
//!
//! Geometry and material mutators rebuild the cell array synchronously and return
//! an [`ObjectChange`] describing what happened. Any rebuild invalidates the
//! optimizer's adjacency data.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core_types::material::{Material, Phase};
use crate::core_types::point::{grid_key, snap_to_grid, Point};
use crate::core_types::units::Kelvin;
use crate::error::SimulationError;
use crate::grid::cell::Cell;
use crate::physics::phase_change::{ApplyFault, ApplyParams};

/// Object type tag, also the `type` field of persisted records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    GrainSquare,
    StateGrainSquare,
    Rectangle,
    StateRectangle,
}

impl ObjectKind {
    /// Whether cells of this kind run the phase state machine
    pub fn tracks_phase(&self) -> bool {
        matches!(self, ObjectKind::StateGrainSquare | ObjectKind::StateRectangle)
    }

    /// Whether this kind is always exactly one cell
    pub fn is_single_cell(&self) -> bool {
        matches!(self, ObjectKind::GrainSquare | ObjectKind::StateGrainSquare)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::GrainSquare => "GrainSquare",
            ObjectKind::StateGrainSquare => "StateGrainSquare",
            ObjectKind::Rectangle => "Rectangle",
            ObjectKind::StateRectangle => "StateRectangle",
        }
    }
}

/// Result of a mutator call
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectChange {
    Renamed { from: String, to: String },
    Moved { from: Point, to: Point },
    Resized { from: (u32, u32), to: (u32, u32) },
    MaterialChanged { from: String, to: String },
    SimulationTemperatureChanged { from: Kelvin, to: Kelvin },
    FixedTemperatureChanged(bool),
    GasAllowedChanged(bool),
}

impl ObjectChange {
    /// Whether the cell array was rebuilt, dropping all adjacency / radiation links
    pub fn rebuilds_cells(&self) -> bool {
        !matches!(self, ObjectChange::Renamed { .. })
    }
}

/// Temperature summary of one object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectStats {
    pub mean: Kelvin,
    pub min: Kelvin,
    pub max: Kelvin,
    pub solid_cells: usize,
    pub liquid_cells: usize,
    pub gas_cells: usize,
}

/// A rectangular aggregate of cells manipulated as one entity
#[derive(Debug)]
pub struct CompositeObject {
    name: String,
    kind: ObjectKind,
    position: Point,
    width: u32,
    height: u32,
    simulation_temperature: Kelvin,
    material: Arc<Material>,
    fixed_temperature: bool,
    gas_allowed: bool,
    /// Row-major: index = j * width + i
    cells: Vec<Cell>,
    /// Indices into `cells` of the perimeter cells
    external: Vec<usize>,
    current_temperature: Mutex<Kelvin>,
}

impl CompositeObject {
    /// Create an object and allocate its cells
    ///
    /// Single-cell kinds ignore `width`/`height`; rectangles are at least 1×1.
    pub fn new(
        name: impl Into<String>,
        kind: ObjectKind,
        position: Point,
        width: u32,
        height: u32,
        material: Arc<Material>,
        simulation_temperature: Kelvin,
    ) -> Self {
        let (width, height) = if kind.is_single_cell() {
            (1, 1)
        } else {
            (width.max(1), height.max(1))
        };
        let mut object = Self {
            name: name.into(),
            kind,
            position: snap_to_grid(&position),
            width,
            height,
            simulation_temperature,
            material,
            fixed_temperature: false,
            gas_allowed: true,
            cells: Vec::new(),
            external: Vec::new(),
            current_temperature: Mutex::new(simulation_temperature),
        };
        object.rebuild_cells();
        object
    }

    pub fn rectangle(
        name: impl Into<String>,
        position: Point,
        width: u32,
        height: u32,
        material: Arc<Material>,
        temperature: Kelvin,
    ) -> Self {
        Self::new(name, ObjectKind::Rectangle, position, width, height, material, temperature)
    }

    pub fn state_rectangle(
        name: impl Into<String>,
        position: Point,
        width: u32,
        height: u32,
        material: Arc<Material>,
        temperature: Kelvin,
    ) -> Self {
        Self::new(
            name,
            ObjectKind::StateRectangle,
            position,
            width,
            height,
            material,
            temperature,
        )
    }

    pub fn grain_square(
        name: impl Into<String>,
        position: Point,
        material: Arc<Material>,
        temperature: Kelvin,
    ) -> Self {
        Self::new(name, ObjectKind::GrainSquare, position, 1, 1, material, temperature)
    }

    pub fn state_grain_square(
        name: impl Into<String>,
        position: Point,
        material: Arc<Material>,
        temperature: Kelvin,
    ) -> Self {
        Self::new(
            name,
            ObjectKind::StateGrainSquare,
            position,
            1,
            1,
            material,
            temperature,
        )
    }

    /// Builder-style flag setter used at construction time
    pub fn with_fixed_temperature(mut self, fixed: bool) -> Self {
        self.set_fixed_temperature(fixed);
        self
    }

    /// Builder-style flag setter used at construction time
    pub fn with_gas_allowed(mut self, allowed: bool) -> Self {
        self.set_gas_allowed(allowed);
        self
    }

    fn rebuild_cells(&mut self) {
        let tracks_phase = self.kind.tracks_phase();
        let mut cells = Vec::with_capacity(self.width as usize * self.height as usize);
        let mut external = Vec::new();
        for j in 0..self.height {
            for i in 0..self.width {
                if i == 0 || j == 0 || i == self.width - 1 || j == self.height - 1 {
                    external.push(cells.len());
                }
                cells.push(Cell::new(
                    self.position + Point::new(f64::from(i), f64::from(j)),
                    Arc::clone(&self.material),
                    self.simulation_temperature,
                    tracks_phase,
                    self.fixed_temperature,
                    self.gas_allowed,
                ));
            }
        }
        self.cells = cells;
        self.external = external;
        *self
            .current_temperature
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = self.simulation_temperature;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// (width, height) in cells
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn simulation_temperature(&self) -> Kelvin {
        self.simulation_temperature
    }

    pub fn is_fixed_temperature(&self) -> bool {
        self.fixed_temperature
    }

    pub fn is_gas_allowed(&self) -> bool {
        self.gas_allowed
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Cell at local offset (i, j)
    pub fn cell_at(&self, i: u32, j: u32) -> Option<&Cell> {
        if i >= self.width || j >= self.height {
            return None;
        }
        self.cells.get(row_major_index(self.width, i, j))
    }

    /// Cell index of local offset (i, j)
    pub fn cell_index(&self, i: u32, j: u32) -> Option<usize> {
        (i < self.width && j < self.height).then_some(row_major_index(self.width, i, j))
    }

    /// Indices of perimeter cells
    pub fn external_indices(&self) -> &[usize] {
        &self.external
    }

    /// Perimeter cells, the only ones considered for contact with other objects
    pub fn external_squares(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.external.iter().map(move |&i| &self.cells[i])
    }

    /// Mean cell temperature as of the last apply (or the reset temperature)
    pub fn current_temperature(&self) -> Kelvin {
        *self
            .current_temperature
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply every cell's pending energy, then refresh the mean temperature
    pub fn apply_energy_delta(&self, params: ApplyParams) -> Result<(), SimulationError> {
        for cell in &self.cells {
            cell.apply_energy_delta(params)
                .map_err(|fault| self.fault_to_error(cell, fault))?;
        }
        if !self.fixed_temperature {
            self.refresh_current_temperature();
        }
        Ok(())
    }

    fn refresh_current_temperature(&self) {
        let sum: f64 = self.cells.iter().map(|c| *c.temperature()).sum();
        let mean = Kelvin::clamped(sum / self.cells.len() as f64);
        *self
            .current_temperature
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mean;
    }

    fn fault_to_error(&self, cell: &Cell, fault: ApplyFault) -> SimulationError {
        let object = self.name.clone();
        let position = cell.position();
        match fault {
            ApplyFault::NanEnergy => SimulationError::NanEnergy { object, position },
            ApplyFault::NonFinite => SimulationError::NonFiniteTemperature { object, position },
            ApplyFault::Ceiling(temperature) => SimulationError::TemperatureCeiling {
                object,
                position,
                temperature,
            },
        }
    }

    /// Reset every cell to the simulation temperature
    pub fn reset_temperature(&self) {
        for cell in &self.cells {
            cell.reset_temperature();
        }
        *self
            .current_temperature
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = self.simulation_temperature;
    }

    /// Whether any perimeter cell sits exactly on a perimeter cell of `other`
    pub fn is_intersecting(&self, other: &CompositeObject) -> bool {
        let theirs: FxHashSet<(i64, i64)> = other
            .external_squares()
            .map(|c| grid_key(&c.position()))
            .collect();
        self.external_squares()
            .any(|c| theirs.contains(&grid_key(&c.position())))
    }

    /// Opposite corners of the bounding box, treating cells as unit squares
    pub fn visible_area(&self) -> (Point, Point) {
        (
            self.position,
            self.position + Point::new(f64::from(self.width), f64::from(self.height)),
        )
    }

    /// Whether a grid point falls inside the bounding box
    pub fn contains_point(&self, p: &Point) -> bool {
        let (min, max) = self.visible_area();
        p.x >= min.x && p.y >= min.y && p.x < max.x && p.y < max.y
    }

    /// Temperature and phase census over all cells
    pub fn stats(&self) -> ObjectStats {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let (mut solid_cells, mut liquid_cells, mut gas_cells) = (0, 0, 0);
        for cell in &self.cells {
            let snapshot = cell.snapshot();
            min = min.min(snapshot.temperature);
            max = max.max(snapshot.temperature);
            sum += snapshot.temperature;
            match snapshot.phase {
                Some(Phase::Liquid) => liquid_cells += 1,
                Some(Phase::Gas) => gas_cells += 1,
                Some(Phase::Solid) | None => solid_cells += 1,
            }
        }
        ObjectStats {
            mean: Kelvin::clamped(sum / self.cells.len() as f64),
            min: Kelvin::clamped(min),
            max: Kelvin::clamped(max),
            solid_cells,
            liquid_cells,
            gas_cells,
        }
    }

    /// Rename; uniqueness is the registry's job
    pub(crate) fn set_name(&mut self, name: String) -> ObjectChange {
        let from = std::mem::replace(&mut self.name, name);
        ObjectChange::Renamed {
            from,
            to: self.name.clone(),
        }
    }

    pub fn set_position(&mut self, position: Point) -> ObjectChange {
        let from = self.position;
        self.position = snap_to_grid(&position);
        self.rebuild_cells();
        ObjectChange::Moved {
            from,
            to: self.position,
        }
    }

    /// Resize; single-cell kinds stay 1×1
    pub fn set_size(&mut self, width: u32, height: u32) -> ObjectChange {
        let from = (self.width, self.height);
        if !self.kind.is_single_cell() {
            self.width = width.max(1);
            self.height = height.max(1);
        }
        self.rebuild_cells();
        ObjectChange::Resized {
            from,
            to: (self.width, self.height),
        }
    }

    pub fn set_material(&mut self, material: Arc<Material>) -> ObjectChange {
        let from = self.material.name.clone();
        self.material = material;
        self.rebuild_cells();
        ObjectChange::MaterialChanged {
            from,
            to: self.material.name.clone(),
        }
    }

    pub fn set_simulation_temperature(&mut self, temperature: Kelvin) -> ObjectChange {
        let from = self.simulation_temperature;
        self.simulation_temperature = temperature;
        self.rebuild_cells();
        ObjectChange::SimulationTemperatureChanged {
            from,
            to: temperature,
        }
    }

    pub fn set_fixed_temperature(&mut self, fixed: bool) -> ObjectChange {
        self.fixed_temperature = fixed;
        self.rebuild_cells();
        ObjectChange::FixedTemperatureChanged(fixed)
    }

    pub fn set_gas_allowed(&mut self, allowed: bool) -> ObjectChange {
        self.gas_allowed = allowed;
        self.rebuild_cells();
        ObjectChange::GasAllowedChanged(allowed)
    }

    /// Override the material of one cell, leaving the object's material unchanged
    pub fn set_cell_material(&mut self, index: usize, material: Arc<Material>) -> bool {
        match self.cells.get_mut(index) {
            Some(cell) => {
                cell.set_material(material);
                true
            }
            None => false,
        }
    }
}

/// Row-major cell index, computed in `usize` so large objects cannot overflow
#[inline]
fn row_major_index(width: u32, i: u32, j: u32) -> usize {
    j as usize * width as usize + i as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::units::Joules;

    const PARAMS: ApplyParams = ApplyParams {
        grid_step: 0.1,
        temperature_ceiling: 10_000.0,
    };

    fn iron() -> Arc<Material> {
        Arc::new(Material::iron())
    }

    #[test]
    fn test_cell_count_and_external() {
        let rect = CompositeObject::rectangle(
            "Plate",
            Point::new(2.0, 3.0),
            4,
            3,
            iron(),
            Kelvin::new(300.0),
        );
        assert_eq!(rect.cells().len(), 12);
        // 4x3: only (1,1) and (2,1) are interior
        assert_eq!(rect.external_indices().len(), 10);
        assert!(rect
            .external_indices()
            .iter()
            .all(|&i| i < rect.cells().len()));
        assert_eq!(rect.cell_at(0, 0).unwrap().position(), Point::new(2.0, 3.0));
        assert_eq!(rect.cell_at(3, 2).unwrap().position(), Point::new(5.0, 5.0));
        assert!(rect.cell_at(4, 0).is_none());
    }

    #[test]
    fn test_fractional_positions_snap_to_grid() {
        let mut rect = CompositeObject::rectangle(
            "Offset",
            Point::new(0.4, 1.6),
            2,
            1,
            iron(),
            Kelvin::new(300.0),
        );
        assert_eq!(rect.position(), Point::new(0.0, 2.0));
        assert_eq!(rect.cell_at(1, 0).unwrap().position(), Point::new(1.0, 2.0));

        let change = rect.set_position(Point::new(2.5001, -0.7));
        assert_eq!(
            change,
            ObjectChange::Moved {
                from: Point::new(0.0, 2.0),
                to: Point::new(3.0, -1.0),
            }
        );
        let left = rect.cell_at(0, 0).unwrap();
        let right = rect.cell_at(1, 0).unwrap();
        assert!(left.are_touching(right));
        assert_eq!(grid_key(&left.position()), (3, -1));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_row_major_index_beyond_u32() {
        assert_eq!(row_major_index(70_000, 69_999, 70_000), 4_900_069_999);
        assert_eq!(row_major_index(4, 3, 2), 11);
    }

    #[test]
    fn test_single_cell_kinds_stay_one_by_one() {
        let mut square =
            CompositeObject::grain_square("Dot", Point::new(0.0, 0.0), iron(), Kelvin::new(300.0));
        assert_eq!(square.size(), (1, 1));
        square.set_size(5, 5);
        assert_eq!(square.size(), (1, 1));
        assert_eq!(square.external_indices(), &[0]);
    }

    #[test]
    fn test_resize_rebuilds_cells() {
        let mut rect = CompositeObject::rectangle(
            "Bar",
            Point::new(0.0, 0.0),
            2,
            2,
            iron(),
            Kelvin::new(300.0),
        );
        let change = rect.set_size(5, 1);
        assert!(change.rebuilds_cells());
        assert_eq!(rect.cells().len(), 5);
        assert_eq!(rect.external_indices().len(), 5);
    }

    #[test]
    fn test_mean_temperature_after_apply() {
        let rect = CompositeObject::rectangle(
            "Pair",
            Point::new(0.0, 0.0),
            2,
            1,
            iron(),
            Kelvin::new(300.0),
        );
        let capacity = 0.01 * 449.0 * 7874.0;
        rect.cells()[0].add_energy_delta(Joules::new(capacity * 10.0));
        rect.apply_energy_delta(PARAMS).unwrap();
        assert!((*rect.current_temperature() - 305.0).abs() < 1e-6);
    }

    #[test]
    fn test_fixed_object_keeps_temperature() {
        let rect = CompositeObject::rectangle(
            "Heater",
            Point::new(0.0, 0.0),
            2,
            2,
            iron(),
            Kelvin::new(800.0),
        )
        .with_fixed_temperature(true);
        for cell in rect.cells() {
            cell.add_energy_delta(Joules::new(-1.0e9));
        }
        rect.apply_energy_delta(PARAMS).unwrap();
        assert_eq!(*rect.current_temperature(), 800.0);
        assert!(rect.cells().iter().all(|c| *c.temperature() == 800.0));
    }

    #[test]
    fn test_intersection_uses_exact_positions() {
        let a = CompositeObject::rectangle("A", Point::new(0.0, 0.0), 3, 3, iron(), Kelvin::new(300.0));
        let overlapping =
            CompositeObject::rectangle("B", Point::new(2.0, 2.0), 2, 2, iron(), Kelvin::new(300.0));
        let touching =
            CompositeObject::rectangle("C", Point::new(3.0, 0.0), 2, 2, iron(), Kelvin::new(300.0));
        assert!(a.is_intersecting(&overlapping));
        assert!(!a.is_intersecting(&touching));
    }

    #[test]
    fn test_visible_area_corners() {
        let rect = CompositeObject::rectangle(
            "Box",
            Point::new(1.0, 2.0),
            3,
            4,
            iron(),
            Kelvin::new(300.0),
        );
        assert_eq!(
            rect.visible_area(),
            (Point::new(1.0, 2.0), Point::new(4.0, 6.0))
        );
        assert!(rect.contains_point(&Point::new(3.0, 5.0)));
        assert!(!rect.contains_point(&Point::new(4.0, 5.0)));
    }

    #[test]
    fn test_stats_counts_phases() {
        let ice = CompositeObject::state_rectangle(
            "Ice",
            Point::new(0.0, 0.0),
            2,
            2,
            Arc::new(Material::water()),
            Kelvin::new(260.0),
        );
        ice.cells()[0].set_temperature(Kelvin::new(300.0));
        let stats = ice.stats();
        assert_eq!(stats.solid_cells, 3);
        assert_eq!(stats.liquid_cells, 1);
        assert_eq!(*stats.max, 300.0);
        assert_eq!(*stats.min, 260.0);
    }
}
