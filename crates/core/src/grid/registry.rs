//! The set of all composite objects, keyed by unique name

use rayon::prelude::*;
use std::sync::{Arc, Mutex, PoisonError};

use crate::core_types::material::MaterialLibrary;
use crate::core_types::units::Kelvin;
use crate::error::{MaterialError, RegistryError, SimulationError};
use crate::grid::cell::{Cell, CellRef};
use crate::grid::object::{CompositeObject, ObjectChange};
use crate::physics::phase_change::ApplyParams;

/// Smallest and biggest cell temperature seen since the last reset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub smallest: Kelvin,
    pub biggest: Kelvin,
}

impl TemperatureRange {
    fn widen(self, other: TemperatureRange) -> Self {
        Self {
            smallest: self.smallest.min(other.smallest),
            biggest: self.biggest.max(other.biggest),
        }
    }
}

/// Owns every [`CompositeObject`] in the scene
///
/// Names are unique. Object slots are addressed by index in [`CellRef`]s, so any
/// structural change marks the topology dirty until the optimizer runs again.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<CompositeObject>,
    topology_dirty: bool,
    range: Mutex<Option<TemperatureRange>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object; fails without mutation if the name is taken
    pub fn add_object(&mut self, object: CompositeObject) -> Result<usize, RegistryError> {
        if self.contains(object.name()) {
            return Err(RegistryError::NameConflict(object.name().to_string()));
        }
        tracing::debug!(
            name = object.name(),
            kind = object.kind().name(),
            cells = object.cells().len(),
            "Object added"
        );
        self.objects.push(object);
        self.topology_dirty = true;
        Ok(self.objects.len() - 1)
    }

    /// Remove an object by name and hand it back
    pub fn remove_object(&mut self, name: &str) -> Result<CompositeObject, RegistryError> {
        let index = self.index_of(name)?;
        let object = self.objects.remove(index);
        self.topology_dirty = true;
        tracing::debug!(name, "Object removed");
        Ok(object)
    }

    pub fn clear_objects(&mut self) {
        self.objects.clear();
        self.topology_dirty = true;
        tracing::debug!("All objects removed");
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.iter().any(|o| o.name() == name)
    }

    pub fn objects(&self) -> &[CompositeObject] {
        &self.objects
    }

    pub fn index_of(&self, name: &str) -> Result<usize, RegistryError> {
        self.objects
            .iter()
            .position(|o| o.name() == name)
            .ok_or_else(|| RegistryError::UnknownObject(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&CompositeObject, RegistryError> {
        self.index_of(name).map(|i| &self.objects[i])
    }

    /// Positional lookup
    pub fn get_index(&self, index: usize) -> Result<&CompositeObject, RegistryError> {
        self.objects.get(index).ok_or(RegistryError::IndexOutOfBounds {
            index,
            len: self.objects.len(),
        })
    }

    /// Resolve a cell reference produced by the optimizer
    #[inline]
    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.objects
            .get(at.object as usize)
            .and_then(|o| o.cell(at.cell as usize))
    }

    /// Run a mutator on one object and record the topology change
    pub fn update_object<F>(&mut self, name: &str, mutate: F) -> Result<ObjectChange, RegistryError>
    where
        F: FnOnce(&mut CompositeObject) -> ObjectChange,
    {
        let index = self.index_of(name)?;
        let change = mutate(&mut self.objects[index]);
        if change.rebuilds_cells() {
            self.topology_dirty = true;
        }
        tracing::debug!(name, ?change, "Object changed");
        Ok(change)
    }

    /// Rename an object, keeping names unique
    pub fn rename_object(&mut self, name: &str, new_name: &str) -> Result<ObjectChange, RegistryError> {
        let index = self.index_of(name)?;
        if name != new_name && self.contains(new_name) {
            return Err(RegistryError::NameConflict(new_name.to_string()));
        }
        Ok(self.objects[index].set_name(new_name.to_string()))
    }

    /// Point every object at the library's current material of the same name
    pub fn rebind_materials(&mut self, library: &MaterialLibrary) -> Result<(), MaterialError> {
        let mut resolved = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            resolved.push(library.get(&object.material().name)?);
        }
        for (object, material) in self.objects.iter_mut().zip(resolved) {
            if !Arc::ptr_eq(object.material(), &material) {
                object.set_material(material);
                self.topology_dirty = true;
            }
        }
        Ok(())
    }

    /// Whether adjacency data is stale
    pub fn is_topology_dirty(&self) -> bool {
        self.topology_dirty
    }

    pub(crate) fn mark_topology_clean(&mut self) {
        self.topology_dirty = false;
    }

    /// Reset every cell to its object's simulation temperature
    pub fn reset_objects_temperature(&self) {
        self.objects.par_iter().for_each(CompositeObject::reset_temperature);
    }

    /// Apply pending energy on the objects at `partition` indices
    pub fn apply_energy_delta(
        &self,
        partition: &[usize],
        params: ApplyParams,
    ) -> Result<(), SimulationError> {
        for &index in partition {
            if let Some(object) = self.objects.get(index) {
                object.apply_energy_delta(params)?;
            }
        }
        Ok(())
    }

    /// Widen the tracked range to include every current cell temperature
    pub fn update_smallest_and_biggest_temperature(&self) {
        let observed = self
            .objects
            .par_iter()
            .flat_map_iter(|o| o.cells().iter())
            .map(|c| {
                let t = c.temperature();
                TemperatureRange {
                    smallest: t,
                    biggest: t,
                }
            })
            .reduce_with(TemperatureRange::widen);
        let Some(observed) = observed else {
            return;
        };
        let mut range = self.range.lock().unwrap_or_else(PoisonError::into_inner);
        *range = Some(match *range {
            Some(current) => current.widen(observed),
            None => observed,
        });
    }

    pub fn temperature_range(&self) -> Option<TemperatureRange> {
        *self.range.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset_temperature_range(&self) {
        *self.range.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Total number of cells across all objects
    pub fn cell_count(&self) -> usize {
        self.objects.iter().map(|o| o.cells().len()).sum()
    }
}
