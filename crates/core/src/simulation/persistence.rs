//! Persisted object / material records and scene files
//!
//! Objects reference their material by name. Loading a scene registers its
//! materials first, then resolves every object's material against the library,
//! so `restore(capture(x))` reproduces names, positions, sizes, temperatures,
//! material names and flags field for field.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core_types::material::{Material, MaterialLibrary};
use crate::core_types::point::Point;
use crate::core_types::units::Kelvin;
use crate::error::{MaterialError, RegistryError};
use crate::grid::object::{CompositeObject, ObjectKind};
use crate::grid::registry::ObjectRegistry;

/// Persisted material shape: every physical constant plus the display color
pub type MaterialRecord = Material;

/// Rectangle extent in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRecord {
    pub width: u32,
    pub height: u32,
}

/// Persisted object shape, tagged by object kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub name: String,
    pub position: Point,
    /// Present for rectangles only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeRecord>,
    pub simulation_temperature: Kelvin,
    pub material: String,
    #[serde(default)]
    pub fixed_temperature: bool,
    #[serde(default = "default_gas_allowed")]
    pub gas_allowed: bool,
}

fn default_gas_allowed() -> bool {
    true
}

impl ObjectRecord {
    pub fn from_object(object: &CompositeObject) -> Self {
        let (width, height) = object.size();
        Self {
            kind: object.kind(),
            name: object.name().to_string(),
            position: object.position(),
            size: (!object.kind().is_single_cell()).then_some(SizeRecord { width, height }),
            simulation_temperature: object.simulation_temperature(),
            material: object.material().name.clone(),
            fixed_temperature: object.is_fixed_temperature(),
            gas_allowed: object.is_gas_allowed(),
        }
    }

    /// Rebuild the object, resolving its material by name
    pub fn to_object(&self, library: &MaterialLibrary) -> Result<CompositeObject, MaterialError> {
        let material = library.get(&self.material)?;
        let size = self.size.unwrap_or(SizeRecord {
            width: 1,
            height: 1,
        });
        Ok(CompositeObject::new(
            self.name.clone(),
            self.kind,
            self.position,
            size.width,
            size.height,
            material,
            Kelvin::clamped(*self.simulation_temperature),
        )
        .with_fixed_temperature(self.fixed_temperature)
        .with_gas_allowed(self.gas_allowed))
    }
}

/// A saved scene: materials it defines and the objects that use them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub materials: Vec<MaterialRecord>,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

impl Scene {
    /// Capture every object plus the materials they reference
    pub fn capture(registry: &ObjectRegistry) -> Self {
        let objects: Vec<ObjectRecord> = registry
            .objects()
            .iter()
            .map(ObjectRecord::from_object)
            .collect();
        let mut materials: Vec<MaterialRecord> = Vec::new();
        for object in registry.objects() {
            if !materials.iter().any(|m| m.name == object.material().name) {
                materials.push(Material::clone(object.material()));
            }
        }
        materials.sort_by(|a, b| a.name.cmp(&b.name));
        Self { materials, objects }
    }

    /// Register the scene's materials, then build a registry of its objects
    pub fn restore(&self, library: &mut MaterialLibrary) -> Result<ObjectRegistry, PersistenceError> {
        for material in &self.materials {
            library.insert(material.clone())?;
        }
        let mut registry = ObjectRegistry::new();
        for record in &self.objects {
            registry.add_object(record.to_object(library)?)?;
        }
        Ok(registry)
    }

    pub fn from_json_str(json: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(json).map_err(|e| PersistenceError::ParseFailed(e.to_string()))
    }

    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PersistenceError::SerializeFailed(e.to_string()))
    }

    /// Load a scene file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let contents =
            fs::read_to_string(path).map_err(|e| PersistenceError::LoadFailed(e.to_string()))?;
        Self::from_json_str(&contents)
    }

    /// Save a scene file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(|e| PersistenceError::SaveFailed(e.to_string()))?;
        Ok(())
    }
}

/// Errors that can occur with persistence operations
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// Failed to load file
    LoadFailed(String),
    /// Failed to parse file contents
    ParseFailed(String),
    /// Failed to serialize scene
    SerializeFailed(String),
    /// Failed to save file
    SaveFailed(String),
    /// A material was invalid or an object referenced an unknown one
    Material(MaterialError),
    /// Two objects shared a name
    Registry(RegistryError),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::LoadFailed(msg) => write!(f, "Failed to load: {msg}"),
            PersistenceError::ParseFailed(msg) => write!(f, "Failed to parse: {msg}"),
            PersistenceError::SerializeFailed(msg) => write!(f, "Failed to serialize: {msg}"),
            PersistenceError::SaveFailed(msg) => write!(f, "Failed to save: {msg}"),
            PersistenceError::Material(e) => write!(f, "{e}"),
            PersistenceError::Registry(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Material(e) => Some(e),
            PersistenceError::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MaterialError> for PersistenceError {
    fn from(e: MaterialError) -> Self {
        PersistenceError::Material(e)
    }
}

impl From<RegistryError> for PersistenceError {
    fn from(e: RegistryError) -> Self {
        PersistenceError::Registry(e)
    }
}
