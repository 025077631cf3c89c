//! Materials and the phase-keyed physical constants they carry
//!
//! A [`Material`] is phase-agnostic: it stores one constant per phase and the
//! accessors pick the right one from the phase of the *cell* asking. Cells that do
//! not track phase always read the solid constants.
//!
//! Materials are shared by `Arc` across every cell that uses them and are only
//! replaced (never mutated in place) while the engine is stopped.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core_types::units::Kelvin;
use crate::error::MaterialError;

/// Aggregate state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Solid,
    Liquid,
    Gas,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Solid => "Solid",
            Phase::Liquid => "Liquid",
            Phase::Gas => "Gas",
        }
    }
}

/// Display color for a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Physical constants of a material, one value per phase where it matters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub color: Rgb,

    // Specific heat capacity, J/(kg·K)
    pub specific_heat_solid: f64,
    pub specific_heat_liquid: f64,
    pub specific_heat_gas: f64,

    // Density, kg/m³
    pub density_solid: f64,
    pub density_liquid: f64,
    pub density_gas: f64,

    // Thermal conductivity, W/(m·K)
    pub thermal_conductivity_solid: f64,
    pub thermal_conductivity_liquid: f64,
    pub thermal_conductivity_gas: f64,

    // Emissivity, 0-1
    pub emissivity_solid: f64,
    pub emissivity_liquid: f64,
    pub emissivity_gas: f64,

    pub melting_temperature: Kelvin,
    pub boiling_temperature: Kelvin,
    /// Latent heat of fusion, J/kg
    pub melting_energy: f64,
    /// Latent heat of vaporization, J/kg
    pub boiling_energy: f64,
}

impl Material {
    /// Specific heat capacity for the given phase
    #[inline]
    pub fn specific_heat(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Solid => self.specific_heat_solid,
            Phase::Liquid => self.specific_heat_liquid,
            Phase::Gas => self.specific_heat_gas,
        }
    }

    /// Density for the given phase
    #[inline]
    pub fn density(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Solid => self.density_solid,
            Phase::Liquid => self.density_liquid,
            Phase::Gas => self.density_gas,
        }
    }

    /// Thermal conductivity for the given phase
    #[inline]
    pub fn thermal_conductivity(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Solid => self.thermal_conductivity_solid,
            Phase::Liquid => self.thermal_conductivity_liquid,
            Phase::Gas => self.thermal_conductivity_gas,
        }
    }

    /// Emissivity for the given phase
    #[inline]
    pub fn emissivity(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Solid => self.emissivity_solid,
            Phase::Liquid => self.emissivity_liquid,
            Phase::Gas => self.emissivity_gas,
        }
    }

    /// Phase implied by a temperature, used when a phase-tracking cell is created or reset
    pub fn phase_at(&self, temperature: Kelvin, gas_allowed: bool) -> Phase {
        if temperature < self.melting_temperature {
            Phase::Solid
        } else if temperature < self.boiling_temperature || !gas_allowed {
            Phase::Liquid
        } else {
            Phase::Gas
        }
    }

    /// Check that every constant is finite and inside its physical range
    pub fn validate(&self) -> Result<(), MaterialError> {
        let positive = [
            ("specific_heat_solid", self.specific_heat_solid),
            ("specific_heat_liquid", self.specific_heat_liquid),
            ("specific_heat_gas", self.specific_heat_gas),
            ("density_solid", self.density_solid),
            ("density_liquid", self.density_liquid),
            ("density_gas", self.density_gas),
        ];
        for (property, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(self.invalid(property, value));
            }
        }

        let non_negative = [
            ("thermal_conductivity_solid", self.thermal_conductivity_solid),
            ("thermal_conductivity_liquid", self.thermal_conductivity_liquid),
            ("thermal_conductivity_gas", self.thermal_conductivity_gas),
            ("melting_energy", self.melting_energy),
            ("boiling_energy", self.boiling_energy),
        ];
        for (property, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(self.invalid(property, value));
            }
        }

        for (property, value) in [
            ("emissivity_solid", self.emissivity_solid),
            ("emissivity_liquid", self.emissivity_liquid),
            ("emissivity_gas", self.emissivity_gas),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(self.invalid(property, value));
            }
        }

        if !self.melting_temperature.is_finite() {
            return Err(self.invalid("melting_temperature", *self.melting_temperature));
        }
        if self.boiling_temperature < self.melting_temperature {
            return Err(self.invalid("boiling_temperature", *self.boiling_temperature));
        }
        Ok(())
    }

    fn invalid(&self, property: &'static str, value: f64) -> MaterialError {
        MaterialError::InvalidProperty {
            material: self.name.clone(),
            property,
            value,
        }
    }

    /// Water: ice / liquid water / steam
    pub fn water() -> Self {
        Self {
            name: "Water".into(),
            color: Rgb::new(64, 128, 255),
            specific_heat_solid: 2100.0,
            specific_heat_liquid: 4186.0,
            specific_heat_gas: 2010.0,
            density_solid: 917.0,
            density_liquid: 1000.0,
            density_gas: 0.6,
            thermal_conductivity_solid: 2.22,
            thermal_conductivity_liquid: 0.6,
            thermal_conductivity_gas: 0.025,
            emissivity_solid: 0.97,
            emissivity_liquid: 0.96,
            emissivity_gas: 0.2,
            melting_temperature: Kelvin::new(273.15),
            boiling_temperature: Kelvin::new(373.15),
            melting_energy: 334_000.0,
            boiling_energy: 2_256_000.0,
        }
    }

    pub fn copper() -> Self {
        Self {
            name: "Copper".into(),
            color: Rgb::new(184, 115, 51),
            specific_heat_solid: 385.0,
            specific_heat_liquid: 531.0,
            specific_heat_gas: 380.0,
            density_solid: 8960.0,
            density_liquid: 8020.0,
            density_gas: 1.0,
            thermal_conductivity_solid: 401.0,
            thermal_conductivity_liquid: 163.0,
            thermal_conductivity_gas: 0.05,
            emissivity_solid: 0.05,
            emissivity_liquid: 0.15,
            emissivity_gas: 0.1,
            melting_temperature: Kelvin::new(1357.77),
            boiling_temperature: Kelvin::new(2835.0),
            melting_energy: 205_000.0,
            boiling_energy: 4_730_000.0,
        }
    }

    pub fn iron() -> Self {
        Self {
            name: "Iron".into(),
            color: Rgb::new(120, 120, 130),
            specific_heat_solid: 449.0,
            specific_heat_liquid: 820.0,
            specific_heat_gas: 450.0,
            density_solid: 7874.0,
            density_liquid: 6980.0,
            density_gas: 1.0,
            thermal_conductivity_solid: 80.0,
            thermal_conductivity_liquid: 40.0,
            thermal_conductivity_gas: 0.05,
            emissivity_solid: 0.3,
            emissivity_liquid: 0.4,
            emissivity_gas: 0.1,
            melting_temperature: Kelvin::new(1811.0),
            boiling_temperature: Kelvin::new(3134.0),
            melting_energy: 247_000.0,
            boiling_energy: 6_090_000.0,
        }
    }

    pub fn aluminium() -> Self {
        Self {
            name: "Aluminium".into(),
            color: Rgb::new(200, 200, 210),
            specific_heat_solid: 897.0,
            specific_heat_liquid: 1180.0,
            specific_heat_gas: 900.0,
            density_solid: 2700.0,
            density_liquid: 2375.0,
            density_gas: 1.0,
            thermal_conductivity_solid: 237.0,
            thermal_conductivity_liquid: 91.0,
            thermal_conductivity_gas: 0.05,
            emissivity_solid: 0.09,
            emissivity_liquid: 0.12,
            emissivity_gas: 0.1,
            melting_temperature: Kelvin::new(933.47),
            boiling_temperature: Kelvin::new(2743.0),
            melting_energy: 397_000.0,
            boiling_energy: 10_500_000.0,
        }
    }

    /// Lead melts low enough to exercise the phase machine without extreme temperatures
    pub fn lead() -> Self {
        Self {
            name: "Lead".into(),
            color: Rgb::new(90, 90, 110),
            specific_heat_solid: 129.0,
            specific_heat_liquid: 150.0,
            specific_heat_gas: 130.0,
            density_solid: 11340.0,
            density_liquid: 10660.0,
            density_gas: 1.0,
            thermal_conductivity_solid: 35.0,
            thermal_conductivity_liquid: 15.0,
            thermal_conductivity_gas: 0.05,
            emissivity_solid: 0.08,
            emissivity_liquid: 0.1,
            emissivity_gas: 0.1,
            melting_temperature: Kelvin::new(600.61),
            boiling_temperature: Kelvin::new(2022.0),
            melting_energy: 23_000.0,
            boiling_energy: 866_000.0,
        }
    }

    /// Wood chars long before it could melt; phase limits sit at the ceiling
    pub fn wood() -> Self {
        Self {
            name: "Wood".into(),
            color: Rgb::new(133, 94, 66),
            specific_heat_solid: 1700.0,
            specific_heat_liquid: 1700.0,
            specific_heat_gas: 1700.0,
            density_solid: 700.0,
            density_liquid: 700.0,
            density_gas: 700.0,
            thermal_conductivity_solid: 0.15,
            thermal_conductivity_liquid: 0.15,
            thermal_conductivity_gas: 0.15,
            emissivity_solid: 0.9,
            emissivity_liquid: 0.9,
            emissivity_gas: 0.9,
            melting_temperature: Kelvin::new(9000.0),
            boiling_temperature: Kelvin::new(9500.0),
            melting_energy: 0.0,
            boiling_energy: 0.0,
        }
    }

    pub fn glass() -> Self {
        Self {
            name: "Glass".into(),
            color: Rgb::new(180, 220, 230),
            specific_heat_solid: 840.0,
            specific_heat_liquid: 1200.0,
            specific_heat_gas: 900.0,
            density_solid: 2500.0,
            density_liquid: 2300.0,
            density_gas: 1.0,
            thermal_conductivity_solid: 1.05,
            thermal_conductivity_liquid: 1.5,
            thermal_conductivity_gas: 0.05,
            emissivity_solid: 0.92,
            emissivity_liquid: 0.9,
            emissivity_gas: 0.3,
            melting_temperature: Kelvin::new(1700.0),
            boiling_temperature: Kelvin::new(2500.0),
            melting_energy: 140_000.0,
            boiling_energy: 1_000_000.0,
        }
    }

    pub fn air() -> Self {
        Self {
            name: "Air".into(),
            color: Rgb::new(230, 240, 255),
            specific_heat_solid: 1000.0,
            specific_heat_liquid: 1970.0,
            specific_heat_gas: 1005.0,
            density_solid: 1000.0,
            density_liquid: 870.0,
            density_gas: 1.204,
            thermal_conductivity_solid: 0.2,
            thermal_conductivity_liquid: 0.14,
            thermal_conductivity_gas: 0.026,
            emissivity_solid: 0.5,
            emissivity_liquid: 0.3,
            emissivity_gas: 0.01,
            melting_temperature: Kelvin::new(60.0),
            boiling_temperature: Kelvin::new(78.8),
            melting_energy: 25_000.0,
            boiling_energy: 200_000.0,
        }
    }
}

/// Named set of materials that objects resolve their material against
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: FxHashMap<String, Arc<Material>>,
}

impl MaterialLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Library preloaded with the built-in materials
    pub fn with_builtin() -> Self {
        let mut library = Self::new();
        for material in [
            Material::water(),
            Material::copper(),
            Material::iron(),
            Material::aluminium(),
            Material::lead(),
            Material::wood(),
            Material::glass(),
            Material::air(),
        ] {
            library
                .materials
                .insert(material.name.clone(), Arc::new(material));
        }
        library
    }

    /// Look up a material by name
    pub fn get(&self, name: &str) -> Result<Arc<Material>, MaterialError> {
        self.materials
            .get(name)
            .cloned()
            .ok_or_else(|| MaterialError::UnknownMaterial(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.materials.contains_key(name)
    }

    /// Add or replace a material after validating it
    ///
    /// Objects keep their old `Arc` until [`crate::grid::ObjectRegistry::rebind_materials`]
    /// is called.
    pub fn insert(&mut self, material: Material) -> Result<Arc<Material>, MaterialError> {
        material.validate()?;
        let material = Arc::new(material);
        self.materials
            .insert(material.name.clone(), Arc::clone(&material));
        Ok(material)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Material>> {
        self.materials.remove(name)
    }

    /// Material names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Material>> {
        self.materials.values()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
