//! Engine configuration
//!
//! Loaded once before a run and read-only while the engine is Running. Partial
//! JSON documents are accepted: missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::physics::phase_change::ApplyParams;

/// Configuration surface shared by the scheduler and the heat-transfer managers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Physical size of one grid cell (m)
    pub grid_step: f64,
    /// Radiation ray length in cells
    pub radiation_depth: u32,
    /// Ambient air temperature (K)
    pub air_temperature: f64,
    /// Ambient air thermal conductivity (W/(m·K))
    pub air_thermal_conductivity: f64,
    /// Stefan-Boltzmann constant (W/(m²·K⁴))
    pub stefan_boltzmann: f64,
    /// Simulated frames per simulated second; Δt = 1 / `updates_per_second`
    pub updates_per_second: u32,
    /// Consumed by rendering layers only
    pub ui_refresh_rate: u32,
    /// Soft real-time pacing of the frame loop
    pub wait_to_be_in_time: bool,
    /// Enables conduction and radiation to ambient air
    pub objects_lose_heat_to_air: bool,
    /// Convective coefficient between gas cells (W/K)
    pub gas_convection_coefficient: f64,
    /// Convective coefficient between liquid cells (W/K)
    pub liquid_convection_coefficient: f64,
    /// Per-pair convective transfer cap per frame (J)
    pub max_convection_transfer: f64,
    /// Temperatures at or above this abort the run (K)
    pub temperature_ceiling: f64,
    /// Color scale lower bound (K), rendering only
    pub color_scale_min: f64,
    /// Color scale upper bound (K), rendering only
    pub color_scale_max: f64,
    /// Worker slots; `None` means `max(cores - 2, 1)`
    pub worker_threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_step: 0.1,
            radiation_depth: 10,
            air_temperature: 293.15,
            air_thermal_conductivity: 0.026,
            stefan_boltzmann: 5.670_374_419e-8,
            updates_per_second: 60,
            ui_refresh_rate: 60,
            wait_to_be_in_time: false,
            objects_lose_heat_to_air: true,
            gas_convection_coefficient: 25.0,
            liquid_convection_coefficient: 500.0,
            max_convection_transfer: 1000.0,
            temperature_ceiling: 10_000.0,
            color_scale_min: 0.0,
            color_scale_max: 1000.0,
            worker_threads: None,
        }
    }
}

impl SimulationConfig {
    /// Simulated seconds per frame
    #[inline]
    pub fn time_step(&self) -> f64 {
        1.0 / f64::from(self.updates_per_second)
    }

    /// Cell face area (m²)
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.grid_step * self.grid_step
    }

    /// Parameters for the per-cell apply step
    pub fn apply_params(&self) -> ApplyParams {
        ApplyParams {
            grid_step: self.grid_step,
            temperature_ceiling: self.temperature_ceiling,
        }
    }

    /// Radiation partners farther than this are ignored (cells)
    pub fn radiation_cutoff(&self) -> f64 {
        std::f64::consts::SQRT_2 * f64::from(self.radiation_depth)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("grid_step", self.grid_step),
            ("air_temperature", self.air_temperature),
            ("air_thermal_conductivity", self.air_thermal_conductivity),
            ("stefan_boltzmann", self.stefan_boltzmann),
            ("gas_convection_coefficient", self.gas_convection_coefficient),
            ("liquid_convection_coefficient", self.liquid_convection_coefficient),
            ("max_convection_transfer", self.max_convection_transfer),
            ("temperature_ceiling", self.temperature_ceiling),
            ("color_scale_min", self.color_scale_min),
            ("color_scale_max", self.color_scale_max),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(invalid(field, format!("must be finite, got {value}")));
            }
        }
        if self.grid_step <= 0.0 {
            return Err(invalid("grid_step", format!("must be positive, got {}", self.grid_step)));
        }
        if self.updates_per_second == 0 {
            return Err(invalid("updates_per_second", "must be positive".into()));
        }
        if self.radiation_depth == 0 {
            return Err(invalid("radiation_depth", "must be at least 1".into()));
        }
        if self.air_temperature < 0.0 {
            return Err(invalid(
                "air_temperature",
                format!("must be non-negative, got {}", self.air_temperature),
            ));
        }
        if self.temperature_ceiling <= 0.0 {
            return Err(invalid("temperature_ceiling", "must be positive".into()));
        }
        if self.color_scale_min >= self.color_scale_max {
            return Err(invalid(
                "color_scale_min",
                format!(
                    "must be below color_scale_max ({} >= {})",
                    self.color_scale_min, self.color_scale_max
                ),
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(invalid("worker_threads", "must be at least 1".into()));
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
