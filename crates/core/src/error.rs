//! Error types for the thermal engine
//!
//! Errors fall into three families:
//! - precondition / configuration errors, rejected synchronously by the call that hit them
//! - numeric instability raised from the per-cell energy-apply path ([`SimulationError`])
//! - structural errors from registry lookups and mode-gated operations
//!
//! Nothing in the engine retries. A [`SimulationError`] raised while the frame loop
//! runs is reported once through the engine's error sink and ends the loop.

use std::fmt;

use crate::core_types::point::Point;
use crate::simulation::persistence::PersistenceError;

/// Errors from [`crate::grid::ObjectRegistry`] operations
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// An object with this name is already registered
    NameConflict(String),
    /// No object with this name is registered
    UnknownObject(String),
    /// Positional lookup outside the object list
    IndexOutOfBounds { index: usize, len: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NameConflict(name) => {
                write!(f, "An object named '{name}' already exists")
            }
            RegistryError::UnknownObject(name) => write!(f, "No object named '{name}'"),
            RegistryError::IndexOutOfBounds { index, len } => {
                write!(f, "Object index {index} out of bounds (len {len})")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Errors from material lookup and validation
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialError {
    /// No material with this name is loaded
    UnknownMaterial(String),
    /// A physical constant is out of its valid range
    InvalidProperty {
        material: String,
        property: &'static str,
        value: f64,
    },
}

impl fmt::Display for MaterialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialError::UnknownMaterial(name) => write!(f, "Unknown material '{name}'"),
            MaterialError::InvalidProperty {
                material,
                property,
                value,
            } => write!(f, "Material '{material}': invalid {property} ({value})"),
        }
    }
}

impl std::error::Error for MaterialError {}

/// Numeric instability detected while converting energy into temperature
///
/// These are fatal to the current run: the frame loop stops and the message is
/// handed to the error sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// The accumulated energy delta was NaN
    NanEnergy { object: String, position: Point },
    /// The resulting temperature reached the hard ceiling
    TemperatureCeiling {
        object: String,
        position: Point,
        temperature: f64,
    },
    /// The resulting temperature was infinite
    NonFiniteTemperature { object: String, position: Point },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::NanEnergy { object, position } => write!(
                f,
                "NaN energy delta in '{object}' at ({}, {})",
                position.x, position.y
            ),
            SimulationError::TemperatureCeiling {
                object,
                position,
                temperature,
            } => write!(
                f,
                "Temperature {temperature:.1} K exceeds ceiling in '{object}' at ({}, {})",
                position.x, position.y
            ),
            SimulationError::NonFiniteTemperature { object, position } => write!(
                f,
                "Non-finite temperature in '{object}' at ({}, {})",
                position.x, position.y
            ),
        }
    }
}

impl std::error::Error for SimulationError {}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field holds a value the engine cannot run with
    Invalid { field: &'static str, reason: String },
    /// The configuration file could not be read
    Io(String),
    /// The configuration document could not be parsed
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { field, reason } => write!(f, "Invalid {field}: {reason}"),
            ConfigError::Io(msg) => write!(f, "Failed to read config: {msg}"),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors returned by [`crate::simulation::Engine`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The operation requires the engine to be Stopped or Paused
    Running,
    /// `start` was called while the engine was already Running
    AlreadyRunning,
    Config(ConfigError),
    Registry(RegistryError),
    Material(MaterialError),
    Simulation(SimulationError),
    Persistence(PersistenceError),
    /// The worker pool could not be built
    ThreadPool(String),
    /// The simulation thread could not be spawned
    Spawn(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Running => write!(f, "Operation not allowed while the engine is running"),
            EngineError::AlreadyRunning => write!(f, "Engine is already running"),
            EngineError::Config(e) => write!(f, "{e}"),
            EngineError::Registry(e) => write!(f, "{e}"),
            EngineError::Material(e) => write!(f, "{e}"),
            EngineError::Simulation(e) => write!(f, "{e}"),
            EngineError::Persistence(e) => write!(f, "{e}"),
            EngineError::ThreadPool(msg) => write!(f, "Failed to build worker pool: {msg}"),
            EngineError::Spawn(msg) => write!(f, "Failed to spawn simulation thread: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(e) => Some(e),
            EngineError::Registry(e) => Some(e),
            EngineError::Material(e) => Some(e),
            EngineError::Simulation(e) => Some(e),
            EngineError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<RegistryError> for EngineError {
    fn from(e: RegistryError) -> Self {
        EngineError::Registry(e)
    }
}

impl From<PersistenceError> for EngineError {
    fn from(e: PersistenceError) -> Self {
        EngineError::Persistence(e)
    }
}

impl From<MaterialError> for EngineError {
    fn from(e: MaterialError) -> Self {
        EngineError::Material(e)
    }
}

impl From<SimulationError> for EngineError {
    fn from(e: SimulationError) -> Self {
        EngineError::Simulation(e)
    }
}
