//! Thermal Simulation Core Library
//!
//! A discrete-time 2D heat simulation: rectangular objects made of unit grain
//! squares exchange heat by conduction, convection and radiation, and
//! phase-tracking cells melt, boil, condense and freeze with latent heat.
//!
//! ## Structure
//!
//! - [`core_types`]: units, grid points, materials
//! - [`grid`]: cells, composite objects and the object registry
//! - [`physics`]: the three heat-transfer managers and the phase state machine
//! - [`optimizer`]: adjacency and line-of-sight precomputation
//! - [`simulation`]: configuration, persistence and the [`Engine`] scheduler
//!
//! ## Quick start
//!
//! ```no_run
//! use thedyx_core::{CompositeObject, Engine, Kelvin, Point, SimulationConfig};
//!
//! let engine = Engine::new(SimulationConfig::default()).unwrap();
//! let copper = engine.materials().get("Copper").unwrap();
//! engine
//!     .add_object(CompositeObject::rectangle(
//!         "Plate",
//!         Point::new(0.0, 0.0),
//!         8,
//!         4,
//!         copper,
//!         Kelvin::new(350.0),
//!     ))
//!     .unwrap();
//! engine.prepare().unwrap();
//! engine.run_frames(60).unwrap();
//! ```

pub mod core_types;
pub mod error;
pub mod grid;
pub mod optimizer;
pub mod physics;
pub mod simulation;

pub use core_types::{grid_key, Joules, Kelvin, Material, MaterialLibrary, Phase, Point, Rgb};
pub use error::{ConfigError, EngineError, MaterialError, RegistryError, SimulationError};
pub use grid::{
    Cell, CellRef, CompositeObject, ObjectChange, ObjectKind, ObjectRegistry, ObjectStats,
    TemperatureRange,
};
pub use optimizer::{OptimizerProgress, OptimizerReport};
pub use physics::{ConductionManager, ConvectionManager, HeatTransfer, RadiationManager};
pub use simulation::{
    Engine, ErrorSink, ObjectRecord, PersistenceError, Scene, SimulationConfig, SimulationMode,
};
