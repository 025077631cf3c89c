//! Core types and utilities

pub mod material;
pub mod point;
pub mod units;

pub use material::{Material, MaterialLibrary, Phase, Rgb};
pub use point::{grid_key, snap_to_grid, Point};
pub use units::*;
