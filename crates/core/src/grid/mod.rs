//! Cells, composite objects and the object registry

pub mod cell;
pub mod object;
pub mod registry;

pub use cell::{positions_touch, Cell, CellLinks, CellRef, CellSnapshot};
pub use object::{CompositeObject, ObjectChange, ObjectKind, ObjectStats};
pub use registry::{ObjectRegistry, TemperatureRange};
