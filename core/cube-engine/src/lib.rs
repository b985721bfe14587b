//! FILENAME: core/cube-engine/src/lib.rs
//! PURPOSE: Main library entry point for the in-memory OLAP cube engine.
//! CONTEXT: Numeric measures indexed by the cross product of generic and
//! time dimensions, with slicing, dicing, roll-up, drill-down, dimension
//! insertion and removal, and composition of whole cubes. NaN marks an
//! absent value; an explicit zero is present.
//!
//! LAYERS: Dimension --> Radix (position encoding) --> MeasureStore --> Cube
//!
//! Formats: `codec` (whole-cube snapshots), `formatter` (nested arrays and
//! objects), `definition` (cube shape as JSON).

#[macro_use]
pub mod logging;

pub mod codec;
pub mod cube;
pub mod definition;
pub mod dimension;
pub mod error;
pub mod formatter;
pub mod position;
pub mod store;

// Re-export commonly used types at the crate root
pub use codec::FORMAT_VERSION;
pub use cube::{AggregationRules, Cube, DimensionItems, TOTAL_SUFFIX};
pub use definition::{
    AttributeDefinition, ComputedMeasureDefinition, CubeDefinition, DimensionDefinition,
    StoredMeasureDefinition,
};
pub use dimension::{
    Axis, Dimension, GenericDimension, Level, PendingDimension, Periodicity, TimeDimension,
    TimeSlot, WeekStart, ALL,
};
pub use error::{CubeError, CubeResult};
pub use formatter::{NestedArray, NestedObject};
pub use position::{Coordinates, Radix};
pub use store::{AggregationMethod, DefaultValue, MeasureStore, MeasureType};
