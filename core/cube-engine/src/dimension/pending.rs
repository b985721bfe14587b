//! FILENAME: core/cube-engine/src/dimension/pending.rs
//! Placeholder axis used while a dimension is inserted into a cube.
//!
//! Before insertion the existing data has no coordinate on the new axis, so
//! it is addressed through a single `_total` bucket at the `all` attribute.
//! Drilling that bucket down to the inserted dimension is the only thing a
//! pending dimension can do.

use super::{Axis, Dimension, ALL};
use crate::error::{CubeError, CubeResult};

pub const TOTAL_ITEM: &str = "_total";

#[derive(Debug, Clone)]
pub struct PendingDimension<'a> {
    target: &'a Dimension,
    items: Vec<String>,
}

impl<'a> PendingDimension<'a> {
    pub fn new(target: &'a Dimension) -> Self {
        PendingDimension {
            target,
            items: vec![TOTAL_ITEM.to_string()],
        }
    }

    /// Resolves to the dimension being inserted.
    pub fn drill_down(&self, attribute: &str) -> CubeResult<Dimension> {
        if attribute == self.target.root_attribute() {
            Ok(self.target.clone())
        } else {
            Err(self.unsupported("drill_down to another attribute"))
        }
    }

    pub fn drill_up(&self, _attribute: &str) -> CubeResult<Dimension> {
        Err(self.unsupported("drill_up"))
    }

    pub fn dice(&self, _attribute: &str, _items: &[String], _reorder: bool) -> CubeResult<Dimension> {
        Err(self.unsupported("dice"))
    }

    pub fn dice_range(&self, _attribute: &str, _start: Option<&str>, _end: Option<&str>) -> CubeResult<Dimension> {
        Err(self.unsupported("dice_range"))
    }

    pub fn union(&self, _other: &Dimension) -> CubeResult<Dimension> {
        Err(self.unsupported("union"))
    }

    pub fn intersect(&self, _other: &Dimension) -> CubeResult<Dimension> {
        Err(self.unsupported("intersect"))
    }

    fn unsupported(&self, operation: &str) -> CubeError {
        CubeError::UnsupportedOperation(format!(
            "{} on pending dimension {}",
            operation,
            self.target.id()
        ))
    }
}

impl Axis for PendingDimension<'_> {
    fn id(&self) -> &str {
        self.target.id()
    }

    fn root_attribute(&self) -> &str {
        ALL
    }

    fn items(&self) -> &[String] {
        &self.items
    }

    fn index_of(&self, item: &str) -> Option<usize> {
        (item == TOTAL_ITEM).then_some(0)
    }

    fn bucket_map(&self, _coarser: &dyn Axis) -> CubeResult<Vec<Option<usize>>> {
        Err(self.unsupported("bucket_map"))
    }
}
