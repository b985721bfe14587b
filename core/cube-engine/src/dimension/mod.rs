//! FILENAME: core/cube-engine/src/dimension/mod.rs
//! Dimensions: the axes of a cube.
//!
//! A `Dimension` is either a categorical `GenericDimension` or a calendar
//! `TimeDimension`. Both are immutable values; every reshaping operation
//! returns a new dimension, structurally equal to the input when nothing
//! changed. Stores never look at dimension variants, only at the `Axis`
//! view: item lists plus a bucket mapping towards a coarser axis.

pub mod generic;
pub mod pending;
pub mod time;
pub mod timeslot;

pub use generic::{GenericDimension, Level};
pub use pending::PendingDimension;
pub use time::TimeDimension;
pub use timeslot::{Periodicity, TimeSlot, WeekStart};

use rustc_hash::FxHashMap;

use crate::error::{CubeError, CubeResult};

/// Name of the top attribute of every dimension, and of its only item.
pub const ALL: &str = "all";

// ============================================================================
// AXIS
// ============================================================================

/// What a store needs to know about one axis of a cube.
pub trait Axis {
    fn id(&self) -> &str;

    fn root_attribute(&self) -> &str;

    /// Root items in radix order.
    fn items(&self) -> &[String];

    fn num_items(&self) -> usize {
        self.items().len()
    }

    fn index_of(&self, item: &str) -> Option<usize>;

    /// For each root item, the index of the `coarser` item it rolls up into.
    fn bucket_map(&self, coarser: &dyn Axis) -> CubeResult<Vec<Option<usize>>>;
}

// ============================================================================
// DIMENSION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    Generic(GenericDimension),
    Time(TimeDimension),
}

impl Dimension {
    /// Categorical dimension with a single attribute.
    pub fn generic<I, S>(id: &str, root_attribute: &str, items: I) -> CubeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = items.into_iter().map(Into::into).collect();
        Ok(Dimension::Generic(GenericDimension::new(id, root_attribute, items)?))
    }

    pub fn time(id: &str, root_attribute: &str, start: &str, end: &str) -> CubeResult<Self> {
        Ok(Dimension::Time(TimeDimension::new(id, root_attribute, start, end)?))
    }

    pub fn id(&self) -> &str {
        match self {
            Dimension::Generic(d) => d.id(),
            Dimension::Time(d) => d.id(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Dimension::Generic(d) => d.label(),
            Dimension::Time(d) => d.label(),
        }
    }

    pub fn root_attribute(&self) -> &str {
        match self {
            Dimension::Generic(d) => d.root_attribute(),
            Dimension::Time(d) => d.root_attribute(),
        }
    }

    /// Root attribute first, `all` last.
    pub fn attributes(&self) -> Vec<String> {
        match self {
            Dimension::Generic(d) => d.attributes(),
            Dimension::Time(d) => d.attributes(),
        }
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        match self {
            Dimension::Generic(d) => d.has_attribute(attribute),
            Dimension::Time(d) => d.has_attribute(attribute),
        }
    }

    pub fn items(&self) -> &[String] {
        match self {
            Dimension::Generic(d) => d.items(),
            Dimension::Time(d) => d.items(),
        }
    }

    pub fn num_items(&self) -> usize {
        self.items().len()
    }

    pub fn items_to_idx(&self) -> &FxHashMap<String, usize> {
        match self {
            Dimension::Generic(d) => d.items_to_idx(),
            Dimension::Time(d) => d.items_to_idx(),
        }
    }

    pub fn root_index_of(&self, item: &str) -> Option<usize> {
        self.items_to_idx().get(item).copied()
    }

    /// Items at any attribute of the hierarchy.
    pub fn items_at(&self, attribute: &str) -> CubeResult<Vec<String>> {
        match self {
            Dimension::Generic(d) => d.items_at(attribute),
            Dimension::Time(d) => d.items_at(attribute),
        }
    }

    /// For every root item, the `attribute` item it rolls up into.
    pub fn group_items(&self, attribute: &str) -> CubeResult<Vec<String>> {
        match self {
            Dimension::Generic(d) => d.group_items(attribute),
            Dimension::Time(d) => d.group_items(attribute),
        }
    }

    /// For every root index, the index of its bucket among `items_at(attribute)`.
    pub fn group_index_map(&self, attribute: &str) -> CubeResult<&[usize]> {
        match self {
            Dimension::Generic(d) => d.group_indexes(attribute),
            Dimension::Time(d) => d.group_indexes(attribute),
        }
    }

    pub fn group_index_from_root_index(&self, attribute: &str, root_index: usize) -> CubeResult<usize> {
        self.group_index_map(attribute)?
            .get(root_index)
            .copied()
            .ok_or_else(|| CubeError::unknown_item(self.id(), &root_index.to_string()))
    }

    pub fn group_item_from_root_item(&self, attribute: &str, item: &str) -> CubeResult<String> {
        let index = self
            .root_index_of(item)
            .ok_or_else(|| CubeError::unknown_item(self.id(), item))?;
        let mut groups = self.group_items(attribute)?;
        Ok(groups.swap_remove(index))
    }

    /// `(item, display label)` pairs at `attribute`.
    pub fn entries(&self, attribute: &str) -> CubeResult<Vec<(String, String)>> {
        match self {
            Dimension::Generic(d) => d.entries(attribute),
            Dimension::Time(d) => d.entries(attribute),
        }
    }

    pub fn dice(&self, attribute: &str, items: &[String], reorder: bool) -> CubeResult<Self> {
        match self {
            Dimension::Generic(d) => Ok(Dimension::Generic(d.dice(attribute, items, reorder)?)),
            Dimension::Time(d) => Ok(Dimension::Time(d.dice(attribute, items, reorder)?)),
        }
    }

    pub fn dice_range(&self, attribute: &str, start: Option<&str>, end: Option<&str>) -> CubeResult<Self> {
        match self {
            Dimension::Generic(d) => Ok(Dimension::Generic(d.dice_range(attribute, start, end)?)),
            Dimension::Time(d) => Ok(Dimension::Time(d.dice_range(attribute, start, end)?)),
        }
    }

    pub fn drill_up(&self, attribute: &str) -> CubeResult<Self> {
        match self {
            Dimension::Generic(d) => Ok(Dimension::Generic(d.drill_up(attribute)?)),
            Dimension::Time(d) => Ok(Dimension::Time(d.drill_up(attribute)?)),
        }
    }

    pub fn drill_down(&self, attribute: &str) -> CubeResult<Self> {
        match self {
            Dimension::Generic(d) => Ok(Dimension::Generic(d.drill_down(attribute)?)),
            Dimension::Time(d) => Ok(Dimension::Time(d.drill_down(attribute)?)),
        }
    }

    pub fn union(&self, other: &Dimension) -> CubeResult<Self> {
        match (self, other) {
            (Dimension::Generic(a), Dimension::Generic(b)) => Ok(Dimension::Generic(a.union(b)?)),
            (Dimension::Time(a), Dimension::Time(b)) => Ok(Dimension::Time(a.union(b)?)),
            _ => Err(self.variant_mismatch(other)),
        }
    }

    pub fn intersect(&self, other: &Dimension) -> CubeResult<Self> {
        match (self, other) {
            (Dimension::Generic(a), Dimension::Generic(b)) => Ok(Dimension::Generic(a.intersect(b)?)),
            (Dimension::Time(a), Dimension::Time(b)) => Ok(Dimension::Time(a.intersect(b)?)),
            _ => Err(self.variant_mismatch(other)),
        }
    }

    fn variant_mismatch(&self, other: &Dimension) -> CubeError {
        CubeError::incompatible(
            self.id(),
            format!("cannot combine a generic and a time dimension ({})", other.id()),
        )
    }
}

impl Axis for Dimension {
    fn id(&self) -> &str {
        Dimension::id(self)
    }

    fn root_attribute(&self) -> &str {
        Dimension::root_attribute(self)
    }

    fn items(&self) -> &[String] {
        Dimension::items(self)
    }

    fn index_of(&self, item: &str) -> Option<usize> {
        self.root_index_of(item)
    }

    fn bucket_map(&self, coarser: &dyn Axis) -> CubeResult<Vec<Option<usize>>> {
        // One `all` bucket, or none once the coarser axis is empty
        if coarser.root_attribute() == ALL {
            let bucket = (coarser.num_items() > 0).then_some(0);
            return Ok(vec![bucket; self.num_items()]);
        }
        let groups = self.group_items(coarser.root_attribute()).map_err(|_| {
            CubeError::incompatible(
                self.id(),
                format!(
                    "{} does not roll up into {}",
                    Dimension::root_attribute(self),
                    coarser.root_attribute()
                ),
            )
        })?;
        Ok(groups.iter().map(|group| coarser.index_of(group)).collect())
    }
}
