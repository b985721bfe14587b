//! FILENAME: core/cube-engine/src/dimension/time.rs
//! Time dimension: a day range enumerated at a calendar periodicity.
//!
//! Items are never stored by the caller. They are derived from `[start, end]`
//! and the root periodicity when the dimension is built, so two time
//! dimensions with the same range and root are equal.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use super::timeslot::{Periodicity, TimeSlot};
use super::ALL;
use crate::error::{CubeError, CubeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeDimension {
    id: String,
    label: String,
    root: Periodicity,
    start: NaiveDate,
    end: NaiveDate,

    // Derived from the range and root.
    slots: Vec<TimeSlot>,
    items: Vec<String>,
    items_to_idx: FxHashMap<String, usize>,
    group_indexes: FxHashMap<Periodicity, Vec<usize>>,
}

impl TimeDimension {
    /// `start` and `end` are slot labels of any periodicity; the range runs
    /// from the first day of `start` to the last day of `end`.
    pub fn new(id: &str, root_attribute: &str, start: &str, end: &str) -> CubeResult<Self> {
        let root = parse_attribute(id, root_attribute)?;
        let start = TimeSlot::parse(start)?.first_date();
        let end = TimeSlot::parse(end)?.last_date();
        Ok(TimeDimension::from_range(id, id, root, start, end))
    }

    pub(crate) fn from_range(id: &str, label: &str, root: Periodicity, start: NaiveDate, end: NaiveDate) -> Self {
        let slots = if start > end {
            Vec::new()
        } else {
            enumerate(TimeSlot::from_date(start, root), TimeSlot::from_date(end, root))
        };
        let items: Vec<String> = slots.iter().map(TimeSlot::value).collect();
        let items_to_idx = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), i))
            .collect();
        let group_indexes = std::iter::once(root)
            .chain(root.upper())
            .map(|p| (p, parent_indexes(&slots, p)))
            .collect();
        TimeDimension {
            id: id.to_string(),
            label: label.to_string(),
            root,
            start,
            end,
            slots,
            items,
            items_to_idx,
            group_indexes,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> Periodicity {
        self.root
    }

    pub fn root_attribute(&self) -> &str {
        self.root.name()
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn items_to_idx(&self) -> &FxHashMap<String, usize> {
        &self.items_to_idx
    }

    pub fn attributes(&self) -> Vec<String> {
        std::iter::once(self.root)
            .chain(self.root.upper())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Position among `items_at(attribute)` of the period holding each root item.
    pub fn group_indexes(&self, attribute: &str) -> CubeResult<&[usize]> {
        let periodicity = self.check_attribute(attribute)?;
        self.group_indexes
            .get(&periodicity)
            .map(Vec::as_slice)
            .ok_or_else(|| CubeError::unknown_attribute(&self.id, attribute))
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        Periodicity::parse(attribute).is_some_and(|p| self.root.rolls_up_to(p))
    }

    pub fn items_at(&self, attribute: &str) -> CubeResult<Vec<String>> {
        let periodicity = self.check_attribute(attribute)?;
        if periodicity == self.root {
            return Ok(self.items.clone());
        }
        Ok(self.slots_at(periodicity).iter().map(TimeSlot::value).collect())
    }

    pub fn group_items(&self, attribute: &str) -> CubeResult<Vec<String>> {
        let periodicity = self.check_attribute(attribute)?;
        Ok(self
            .slots
            .iter()
            .map(|slot| slot.to_parent(periodicity).value())
            .collect())
    }

    pub fn entries(&self, attribute: &str) -> CubeResult<Vec<(String, String)>> {
        let periodicity = self.check_attribute(attribute)?;
        Ok(self
            .slots_at(periodicity)
            .iter()
            .map(|slot| (slot.value(), slot.humanize()))
            .collect())
    }

    // ------------------------------------------------------------------------
    // Reshaping
    // ------------------------------------------------------------------------

    /// Time dices must select a contiguous run of periods.
    pub fn dice(&self, attribute: &str, items: &[String], reorder: bool) -> CubeResult<Self> {
        let periodicity = parse_attribute(&self.id, attribute)?;
        if periodicity == Periodicity::All {
            return Ok(if items.iter().any(|i| i == ALL) {
                self.clone()
            } else {
                self.restrict(NaiveDate::MAX, NaiveDate::MIN)
            });
        }

        match items {
            [] => return Ok(self.restrict(NaiveDate::MAX, NaiveDate::MIN)),
            [item] => return self.dice_range(attribute, Some(item.as_str()), Some(item.as_str())),
            _ => {}
        }

        let mut slots = items
            .iter()
            .map(|item| self.parse_slot(item, periodicity))
            .collect::<CubeResult<Vec<_>>>()?;
        if !reorder {
            slots.sort_by_key(|slot| slot.first_date());
            slots.dedup();
        }
        if slots.windows(2).any(|pair| pair[0].next() != pair[1]) {
            return Err(CubeError::UnsupportedOperation(format!(
                "time dimension {} can only be diced with contiguous {} items",
                self.id, attribute
            )));
        }

        match (slots.first(), slots.last()) {
            (Some(first), Some(last)) => Ok(self.restrict(first.first_date(), last.last_date())),
            _ => Ok(self.clone()),
        }
    }

    pub fn dice_range(&self, attribute: &str, start: Option<&str>, end: Option<&str>) -> CubeResult<Self> {
        let periodicity = parse_attribute(&self.id, attribute)?;
        if periodicity == Periodicity::All {
            return Ok(self.clone());
        }
        let start = match start {
            Some(item) => self.parse_slot(item, periodicity)?.first_date(),
            None => self.start,
        };
        let end = match end {
            Some(item) => self.parse_slot(item, periodicity)?.last_date(),
            None => self.end,
        };
        Ok(self.restrict(start, end))
    }

    pub fn drill_up(&self, attribute: &str) -> CubeResult<Self> {
        let periodicity = self.check_attribute(attribute)?;
        if periodicity == self.root {
            return Ok(self.clone());
        }
        Ok(TimeDimension::from_range(&self.id, &self.label, periodicity, self.start, self.end))
    }

    pub fn drill_down(&self, attribute: &str) -> CubeResult<Self> {
        let periodicity = parse_attribute(&self.id, attribute)?;
        if periodicity == self.root {
            return Ok(self.clone());
        }
        if !periodicity.rolls_up_to(self.root) {
            return Err(CubeError::UnsupportedOperation(format!(
                "cannot drill dimension {} down from {} to {}",
                self.id, self.root, periodicity
            )));
        }
        Ok(TimeDimension::from_range(&self.id, &self.label, periodicity, self.start, self.end))
    }

    /// Covers both ranges at the coarser of the two roots.
    pub fn union(&self, other: &TimeDimension) -> CubeResult<Self> {
        let root = self.common_root(other)?;
        let (start, end) = if self.is_empty() {
            (other.start, other.end)
        } else if other.is_empty() {
            (self.start, self.end)
        } else {
            (self.start.min(other.start), self.end.max(other.end))
        };
        Ok(TimeDimension::from_range(&self.id, &self.label, root, start, end))
    }

    /// Overlap of both ranges at the coarser of the two roots.
    pub fn intersect(&self, other: &TimeDimension) -> CubeResult<Self> {
        let root = self.common_root(other)?;
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Ok(TimeDimension::from_range(&self.id, &self.label, root, start, end))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn check_attribute(&self, attribute: &str) -> CubeResult<Periodicity> {
        let periodicity = parse_attribute(&self.id, attribute)?;
        if self.root.rolls_up_to(periodicity) {
            Ok(periodicity)
        } else {
            Err(CubeError::unknown_attribute(&self.id, attribute))
        }
    }

    fn parse_slot(&self, item: &str, periodicity: Periodicity) -> CubeResult<TimeSlot> {
        let slot = TimeSlot::parse(item)?;
        if slot.periodicity() != periodicity {
            return Err(CubeError::InvalidTimeSlot(format!(
                "{} is not a {} of dimension {}",
                item, periodicity, self.id
            )));
        }
        Ok(slot)
    }

    /// Periods at a coarser periodicity, derived from the root periods so
    /// every root item has exactly one parent in the list.
    fn slots_at(&self, periodicity: Periodicity) -> Vec<TimeSlot> {
        match (self.slots.first(), self.slots.last()) {
            (Some(first), Some(last)) => enumerate(first.to_parent(periodicity), last.to_parent(periodicity)),
            _ => Vec::new(),
        }
    }

    /// Narrows the day range; returns an equal dimension when nothing changes.
    fn restrict(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let start = self.start.max(start);
        let end = self.end.min(end);
        if start == self.start && end == self.end {
            return self.clone();
        }
        TimeDimension::from_range(&self.id, &self.label, self.root, start, end)
    }

    fn common_root(&self, other: &TimeDimension) -> CubeResult<Periodicity> {
        if self.id != other.id {
            return Err(CubeError::incompatible(
                &self.id,
                format!("cannot combine with dimension {}", other.id),
            ));
        }
        if self.root.rolls_up_to(other.root) {
            Ok(other.root)
        } else if other.root.rolls_up_to(self.root) {
            Ok(self.root)
        } else {
            Err(CubeError::incompatible(
                &self.id,
                format!("periodicities {} and {} do not nest", self.root, other.root),
            ))
        }
    }
}

fn parse_attribute(id: &str, attribute: &str) -> CubeResult<Periodicity> {
    Periodicity::parse(attribute).ok_or_else(|| CubeError::unknown_attribute(id, attribute))
}

/// Root slots are contiguous, so their parents come in runs matching `slots_at`.
fn parent_indexes(slots: &[TimeSlot], periodicity: Periodicity) -> Vec<usize> {
    let mut indexes = Vec::with_capacity(slots.len());
    let mut previous: Option<TimeSlot> = None;
    let mut index = 0;
    for slot in slots {
        let parent = slot.to_parent(periodicity);
        if previous.is_some_and(|p| p != parent) {
            index += 1;
        }
        previous = Some(parent);
        indexes.push(index);
    }
    indexes
}

/// Slots from `first` to `last` inclusive.
fn enumerate(first: TimeSlot, last: TimeSlot) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    let mut slot = first;
    loop {
        slots.push(slot);
        if slot.first_date() >= last.first_date() || slot.periodicity() == Periodicity::All {
            break;
        }
        slot = slot.next();
    }
    slots
}
