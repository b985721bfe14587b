//! FILENAME: core/cube-engine/src/store.rs
//! Measure Store - sparse values of one measure over every cell of a cube.
//!
//! Occupied cells live in a hash map keyed by linear cell index; every other
//! cell reads as the store default (0 or NaN). All writes go through
//! `write`, which coerces to the declared type and unsets a cell when the
//! value equals the default, so "written default" and "never written" can
//! not be told apart.
//!
//! Reshape operations (`reorder`, `dice`, `drill_up`, `drill_down`) are pure:
//! they read the occupied cells and build a new store for the new axes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dimension::{Axis, ALL};
use crate::error::{CubeError, CubeResult};
use crate::position::{Coordinates, Radix};

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Declared numeric type of a stored measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureType {
    Int32,
    Uint32,
    #[default]
    Float32,
    Float64,
}

impl MeasureType {
    pub fn is_integer(&self) -> bool {
        matches!(self, MeasureType::Int32 | MeasureType::Uint32)
    }

    /// Bytes per value in the serialized buffers.
    pub fn byte_width(&self) -> usize {
        match self {
            MeasureType::Float64 => 8,
            _ => 4,
        }
    }

    /// Converts to the nearest value the type can hold: integers truncate
    /// toward zero and wrap modulo 2^32, non-finite integers become 0.
    pub fn coerce(&self, value: f64) -> f64 {
        match self {
            MeasureType::Int32 if value.is_finite() => (value.trunc() as i64) as i32 as f64,
            MeasureType::Uint32 if value.is_finite() => (value.trunc() as i64) as u32 as f64,
            MeasureType::Int32 | MeasureType::Uint32 => 0.0,
            MeasureType::Float32 => value as f32 as f64,
            MeasureType::Float64 => value,
        }
    }

    /// Appends the little-endian encoding of an already coerced value.
    pub fn write_le(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            MeasureType::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            MeasureType::Uint32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            MeasureType::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            MeasureType::Float64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    /// Reads one value; `bytes` must be exactly `byte_width()` long.
    pub fn read_le(&self, bytes: &[u8]) -> Option<f64> {
        Some(match self {
            MeasureType::Int32 => i32::from_le_bytes(bytes.try_into().ok()?) as f64,
            MeasureType::Uint32 => u32::from_le_bytes(bytes.try_into().ok()?) as f64,
            MeasureType::Float32 => f32::from_le_bytes(bytes.try_into().ok()?) as f64,
            MeasureType::Float64 => f64::from_le_bytes(bytes.try_into().ok()?),
        })
    }
}

/// Value of an unset cell. Only 0 and NaN are allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultValue {
    #[default]
    Zero,
    NaN,
}

impl DefaultValue {
    pub fn value(&self) -> f64 {
        match self {
            DefaultValue::Zero => 0.0,
            DefaultValue::NaN => f64::NAN,
        }
    }

    /// True if writing `value` must unset the cell.
    fn matches(&self, value: f64) -> bool {
        match self {
            DefaultValue::Zero => value == 0.0,
            DefaultValue::NaN => value.is_nan(),
        }
    }
}

impl TryFrom<f64> for DefaultValue {
    type Error = CubeError;

    fn try_from(value: f64) -> CubeResult<Self> {
        if value.is_nan() {
            Ok(DefaultValue::NaN)
        } else if value == 0.0 {
            Ok(DefaultValue::Zero)
        } else {
            Err(CubeError::InvalidDefaultValue(value))
        }
    }
}

/// How cells are combined on roll-up and split on drill-down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    #[default]
    Sum,
    Average,
    Highest,
    Lowest,
    First,
    Last,
    Product,
}

impl AggregationMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggregationMethod::Sum),
            "average" => Some(AggregationMethod::Average),
            "highest" => Some(AggregationMethod::Highest),
            "lowest" => Some(AggregationMethod::Lowest),
            "first" => Some(AggregationMethod::First),
            "last" => Some(AggregationMethod::Last),
            "product" => Some(AggregationMethod::Product),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationMethod::Sum => "sum",
            AggregationMethod::Average => "average",
            AggregationMethod::Highest => "highest",
            AggregationMethod::Lowest => "lowest",
            AggregationMethod::First => "first",
            AggregationMethod::Last => "last",
            AggregationMethod::Product => "product",
        }
    }
}

/// Running state of one destination cell during a roll-up.
#[derive(Debug, Clone, Copy)]
struct DrillAccumulator {
    value: f64,
    count: u32,
}

impl DrillAccumulator {
    fn new(value: f64) -> Self {
        DrillAccumulator { value, count: 1 }
    }

    fn add(&mut self, value: f64, method: AggregationMethod) {
        self.count += 1;
        self.value = match method {
            AggregationMethod::Sum | AggregationMethod::Average => self.value + value,
            AggregationMethod::Product => self.value * value,
            AggregationMethod::Highest => nan_poisoned(self.value, value, f64::max),
            AggregationMethod::Lowest => nan_poisoned(self.value, value, f64::min),
            AggregationMethod::First => self.value,
            AggregationMethod::Last => value,
        };
    }

    fn compute(&self, method: AggregationMethod) -> f64 {
        match method {
            AggregationMethod::Average => self.value / self.count as f64,
            _ => self.value,
        }
    }
}

fn nan_poisoned(a: f64, b: f64, f: fn(f64, f64) -> f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        f(a, b)
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct MeasureStore {
    size: usize,
    measure_type: MeasureType,
    default: DefaultValue,
    cells: FxHashMap<usize, f64>,
}

impl MeasureStore {
    pub fn new(size: usize, measure_type: MeasureType, default: DefaultValue) -> Self {
        MeasureStore {
            size,
            measure_type,
            default,
            cells: FxHashMap::default(),
        }
    }

    /// Empty store with the same type and default.
    pub fn empty_like(&self, size: usize) -> Self {
        MeasureStore::new(size, self.measure_type, self.default)
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    pub fn default_value(&self) -> DefaultValue {
        self.default
    }

    /// Dense size in bytes.
    pub fn byte_length(&self) -> usize {
        self.size * self.measure_type.byte_width()
    }

    /// Value of a cell; unset and out-of-range cells read as the default.
    pub fn get(&self, index: usize) -> f64 {
        self.cells
            .get(&index)
            .copied()
            .unwrap_or_else(|| self.default.value())
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.cells.contains_key(&index)
    }

    /// Writes one cell. Out-of-range indexes are ignored.
    pub fn set(&mut self, index: usize, value: f64) {
        if index < self.size {
            self.write(index, value);
        }
    }

    /// Clears one cell back to the default.
    pub fn unset(&mut self, index: usize) {
        self.cells.remove(&index);
    }

    /// The single write path: type coercion, then default collapse.
    fn write(&mut self, index: usize, value: f64) {
        let value = self.measure_type.coerce(value);
        if self.default.matches(value) {
            self.cells.remove(&index);
        } else {
            self.cells.insert(index, value);
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.cells.clear();
        if !self.default.matches(self.measure_type.coerce(value)) {
            for index in 0..self.size {
                self.write(index, value);
            }
        }
    }

    pub fn data(&self) -> Vec<f64> {
        let mut data = vec![self.default.value(); self.size];
        for (&index, &value) in &self.cells {
            data[index] = value;
        }
        data
    }

    pub fn set_data(&mut self, values: &[f64]) -> CubeResult<()> {
        if values.len() != self.size {
            return Err(CubeError::SizeMismatch {
                expected: self.size,
                actual: values.len(),
            });
        }
        self.cells.clear();
        for (index, &value) in values.iter().enumerate() {
            self.write(index, value);
        }
        Ok(())
    }

    /// Occupied cell indexes in ascending order.
    pub fn occupied(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self.cells.keys().copied().collect();
        indexes.sort_unstable();
        indexes
    }

    /// Occupied cells in ascending index order.
    pub fn entries(&self) -> Vec<(usize, f64)> {
        let mut entries: Vec<(usize, f64)> = self.cells.iter().map(|(&i, &v)| (i, v)).collect();
        entries.sort_unstable_by_key(|(i, _)| *i);
        entries
    }

    /// Sum of the occupied cells, or the default when none is set.
    pub fn total(&self) -> f64 {
        if self.cells.is_empty() {
            self.default.value()
        } else {
            self.entries().iter().map(|(_, v)| v).sum()
        }
    }

    // ------------------------------------------------------------------------
    // Reshaping
    // ------------------------------------------------------------------------

    /// Same axes in another order.
    pub fn reorder(&self, old_dims: &[&dyn Axis], new_dims: &[&dyn Axis]) -> CubeResult<Self> {
        let permutation = new_dims
            .iter()
            .map(|new| {
                old_dims
                    .iter()
                    .position(|old| old.id() == new.id())
                    .ok_or_else(|| CubeError::UnknownDimension(new.id().to_string()))
            })
            .collect::<CubeResult<Vec<usize>>>()?;
        let old_radix = Radix::from_axes(old_dims);
        let new_radix = Radix::from_axes(new_dims);

        let mut store = self.empty_like(new_radix.size());
        for (&index, &value) in &self.cells {
            let old = old_radix.decompose(index);
            let new: Coordinates = permutation.iter().map(|&p| old[p]).collect();
            store.cells.insert(new_radix.compose(&new), value);
        }
        Ok(store)
    }

    /// Keeps the cells whose items survive in `new_dims`, re-addressed.
    pub fn dice(&self, old_dims: &[&dyn Axis], new_dims: &[&dyn Axis]) -> CubeResult<Self> {
        check_same_axes(old_dims, new_dims)?;
        let maps: Vec<Vec<Option<usize>>> = old_dims
            .iter()
            .zip(new_dims.iter())
            .map(|(old, new)| label_map(*old, *new))
            .collect();
        let old_radix = Radix::from_axes(old_dims);
        let new_radix = Radix::from_axes(new_dims);

        let mut store = self.empty_like(new_radix.size());
        for (&index, &value) in &self.cells {
            if let Some(new) = remap(&old_radix.decompose(index), &maps) {
                store.cells.insert(new_radix.compose(&new), value);
            }
        }
        Ok(store)
    }

    /// Aggregates cells that land in the same coarser cell.
    pub fn drill_up(
        &self,
        old_dims: &[&dyn Axis],
        new_dims: &[&dyn Axis],
        method: AggregationMethod,
    ) -> CubeResult<Self> {
        check_same_axes(old_dims, new_dims)?;
        let maps = old_dims
            .iter()
            .zip(new_dims.iter())
            .map(|(old, new)| axis_map(*old, *new))
            .collect::<CubeResult<Vec<_>>>()?;
        let old_radix = Radix::from_axes(old_dims);
        let new_radix = Radix::from_axes(new_dims);

        // Ascending source order decides first/last
        let mut accumulators: FxHashMap<usize, DrillAccumulator> = FxHashMap::default();
        for (index, value) in self.entries() {
            let Some(new) = remap(&old_radix.decompose(index), &maps) else {
                continue;
            };
            accumulators
                .entry(new_radix.compose(&new))
                .and_modify(|acc| acc.add(value, method))
                .or_insert_with(|| DrillAccumulator::new(value));
        }

        let mut store = self.empty_like(new_radix.size());
        for (index, acc) in accumulators {
            store.write(index, acc.compute(method));
        }
        Ok(store)
    }

    /// Splits every occupied cell over its finer children.
    ///
    /// With `distributions`, each child gets `parent * weight`. Otherwise an
    /// integer `Sum` is spread so the children add up exactly to the parent,
    /// a float `Sum` is divided evenly, and every other method copies the
    /// parent into each child.
    pub fn drill_down(
        &self,
        old_dims: &[&dyn Axis],
        new_dims: &[&dyn Axis],
        method: AggregationMethod,
        distributions: Option<&[f64]>,
    ) -> CubeResult<Self> {
        check_same_axes(old_dims, new_dims)?;
        let old_radix = Radix::from_axes(old_dims);
        let new_radix = Radix::from_axes(new_dims);

        // children[axis][old item] = new items below it
        let mut children: Vec<Vec<Vec<usize>>> = Vec::with_capacity(new_dims.len());
        for (old, new) in old_dims.iter().zip(new_dims.iter()) {
            let mut below = vec![Vec::new(); old.num_items()];
            for (new_index, parent) in axis_map(*new, *old)?.into_iter().enumerate() {
                if let Some(parent) = parent {
                    below[parent].push(new_index);
                }
            }
            children.push(below);
        }

        let weights = distributions.map(|w| DistributionLayout::new(w, old_radix.size(), new_radix.size()));

        let mut store = self.empty_like(new_radix.size());
        for (index, value) in self.entries() {
            let targets = expand(&old_radix.decompose(index), &children, &new_radix);
            let count = targets.len() as i64;

            for (k, &target) in targets.iter().enumerate() {
                let child = match &weights {
                    Some(layout) => value * layout.weight(target)?,
                    None if method == AggregationMethod::Sum && self.measure_type.is_integer() => {
                        spread_integer(value as i64, count, k as i64) as f64
                    }
                    None if method == AggregationMethod::Sum => value / count as f64,
                    None => value,
                };
                store.write(target, child);
            }
        }
        Ok(store)
    }

    /// Copies another store's cells into this one, matching items by label.
    /// Cells whose items do not exist here are skipped.
    pub fn load(&mut self, other: &MeasureStore, my_dims: &[&dyn Axis], his_dims: &[&dyn Axis]) -> CubeResult<()> {
        if my_dims.len() != his_dims.len() {
            return Err(CubeError::SizeMismatch {
                expected: my_dims.len(),
                actual: his_dims.len(),
            });
        }
        // Axis order of `other` may differ; maps are indexed by my axis order
        let mut order = Vec::with_capacity(my_dims.len());
        let mut maps = Vec::with_capacity(my_dims.len());
        for mine in my_dims {
            let position = his_dims
                .iter()
                .position(|his| his.id() == mine.id())
                .ok_or_else(|| CubeError::UnknownDimension(mine.id().to_string()))?;
            order.push(position);
            maps.push(label_map(his_dims[position], *mine));
        }
        let his_radix = Radix::from_axes(his_dims);
        let my_radix = Radix::from_axes(my_dims);

        for (index, value) in other.entries() {
            let his = his_radix.decompose(index);
            let ordered: Coordinates = order.iter().map(|&p| his[p]).collect();
            if let Some(mine) = remap(&ordered, &maps) {
                self.write(my_radix.compose(&mine), value);
            }
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn check_same_axes(old_dims: &[&dyn Axis], new_dims: &[&dyn Axis]) -> CubeResult<()> {
    if old_dims.len() != new_dims.len() {
        return Err(CubeError::SizeMismatch {
            expected: old_dims.len(),
            actual: new_dims.len(),
        });
    }
    for (old, new) in old_dims.iter().zip(new_dims.iter()) {
        if old.id() != new.id() {
            return Err(CubeError::UnknownDimension(new.id().to_string()));
        }
    }
    Ok(())
}

/// Index of every `from` item among the items of `to`.
fn label_map(from: &dyn Axis, to: &dyn Axis) -> Vec<Option<usize>> {
    from.items().iter().map(|item| to.index_of(item)).collect()
}

/// For every `fine` item, the `coarse` item it belongs to.
fn axis_map(fine: &dyn Axis, coarse: &dyn Axis) -> CubeResult<Vec<Option<usize>>> {
    if fine.root_attribute() == coarse.root_attribute() && coarse.root_attribute() != ALL {
        Ok(label_map(fine, coarse))
    } else {
        fine.bucket_map(coarse)
    }
}

fn remap(coordinates: &[usize], maps: &[Vec<Option<usize>>]) -> Option<Coordinates> {
    coordinates
        .iter()
        .zip(maps.iter())
        .map(|(&c, map)| map.get(c).copied().flatten())
        .collect()
}

/// Every new cell index below one old cell, in ascending order.
fn expand(old: &[usize], children: &[Vec<Vec<usize>>], radix: &Radix) -> Vec<usize> {
    let mut partial: Vec<usize> = vec![0];
    for ((&item, below), &length) in old.iter().zip(children.iter()).zip(radix.lengths().iter()) {
        let kids = &below[item];
        let mut next = Vec::with_capacity(partial.len() * kids.len());
        for prefix in &partial {
            for &kid in kids {
                next.push(prefix * length + kid);
            }
        }
        partial = next;
    }
    partial
}

/// Share of child `k` when splitting `value` over `count` integer children.
/// The remainder goes to evenly spaced children so the shares sum to `value`.
fn spread_integer(value: i64, count: i64, k: i64) -> i64 {
    let base = value.div_euclid(count);
    let remainder = value.rem_euclid(count);
    let bump = (k * remainder).div_euclid(count) != ((k - 1) * remainder).div_euclid(count);
    base + i64::from(bump)
}

/// Weight lookup for an explicit distribution. Weights are laid out as
/// `[prefix cell][item of the added axis]`, the added axis being the last.
struct DistributionLayout<'a> {
    weights: &'a [f64],
    added_length: usize,
    block: usize,
}

impl<'a> DistributionLayout<'a> {
    fn new(weights: &'a [f64], old_size: usize, new_size: usize) -> Self {
        let added_length = if old_size == 0 { 0 } else { new_size / old_size };
        let shared = if added_length == 0 { 0 } else { weights.len() / added_length };
        let block = if shared == 0 { 0 } else { new_size / shared };
        DistributionLayout {
            weights,
            added_length,
            block,
        }
    }

    fn weight(&self, new_index: usize) -> CubeResult<f64> {
        if self.added_length == 0 || self.block == 0 {
            return Err(CubeError::MissingDistribution { index: new_index });
        }
        let index = (new_index / self.block) * self.added_length + new_index % self.added_length;
        self.weights
            .get(index)
            .copied()
            .ok_or(CubeError::MissingDistribution { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{Dimension, GenericDimension, PendingDimension};

    fn location() -> Dimension {
        Dimension::Generic(
            GenericDimension::new(
                "location",
                "city",
                vec!["paris".into(), "toledo".into(), "tokyo".into()],
            )
            .unwrap()
            .with_attribute(
                "city",
                "continent",
                [("paris", "europe"), ("toledo", "europe"), ("tokyo", "asia")],
            )
            .unwrap(),
        )
    }

    fn period() -> Dimension {
        Dimension::generic("period", "season", ["summer", "winter"]).unwrap()
    }

    fn antennas() -> MeasureStore {
        let mut store = MeasureStore::new(6, MeasureType::Float32, DefaultValue::Zero);
        store.set_data(&[1.0, 2.0, 4.0, 8.0, 16.0, 32.0]).unwrap();
        store
    }

    fn axes(dims: &[Dimension]) -> Vec<&dyn Axis> {
        dims.iter().map(|d| d as &dyn Axis).collect()
    }

    #[test]
    fn test_writing_default_unsets_cell() {
        let mut store = MeasureStore::new(3, MeasureType::Float64, DefaultValue::NaN);
        store.set(1, 5.0);
        assert!(store.is_set(1));
        store.set(1, f64::NAN);
        assert!(!store.is_set(1));
        assert!(store.get(1).is_nan());

        let mut zero = MeasureStore::new(3, MeasureType::Float64, DefaultValue::Zero);
        zero.set(0, 0.0);
        assert!(zero.occupied().is_empty());
    }

    #[test]
    fn test_explicit_zero_is_present_with_nan_default() {
        let mut store = MeasureStore::new(2, MeasureType::Float32, DefaultValue::NaN);
        store.set(0, 0.0);
        assert!(store.is_set(0));
        assert_eq!(store.get(0), 0.0);
    }

    #[test]
    fn test_integer_types_truncate_and_wrap() {
        assert_eq!(MeasureType::Int32.coerce(2.9), 2.0);
        assert_eq!(MeasureType::Int32.coerce(-2.9), -2.0);
        assert_eq!(MeasureType::Uint32.coerce(-1.0), 4294967295.0);
        assert_eq!(MeasureType::Int32.coerce(f64::NAN), 0.0);
        assert_eq!(MeasureType::Float32.coerce(0.1), 0.1f32 as f64);
    }

    #[test]
    fn test_default_value_only_zero_or_nan() {
        assert_eq!(DefaultValue::try_from(0.0).unwrap(), DefaultValue::Zero);
        assert_eq!(DefaultValue::try_from(f64::NAN).unwrap(), DefaultValue::NaN);
        assert!(DefaultValue::try_from(1.0).is_err());
    }

    #[test]
    fn test_fill_and_set_data() {
        let mut store = MeasureStore::new(4, MeasureType::Int32, DefaultValue::Zero);
        store.fill(3.0);
        assert_eq!(store.data(), vec![3.0; 4]);
        store.fill(0.0);
        assert!(store.occupied().is_empty());
        assert!(matches!(
            store.set_data(&[1.0]),
            Err(CubeError::SizeMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn test_total() {
        assert_eq!(antennas().total(), 63.0);
        let empty = MeasureStore::new(3, MeasureType::Float32, DefaultValue::NaN);
        assert!(empty.total().is_nan());
    }

    #[test]
    fn test_reorder_swaps_axes() {
        let old = vec![location(), period()];
        let new = vec![period(), location()];
        let store = antennas().reorder(&axes(&old), &axes(&new)).unwrap();
        assert_eq!(store.data(), vec![1.0, 4.0, 16.0, 2.0, 8.0, 32.0]);
    }

    #[test]
    fn test_dice_drops_vanished_items() {
        let old = vec![location(), period()];
        let new = vec![
            old[0].dice("city", &["tokyo".into(), "paris".into()], true).unwrap(),
            period(),
        ];
        let store = antennas().dice(&axes(&old), &axes(&new)).unwrap();
        assert_eq!(store.data(), vec![16.0, 32.0, 1.0, 2.0]);
    }

    #[test]
    fn test_drill_up_sum() {
        let old = vec![location(), period()];
        let new = vec![old[0].drill_up("continent").unwrap(), period()];
        let store = antennas()
            .drill_up(&axes(&old), &axes(&new), AggregationMethod::Sum)
            .unwrap();
        assert_eq!(store.data(), vec![5.0, 10.0, 16.0, 32.0]);
    }

    #[test]
    fn test_drill_up_methods() {
        let old = vec![location(), period()];
        let new = vec![old[0].drill_up("continent").unwrap(), period()];
        let run = |method| {
            antennas()
                .drill_up(&axes(&old), &axes(&new), method)
                .unwrap()
                .data()
        };
        assert_eq!(run(AggregationMethod::Average), vec![2.5, 5.0, 16.0, 32.0]);
        assert_eq!(run(AggregationMethod::Highest), vec![4.0, 8.0, 16.0, 32.0]);
        assert_eq!(run(AggregationMethod::Lowest), vec![1.0, 2.0, 16.0, 32.0]);
        assert_eq!(run(AggregationMethod::First), vec![1.0, 2.0, 16.0, 32.0]);
        assert_eq!(run(AggregationMethod::Last), vec![4.0, 8.0, 16.0, 32.0]);
        assert_eq!(run(AggregationMethod::Product), vec![4.0, 16.0, 16.0, 32.0]);
    }

    #[test]
    fn test_average_ignores_absent_contributors() {
        let old = vec![Dimension::time("time", "month", "2010-01", "2010-03").unwrap()];
        let new = vec![old[0].drill_up("quarter").unwrap()];
        let mut store = MeasureStore::new(3, MeasureType::Float32, DefaultValue::NaN);
        store.set(0, 10.0);
        store.set(2, 20.0);
        let up = store.drill_up(&axes(&old), &axes(&new), AggregationMethod::Average).unwrap();
        assert_eq!(up.data(), vec![15.0]);

        store.set(1, 0.0);
        let up = store.drill_up(&axes(&old), &axes(&new), AggregationMethod::Average).unwrap();
        assert_eq!(up.data(), vec![10.0]);
    }

    #[test]
    fn test_all_absent_contributors_stay_unset() {
        let old = vec![Dimension::time("time", "month", "2010-01", "2010-06").unwrap()];
        let new = vec![old[0].drill_up("quarter").unwrap()];
        let mut store = MeasureStore::new(6, MeasureType::Float32, DefaultValue::NaN);
        store.set(0, 1.0);
        store.set(2, 2.0);
        let up = store.drill_up(&axes(&old), &axes(&new), AggregationMethod::Sum).unwrap();
        assert_eq!(up.get(0), 3.0);
        assert!(!up.is_set(1));
    }

    #[test]
    fn test_drill_down_integer_sum_is_exact() {
        let fine = Dimension::time("time", "month", "2010-01", "2010-06").unwrap();
        let coarse = fine.drill_up("quarter").unwrap();
        let mut store = MeasureStore::new(2, MeasureType::Uint32, DefaultValue::NaN);
        store.set(0, 90.0);
        store.set(1, 100.0);

        let down = store
            .drill_down(&axes(&[coarse.clone()]), &axes(&[fine.clone()]), AggregationMethod::Sum, None)
            .unwrap();
        assert_eq!(down.data(), vec![30.0, 30.0, 30.0, 34.0, 33.0, 33.0]);

        let up = down
            .drill_up(&axes(&[fine]), &axes(&[coarse]), AggregationMethod::Sum)
            .unwrap();
        assert_eq!(up.data(), vec![90.0, 100.0]);
    }

    #[test]
    fn test_spread_integer_handles_negative_values() {
        let shares: Vec<i64> = (0..3).map(|k| spread_integer(-7, 3, k)).collect();
        assert_eq!(shares.iter().sum::<i64>(), -7);
        assert!(shares.iter().all(|s| *s == -2 || *s == -3));
    }

    #[test]
    fn test_drill_down_float_sum_and_replication() {
        let fine = Dimension::time("time", "month", "2010-01", "2010-03").unwrap();
        let coarse = fine.drill_up("quarter").unwrap();
        let mut store = MeasureStore::new(1, MeasureType::Float64, DefaultValue::NaN);
        store.set(0, 90.0);
        let old = [coarse];
        let new = [fine];

        let sum = store.drill_down(&axes(&old), &axes(&new), AggregationMethod::Sum, None).unwrap();
        assert_eq!(sum.data(), vec![30.0, 30.0, 30.0]);
        let avg = store
            .drill_down(&axes(&old), &axes(&new), AggregationMethod::Average, None)
            .unwrap();
        assert_eq!(avg.data(), vec![90.0, 90.0, 90.0]);
    }

    #[test]
    fn test_drill_down_absent_parent_stays_absent() {
        let fine = Dimension::time("time", "month", "2010-01", "2010-06").unwrap();
        let coarse = fine.drill_up("quarter").unwrap();
        let mut store = MeasureStore::new(2, MeasureType::Float32, DefaultValue::NaN);
        store.set(0, 90.0);
        let down = store
            .drill_down(&axes(&[coarse]), &axes(&[fine]), AggregationMethod::Sum, None)
            .unwrap();
        assert_eq!(down.occupied(), vec![0, 1, 2]);
    }

    #[test]
    fn test_drill_down_into_inserted_axis_with_distribution() {
        let loc = location();
        let pending = PendingDimension::new(&loc);
        let mut store = MeasureStore::new(1, MeasureType::Float64, DefaultValue::Zero);
        store.set(0, 100.0);
        let old: Vec<&dyn Axis> = vec![&pending];
        let new: Vec<&dyn Axis> = vec![&loc];

        let weights = [0.5, 0.25, 0.25];
        let down = store
            .drill_down(&old, &new, AggregationMethod::Sum, Some(&weights))
            .unwrap();
        assert_eq!(down.data(), vec![50.0, 25.0, 25.0]);

        let err = store
            .drill_down(&old, &new, AggregationMethod::Sum, Some(&[0.5, 0.5]))
            .unwrap_err();
        assert!(matches!(err, CubeError::MissingDistribution { .. }));
    }

    #[test]
    fn test_load_matches_by_label() {
        let small = vec![Dimension::generic("location", "city", ["tokyo", "paris"]).unwrap()];
        let mut source = MeasureStore::new(2, MeasureType::Float32, DefaultValue::NaN);
        source.set_data(&[3.0, 1.0]).unwrap();

        let big = vec![Dimension::generic("location", "city", ["paris", "soria", "tokyo"]).unwrap()];
        let mut target = MeasureStore::new(3, MeasureType::Float32, DefaultValue::NaN);
        target.load(&source, &axes(&big), &axes(&small)).unwrap();
        assert_eq!(target.get(0), 1.0);
        assert!(!target.is_set(1));
        assert_eq!(target.get(2), 3.0);
    }
}
