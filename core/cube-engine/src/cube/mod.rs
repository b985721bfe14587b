//! FILENAME: core/cube-engine/src/cube/mod.rs
//! Cube - measures indexed by the cross product of dimensions.
//!
//! A cube owns an ordered list of dimensions (most significant first), one
//! sparse store per stored measure with its per-dimension aggregation
//! rules, and a list of computed measures evaluated cell by cell from the
//! stored ones.
//!
//! Layers:
//! - `mod.rs`: the types, construction and read accessors
//! - `measures`: measure lifecycle and cell-level data access
//! - `structure`: reshaping operations that return a new cube
//! - `compose`: combining two cubes
//! - `iteration`: scanning over item combinations
//! - `nested`: nested array / object views of a measure
//!
//! Dimensions and stores are shared between cubes through `Arc`. Every
//! structural operation returns a new cube; the in-place mutators go
//! through `Arc::make_mut`, so a store is never changed under another cube.

mod compose;
mod iteration;
mod measures;
mod nested;
mod structure;

use std::collections::BTreeMap;
use std::sync::Arc;

use measure_parser::{CompiledExpression, Expression};
use smallvec::SmallVec;

use crate::dimension::{Axis, Dimension};
use crate::error::{CubeError, CubeResult};
use crate::position::Radix;
use crate::store::{AggregationMethod, MeasureStore};

pub use iteration::DimensionItems;

/// Suffix turning a stored measure id into a reference to its grand total.
pub const TOTAL_SUFFIX: &str = "__total";

/// Aggregation rule per dimension id.
pub type AggregationRules = BTreeMap<String, AggregationMethod>;

// ============================================================================
// MEASURES
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct StoredMeasure {
    pub(crate) id: String,
    pub(crate) store: Arc<MeasureStore>,
    pub(crate) rules: AggregationRules,
}

impl StoredMeasure {
    /// Rule for `dimension_id`; `sum` when none is recorded.
    pub(crate) fn rule(&self, dimension_id: &str) -> AggregationMethod {
        self.rules.get(dimension_id).copied().unwrap_or_default()
    }
}

/// A formula over stored measures, flattened and compiled once.
#[derive(Debug, Clone)]
pub(crate) struct ComputedMeasure {
    pub(crate) id: String,
    pub(crate) expression: Expression,
    compiled: CompiledExpression,
}

impl ComputedMeasure {
    pub(crate) fn new(id: &str, expression: Expression) -> Self {
        let compiled = CompiledExpression::compile(&expression);
        ComputedMeasure {
            id: id.to_string(),
            expression,
            compiled,
        }
    }

    pub(crate) fn references(&self, stored_id: &str) -> bool {
        self.expression.references(stored_id)
            || self.expression.references(&format!("{}{}", stored_id, TOTAL_SUFFIX))
    }
}

/// Value source bound to one slot of a computed measure.
pub(crate) enum Operand<'a> {
    Cell(&'a MeasureStore),
    Constant(f64),
}

/// Reads cell values of a stored or computed measure.
pub(crate) enum MeasureReader<'a> {
    Stored(&'a MeasureStore),
    Computed {
        compiled: &'a CompiledExpression,
        operands: Vec<Operand<'a>>,
    },
}

impl MeasureReader<'_> {
    pub(crate) fn get(&self, index: usize) -> f64 {
        match self {
            MeasureReader::Stored(store) => store.get(index),
            MeasureReader::Computed { compiled, operands } => {
                let params: SmallVec<[f64; 8]> = operands
                    .iter()
                    .map(|operand| match operand {
                        Operand::Cell(store) => store.get(index),
                        Operand::Constant(value) => *value,
                    })
                    .collect();
                compiled.evaluate(&params)
            }
        }
    }
}

// ============================================================================
// CUBE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Cube {
    pub(crate) dimensions: Vec<Arc<Dimension>>,
    pub(crate) stored: Vec<StoredMeasure>,
    pub(crate) computed: Vec<ComputedMeasure>,
}

impl Cube {
    /// Empty cube over `dimensions`. Dimension ids must be unique.
    pub fn new(dimensions: Vec<Dimension>) -> CubeResult<Self> {
        Cube::from_shared(dimensions.into_iter().map(Arc::new).collect())
    }

    pub(crate) fn from_shared(dimensions: Vec<Arc<Dimension>>) -> CubeResult<Self> {
        for (i, dimension) in dimensions.iter().enumerate() {
            if dimensions[..i].iter().any(|d| d.id() == dimension.id()) {
                return Err(CubeError::DuplicateDimension(dimension.id().to_string()));
            }
        }
        Ok(Cube {
            dimensions,
            stored: Vec::new(),
            computed: Vec::new(),
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Number of cells: product of the dimension sizes.
    pub fn store_size(&self) -> usize {
        self.radix().size()
    }

    /// Dense size of every stored measure, in bytes.
    pub fn byte_length(&self) -> usize {
        self.stored.iter().map(|m| m.store.byte_length()).sum()
    }

    pub fn dimensions(&self) -> &[Arc<Dimension>] {
        &self.dimensions
    }

    pub fn dimension_ids(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.id().to_string()).collect()
    }

    pub fn stored_measure_ids(&self) -> Vec<String> {
        self.stored.iter().map(|m| m.id.clone()).collect()
    }

    pub fn computed_measure_ids(&self) -> Vec<String> {
        self.computed.iter().map(|m| m.id.clone()).collect()
    }

    pub fn dimension(&self, dimension_id: &str) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.id() == dimension_id)
            .map(|d| d.as_ref())
    }

    pub fn dimension_index(&self, dimension_id: &str) -> CubeResult<usize> {
        self.dimensions
            .iter()
            .position(|d| d.id() == dimension_id)
            .ok_or_else(|| CubeError::UnknownDimension(dimension_id.to_string()))
    }

    pub fn has_measure(&self, measure_id: &str) -> bool {
        self.stored_measure(measure_id).is_some() || self.computed_measure(measure_id).is_some()
    }

    /// Aggregation rules of a stored measure.
    pub fn rules(&self, measure_id: &str) -> Option<&AggregationRules> {
        self.stored_measure(measure_id).map(|m| &m.rules)
    }

    /// Store backing a stored measure.
    pub fn store(&self, measure_id: &str) -> Option<&MeasureStore> {
        self.stored_measure(measure_id).map(|m| m.store.as_ref())
    }

    /// Flattened formula of a computed measure, as re-parsable text.
    pub fn formula(&self, measure_id: &str) -> Option<String> {
        self.computed_measure(measure_id)
            .map(|m| m.expression.to_string())
    }

    /// Copy holding only the listed measures; all of them when `measure_ids`
    /// is empty. Computed measures whose operands are not kept are dropped.
    pub fn clone_with_measures(&self, measure_ids: &[&str]) -> Cube {
        let mut cube = self.clone();
        if !measure_ids.is_empty() {
            cube.retain_measures(|id| measure_ids.contains(&id));
        }
        cube
    }

    /// Linear index of the cell at `coordinates` (dimension id, item).
    pub fn position(&self, coordinates: &[(&str, &str)]) -> CubeResult<usize> {
        let mut index = 0;
        for dimension in &self.dimensions {
            let item = coordinates
                .iter()
                .find(|(id, _)| *id == dimension.id())
                .map(|(_, item)| *item)
                .ok_or_else(|| CubeError::MissingCoordinate(dimension.id().to_string()))?;
            let item_index = dimension
                .root_index_of(item)
                .ok_or_else(|| CubeError::unknown_item(dimension.id(), item))?;
            index = index * dimension.num_items() + item_index;
        }
        Ok(index)
    }

    // ------------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------------

    pub(crate) fn radix(&self) -> Radix {
        Radix::from_axes(&self.axes())
    }

    pub(crate) fn axes(&self) -> Vec<&dyn Axis> {
        axes(&self.dimensions)
    }

    pub(crate) fn stored_measure(&self, measure_id: &str) -> Option<&StoredMeasure> {
        self.stored.iter().find(|m| m.id == measure_id)
    }

    pub(crate) fn stored_measure_mut(&mut self, measure_id: &str) -> CubeResult<&mut StoredMeasure> {
        self.stored
            .iter_mut()
            .find(|m| m.id == measure_id)
            .ok_or_else(|| CubeError::UnknownMeasure(measure_id.to_string()))
    }

    pub(crate) fn computed_measure(&self, measure_id: &str) -> Option<&ComputedMeasure> {
        self.computed.iter().find(|m| m.id == measure_id)
    }

    /// Binds a measure to its value sources.
    pub(crate) fn reader(&self, measure_id: &str) -> CubeResult<MeasureReader<'_>> {
        if let Some(measure) = self.stored_measure(measure_id) {
            return Ok(MeasureReader::Stored(&measure.store));
        }
        let measure = self
            .computed_measure(measure_id)
            .ok_or_else(|| CubeError::UnknownMeasure(measure_id.to_string()))?;

        let operands = measure
            .compiled
            .slots()
            .iter()
            .map(|slot| {
                if let Some(stored) = self.stored_measure(slot) {
                    return Ok(Operand::Cell(&stored.store));
                }
                slot.strip_suffix(TOTAL_SUFFIX)
                    .and_then(|base| self.stored_measure(base))
                    .map(|stored| Operand::Constant(stored.store.total()))
                    .ok_or_else(|| CubeError::UnknownMeasure(slot.clone()))
            })
            .collect::<CubeResult<Vec<_>>>()?;

        Ok(MeasureReader::Computed {
            compiled: &measure.compiled,
            operands,
        })
    }

    /// Stored measures a computed measure reads cell by cell.
    pub(crate) fn operand_stores(&self, measure: &ComputedMeasure) -> Vec<&MeasureStore> {
        measure
            .compiled
            .slots()
            .iter()
            .filter_map(|slot| self.stored_measure(slot))
            .map(|m| m.store.as_ref())
            .collect()
    }

    /// Drops every measure for which `keep` is false, then every computed
    /// measure left with a dangling operand.
    pub(crate) fn retain_measures(&mut self, keep: impl Fn(&str) -> bool) {
        self.stored.retain(|m| keep(&m.id));
        self.computed.retain(|m| keep(&m.id));
        let stored: Vec<String> = self.stored_measure_ids();
        self.computed.retain(|m| {
            m.expression.variables().iter().all(|v| {
                stored.contains(v)
                    || v.strip_suffix(TOTAL_SUFFIX)
                        .map_or(false, |base| stored.iter().any(|s| s == base))
            })
        });
    }
}

pub(crate) fn axes(dimensions: &[Arc<Dimension>]) -> Vec<&dyn Axis> {
    dimensions.iter().map(|d| d.as_ref() as &dyn Axis).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Cube {
        Cube::new(vec![
            Dimension::generic("location", "city", ["paris", "toledo", "tokyo"]).unwrap(),
            Dimension::generic("period", "season", ["summer", "winter"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_store_size_is_product_of_dimensions() {
        assert_eq!(cube().store_size(), 6);
        assert_eq!(Cube::new(vec![]).unwrap().store_size(), 1);
    }

    #[test]
    fn test_duplicate_dimension_rejected() {
        let result = Cube::new(vec![
            Dimension::generic("location", "city", ["paris"]).unwrap(),
            Dimension::generic("location", "city", ["tokyo"]).unwrap(),
        ]);
        assert!(matches!(result, Err(CubeError::DuplicateDimension(_))));
    }

    #[test]
    fn test_position_folds_in_dimension_order() {
        let cube = cube();
        assert_eq!(cube.position(&[("location", "paris"), ("period", "summer")]).unwrap(), 0);
        assert_eq!(cube.position(&[("period", "winter"), ("location", "tokyo")]).unwrap(), 5);
        assert!(matches!(
            cube.position(&[("location", "paris")]),
            Err(CubeError::MissingCoordinate(_))
        ));
        assert!(matches!(
            cube.position(&[("location", "lyon"), ("period", "summer")]),
            Err(CubeError::UnknownItem { .. })
        ));
    }
}
