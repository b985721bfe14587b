//! FILENAME: core/cube-engine/src/cube/structure.rs
//! Structural operations: each resolves a new dimension list, forwards to
//! every store with the measure's rule for the touched dimension, and
//! returns a new cube. A no-op returns a clone sharing every component.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{axes, Cube, StoredMeasure};
use crate::dimension::{Axis, Dimension, PendingDimension, ALL};
use crate::error::{CubeError, CubeResult};
use crate::store::{AggregationMethod, MeasureStore};

impl Cube {
    /// Rebuilds every stored measure for `dimensions` with `reshape`.
    fn with_dimensions<F>(&self, dimensions: Vec<Arc<Dimension>>, reshape: F) -> CubeResult<Cube>
    where
        F: Fn(&StoredMeasure, &[&dyn Axis], &[&dyn Axis]) -> CubeResult<MeasureStore>,
    {
        let old_axes = self.axes();
        let new_axes = axes(&dimensions);
        let stored = self
            .stored
            .iter()
            .map(|measure| {
                Ok(StoredMeasure {
                    id: measure.id.clone(),
                    store: Arc::new(reshape(measure, &old_axes, &new_axes)?),
                    rules: measure.rules.clone(),
                })
            })
            .collect::<CubeResult<Vec<_>>>()?;

        Ok(Cube {
            dimensions,
            stored,
            computed: self.computed.clone(),
        })
    }

    /// Dimension list with the dimension at `index` replaced.
    fn replaced(&self, index: usize, dimension: Dimension) -> Vec<Arc<Dimension>> {
        let mut dimensions = self.dimensions.clone();
        dimensions[index] = Arc::new(dimension);
        dimensions
    }

    // ========================================================================
    // FILTERING
    // ========================================================================

    /// Keeps the items of `dimension_id` whose `attribute` value is listed.
    /// With `reorder`, the dimension takes the order of `items` (root
    /// attribute only).
    pub fn dice<S: AsRef<str>>(
        &self,
        dimension_id: &str,
        attribute: &str,
        items: &[S],
        reorder: bool,
    ) -> CubeResult<Cube> {
        let index = self.dimension_index(dimension_id)?;
        let items: Vec<String> = items.iter().map(|s| s.as_ref().to_string()).collect();
        let dimension = self.dimensions[index].dice(attribute, &items, reorder)?;
        self.apply_dice(index, dimension)
    }

    /// Keeps the items between `start` and `end` (inclusive, open when None).
    pub fn dice_range(
        &self,
        dimension_id: &str,
        attribute: &str,
        start: Option<&str>,
        end: Option<&str>,
    ) -> CubeResult<Cube> {
        let index = self.dimension_index(dimension_id)?;
        let dimension = self.dimensions[index].dice_range(attribute, start, end)?;
        self.apply_dice(index, dimension)
    }

    fn apply_dice(&self, index: usize, dimension: Dimension) -> CubeResult<Cube> {
        if dimension == *self.dimensions[index] {
            return Ok(self.clone());
        }
        log_debug!(
            "CUBE",
            "dice {}: {} -> {} items",
            dimension.id(),
            self.dimensions[index].num_items(),
            dimension.num_items()
        );
        self.with_dimensions(self.replaced(index, dimension), |m, old, new| {
            m.store.dice(old, new)
        })
    }

    /// Dices `dimension_id` to the single `item`, then removes the dimension.
    pub fn slice(&self, dimension_id: &str, attribute: &str, item: &str) -> CubeResult<Cube> {
        self.dice(dimension_id, attribute, &[item], false)?
            .remove_dimension(dimension_id)
    }

    // ========================================================================
    // DRILLING
    // ========================================================================

    /// Aggregates `dimension_id` up to `attribute` using each measure's rule.
    pub fn drill_up(&self, dimension_id: &str, attribute: &str) -> CubeResult<Cube> {
        let index = self.dimension_index(dimension_id)?;
        let current = &self.dimensions[index];
        if current.root_attribute() == attribute {
            return Ok(self.clone());
        }
        let dimension = current.drill_up(attribute)?;
        if dimension == **current {
            log_info!("CUBE", "drill_up {} to {} changes nothing", dimension_id, attribute);
            return Ok(self.clone());
        }

        log_debug!("CUBE", "drill_up {} from {} to {}", dimension_id, current.root_attribute(), attribute);
        self.with_dimensions(self.replaced(index, dimension), |m, old, new| {
            m.store.drill_up(old, new, m.rule(dimension_id))
        })
    }

    /// Splits `dimension_id` down to `attribute` using each measure's rule.
    pub fn drill_down(&self, dimension_id: &str, attribute: &str) -> CubeResult<Cube> {
        let index = self.dimension_index(dimension_id)?;
        let current = &self.dimensions[index];
        if current.root_attribute() == attribute {
            return Ok(self.clone());
        }
        let dimension = current.drill_down(attribute)?;
        if dimension == **current {
            log_info!("CUBE", "drill_down {} to {} changes nothing", dimension_id, attribute);
            return Ok(self.clone());
        }

        log_debug!("CUBE", "drill_down {} from {} to {}", dimension_id, current.root_attribute(), attribute);
        self.with_dimensions(self.replaced(index, dimension), |m, old, new| {
            m.store.drill_down(old, new, m.rule(dimension_id), None)
        })
    }

    // ========================================================================
    // DIMENSION LIST
    // ========================================================================

    /// Same dimensions in the order of `dimension_ids`.
    pub fn reorder_dimensions<S: AsRef<str>>(&self, dimension_ids: &[S]) -> CubeResult<Cube> {
        if dimension_ids.len() != self.dimensions.len() {
            return Err(CubeError::SizeMismatch {
                expected: self.dimensions.len(),
                actual: dimension_ids.len(),
            });
        }
        let unchanged = dimension_ids
            .iter()
            .zip(self.dimensions.iter())
            .all(|(id, d)| id.as_ref() == d.id());
        if unchanged {
            return Ok(self.clone());
        }

        for (i, id) in dimension_ids.iter().enumerate() {
            if dimension_ids[..i].iter().any(|other| other.as_ref() == id.as_ref()) {
                return Err(CubeError::DuplicateDimension(id.as_ref().to_string()));
            }
        }
        let dimensions = dimension_ids
            .iter()
            .map(|id| {
                self.dimension_index(id.as_ref())
                    .map(|i| self.dimensions[i].clone())
            })
            .collect::<CubeResult<Vec<_>>>()?;

        self.with_dimensions(dimensions, |m, old, new| m.store.reorder(old, new))
    }

    pub fn swap_dimensions(&self, first: &str, second: &str) -> CubeResult<Cube> {
        self.dimension_index(first)?;
        self.dimension_index(second)?;
        let ids: Vec<String> = self
            .dimension_ids()
            .into_iter()
            .map(|id| {
                if id == first {
                    second.to_string()
                } else if id == second {
                    first.to_string()
                } else {
                    id
                }
            })
            .collect();
        self.reorder_dimensions(&ids)
    }

    /// Inserts `dimension` at `index` (appended when None).
    ///
    /// Existing values are spread over the new items per measure:
    /// `distributions` gives explicit weights, otherwise `aggregation` (or
    /// `sum`) decides. The method used is recorded as the measure's rule for
    /// the new dimension.
    pub fn add_dimension(
        &self,
        dimension: Dimension,
        aggregation: &BTreeMap<String, AggregationMethod>,
        index: Option<usize>,
        distributions: &BTreeMap<String, Vec<f64>>,
    ) -> CubeResult<Cube> {
        if self.dimension(dimension.id()).is_some() {
            return Err(CubeError::DuplicateDimension(dimension.id().to_string()));
        }
        let index = index.unwrap_or(self.dimensions.len());
        if index > self.dimensions.len() {
            return Err(CubeError::UnsupportedOperation(format!(
                "cannot insert dimension {} at {} in a cube of {} dimensions",
                dimension.id(),
                index,
                self.dimensions.len()
            )));
        }
        log_debug!("CUBE", "add dimension {} at {}", dimension.id(), index);

        let mut dimensions = self.dimensions.clone();
        dimensions.insert(index, Arc::new(dimension));
        let inserted = &dimensions[index];
        let pending = PendingDimension::new(inserted);

        let mut old_axes = self.axes();
        old_axes.insert(index, &pending);
        let new_axes = axes(&dimensions);

        let stored = self
            .stored
            .iter()
            .map(|measure| {
                let method = aggregation.get(&measure.id).copied().unwrap_or_default();
                let weights = distributions.get(&measure.id).map(Vec::as_slice);
                let store = measure.store.drill_down(&old_axes, &new_axes, method, weights)?;
                let mut rules = measure.rules.clone();
                rules.insert(inserted.id().to_string(), method);
                Ok(StoredMeasure {
                    id: measure.id.clone(),
                    store: Arc::new(store),
                    rules,
                })
            })
            .collect::<CubeResult<Vec<_>>>()?;

        Ok(Cube {
            dimensions,
            stored,
            computed: self.computed.clone(),
        })
    }

    /// Aggregates `dimension_id` away with each measure's rule.
    pub fn remove_dimension(&self, dimension_id: &str) -> CubeResult<Cube> {
        let index = self.dimension_index(dimension_id)?;
        let collapsed = self.drill_up(dimension_id, ALL)?;
        log_debug!("CUBE", "remove dimension {}", dimension_id);

        let mut dimensions = collapsed.dimensions.clone();
        let removed = dimensions.remove(index);
        // A single `all` item keeps the cell layout; an empty axis had no cells
        let size: usize = dimensions.iter().map(|d| d.num_items()).product();
        let stored = collapsed
            .stored
            .into_iter()
            .map(|mut measure| {
                if removed.num_items() != 1 {
                    measure.store = Arc::new(measure.store.empty_like(size));
                }
                measure.rules.remove(dimension_id);
                measure
            })
            .collect();

        Ok(Cube {
            dimensions,
            stored,
            computed: collapsed.computed,
        })
    }

    pub fn remove_dimensions<S: AsRef<str>>(&self, dimension_ids: &[S]) -> CubeResult<Cube> {
        let mut cube = self.clone();
        for id in dimension_ids {
            cube = cube.remove_dimension(id.as_ref())?;
        }
        Ok(cube)
    }

    /// Removes every dimension not listed.
    pub fn keep_dimensions<S: AsRef<str>>(&self, dimension_ids: &[S]) -> CubeResult<Cube> {
        let removed: Vec<String> = self
            .dimension_ids()
            .into_iter()
            .filter(|id| !dimension_ids.iter().any(|k| k.as_ref() == id))
            .collect();
        self.remove_dimensions(&removed)
    }

    /// Keeps the listed dimensions, in the listed order.
    pub fn project<S: AsRef<str>>(&self, dimension_ids: &[S]) -> CubeResult<Cube> {
        self.keep_dimensions(dimension_ids)?
            .reorder_dimensions(dimension_ids)
    }

    /// Aggregates every dimension away, leaving a single cell.
    pub fn collapse(&self) -> CubeResult<Cube> {
        self.remove_dimensions(&self.dimension_ids())
    }

    /// Aggregates away every dimension except the listed ones.
    pub fn aggregate_by_dimensions<S: AsRef<str>>(&self, excluded: &[S]) -> CubeResult<Cube> {
        let removed: Vec<String> = self
            .dimension_ids()
            .into_iter()
            .filter(|id| !excluded.iter().any(|k| k.as_ref() == id))
            .collect();
        self.remove_dimensions(&removed)
    }

    // ========================================================================
    // RESHAPE
    // ========================================================================

    /// Converts this cube to the layout of `target`: same dimensions, roots,
    /// items and order. Missing dimensions are inserted (values spread with
    /// `sum`), extra ones are aggregated away.
    pub fn reshape(&self, target: &[Arc<Dimension>]) -> CubeResult<Cube> {
        let common: Vec<&str> = target
            .iter()
            .map(|d| d.id())
            .filter(|id| self.dimension(id).is_some())
            .collect();
        let mut cube = self.project(&common)?;

        for (index, wanted) in target.iter().enumerate() {
            let present = cube.dimensions.get(index).map(|d| d.id()) == Some(wanted.id());
            if !present {
                cube = cube.add_dimension(
                    wanted.as_ref().clone(),
                    &BTreeMap::new(),
                    Some(index),
                    &BTreeMap::new(),
                )?;
            }
        }

        for (index, wanted) in target.iter().enumerate() {
            let actual = cube.dimensions[index].clone();
            let root = wanted.root_attribute();
            if actual.root_attribute() != root {
                if actual.has_attribute(root) {
                    cube = cube.drill_up(wanted.id(), root)?;
                } else if wanted.has_attribute(actual.root_attribute()) {
                    cube = cube.drill_down(wanted.id(), root)?;
                } else {
                    return Err(CubeError::incompatible(
                        wanted.id(),
                        format!("{} and {} are not in the same hierarchy", actual.root_attribute(), root),
                    ));
                }
            }
            cube = cube.dice(wanted.id(), root, wanted.items(), true)?;
        }
        Ok(cube)
    }
}
