//! FILENAME: core/cube-engine/src/cube/nested.rs
//! Nested array / object views of measures.

use std::sync::Arc;

use super::Cube;
use crate::dimension::ALL;
use crate::error::{CubeError, CubeResult};
use crate::formatter::{self, NestedArray, NestedObject};

impl Cube {
    pub fn nested_array(&self, measure_id: &str) -> CubeResult<NestedArray> {
        let data = self.data(measure_id)?;
        Ok(formatter::to_nested_array(&data, &self.axes()))
    }

    pub fn set_nested_array(&mut self, measure_id: &str, values: &NestedArray) -> CubeResult<()> {
        let data = formatter::from_nested_array(values, &self.axes())?;
        self.set_data(measure_id, &data)
    }

    /// Values keyed by item, one level per dimension. With `with_totals`,
    /// every level also carries an `all` key holding the aggregate over
    /// that dimension.
    pub fn nested_object(&self, measure_id: &str, with_totals: bool) -> CubeResult<NestedObject> {
        if !with_totals {
            let data = self.data(measure_id)?;
            return Ok(formatter::to_nested_object(&data, &self.axes()));
        }
        self.merge_totals(|cube| cube.nested_object(measure_id, false))
    }

    /// One nested object per measure, keyed by measure id.
    pub fn nested_objects(&self, measure_ids: &[&str], with_totals: bool) -> CubeResult<NestedObject> {
        if !with_totals {
            let entries = measure_ids
                .iter()
                .map(|id| Ok((id.to_string(), self.nested_object(id, false)?)))
                .collect::<CubeResult<Vec<_>>>()?;
            return Ok(NestedObject::Object(entries));
        }
        self.merge_totals(|cube| cube.nested_objects(measure_ids, false))
    }

    /// Merges `view` over every combination of dimensions drilled up to `all`.
    fn merge_totals<F>(&self, view: F) -> CubeResult<NestedObject>
    where
        F: Fn(&Cube) -> CubeResult<NestedObject>,
    {
        let mut result = view(self)?;
        let ids = self.dimension_ids();
        for mask in 1..(1usize << ids.len()) {
            let mut sub = self.clone();
            for (bit, id) in ids.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    sub = sub.drill_up(id, ALL)?;
                }
            }
            result.merge(view(&sub)?);
        }
        Ok(result)
    }

    pub fn set_nested_object(&mut self, measure_id: &str, object: &NestedObject) -> CubeResult<()> {
        let data = formatter::from_nested_object(object, &self.axes())?;
        self.set_data(measure_id, &data)
    }

    /// Writes the leaves of a partial nested object. Keys that are not items
    /// of the matching dimension are skipped; NaN leaves unset their cell.
    pub fn hydrate_from_sparse_nested_object(&mut self, measure_id: &str, object: &NestedObject) -> CubeResult<()> {
        let mut cells = Vec::new();
        collect_cells(self, object, 0, 0, &mut cells)?;

        let measure = self.stored_measure_mut(measure_id)?;
        let store = Arc::make_mut(&mut measure.store);
        for (index, value) in cells {
            if value.is_nan() {
                store.unset(index);
            } else {
                store.set(index, value);
            }
        }
        Ok(())
    }
}

fn collect_cells(
    cube: &Cube,
    node: &NestedObject,
    depth: usize,
    offset: usize,
    cells: &mut Vec<(usize, f64)>,
) -> CubeResult<()> {
    let Some(dimension) = cube.dimensions.get(depth) else {
        return match node {
            NestedObject::Value(value) => {
                cells.push((offset, *value));
                Ok(())
            }
            NestedObject::Object(_) => Err(CubeError::Codec("nested object is too deep".into())),
        };
    };
    let NestedObject::Object(entries) = node else {
        return Err(CubeError::Codec(format!(
            "expected an object keyed by {} items",
            dimension.id()
        )));
    };
    for (key, child) in entries {
        if let Some(index) = dimension.root_index_of(key) {
            collect_cells(cube, child, depth + 1, offset * dimension.num_items() + index, cells)?;
        }
    }
    Ok(())
}
