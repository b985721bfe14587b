//! FILENAME: core/cube-engine/src/cube/iteration.rs
//! Iteration over item combinations, and dicing by explicit item lists.

use super::Cube;
use crate::dimension::{Dimension, TimeSlot};
use crate::error::{CubeError, CubeResult};

/// Items per dimension id, in cube order.
pub type DimensionItems = Vec<(String, Vec<String>)>;

impl Cube {
    /// Root items of the listed dimensions (all of them when None), in cube order.
    pub fn dimension_items_map(&self, dimension_ids: Option<&[&str]>) -> DimensionItems {
        self.dimensions
            .iter()
            .filter(|d| dimension_ids.map_or(true, |ids| ids.contains(&d.id())))
            .map(|d| (d.id().to_string(), d.items().to_vec()))
            .collect()
    }

    /// Dices every listed dimension to its items. Items of a time dimension
    /// are matched at their own periodicity; unknown dimension ids are
    /// ignored. Only `measures` are kept when the list is not empty.
    pub fn dice_by_dimension_items(
        &self,
        items: &[(String, Vec<String>)],
        measures: &[&str],
        reorder: bool,
    ) -> CubeResult<Cube> {
        let mut cube = self.clone();
        for (dimension_id, wanted) in items {
            let Some(dimension) = self.dimension(dimension_id) else {
                continue;
            };
            let attribute = match (dimension, wanted.first()) {
                (Dimension::Time(_), Some(first)) => TimeSlot::parse(first)?.periodicity().name().to_string(),
                _ => dimension.root_attribute().to_string(),
            };
            cube = cube.dice(dimension_id, &attribute, wanted.as_slice(), reorder)?;
        }
        if !measures.is_empty() {
            cube.retain_measures(|id| measures.contains(&id));
        }
        Ok(cube)
    }

    /// Calls `visit` with the cube diced to every combination of one item
    /// per listed dimension, along with that combination.
    pub fn scan<F>(&self, dimension_ids: &[&str], mut visit: F) -> CubeResult<()>
    where
        F: FnMut(Cube, &[(String, String)]) -> CubeResult<()>,
    {
        let axes = self.dimension_items_map(Some(dimension_ids));
        let mut combination: Vec<(String, String)> = Vec::with_capacity(axes.len());
        self.scan_from(&axes, &mut combination, &mut visit)
    }

    fn scan_from<F>(
        &self,
        axes: &[(String, Vec<String>)],
        combination: &mut Vec<(String, String)>,
        visit: &mut F,
    ) -> CubeResult<()>
    where
        F: FnMut(Cube, &[(String, String)]) -> CubeResult<()>,
    {
        let Some(((dimension_id, items), rest)) = axes.split_first() else {
            let filter: Vec<(String, Vec<String>)> = combination
                .iter()
                .map(|(id, item)| (id.clone(), vec![item.clone()]))
                .collect();
            let diced = self.dice_by_dimension_items(&filter, &[], false)?;
            return visit(diced, combination.as_slice());
        };
        for item in items {
            combination.push((dimension_id.clone(), item.clone()));
            self.scan_from(rest, combination, visit)?;
            combination.pop();
        }
        Ok(())
    }

    /// Calls `visit` once per combination of the other dimensions' items,
    /// with a cube that only keeps `dimension_id`.
    pub fn iterate_over_dimension<F>(&self, dimension_id: &str, mut visit: F) -> CubeResult<()>
    where
        F: FnMut(Cube, &[(String, String)]) -> CubeResult<()>,
    {
        if self.dimension(dimension_id).is_none() {
            return Err(CubeError::UnknownDimension(dimension_id.to_string()));
        }
        let others: Vec<String> = self
            .dimension_ids()
            .into_iter()
            .filter(|id| id != dimension_id)
            .collect();
        if others.is_empty() {
            return visit(self.clone(), &[]);
        }

        let others: Vec<&str> = others.iter().map(String::as_str).collect();
        self.scan(&others, |diced, combination| {
            let sliced = diced.aggregate_by_dimensions(&[dimension_id])?;
            visit(sliced, combination)
        })
    }
}
