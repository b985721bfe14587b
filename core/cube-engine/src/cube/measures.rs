//! FILENAME: core/cube-engine/src/cube/measures.rs
//! Measure lifecycle and cell-level data access.

use std::sync::Arc;

use measure_parser::Expression;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{AggregationRules, ComputedMeasure, Cube, StoredMeasure, TOTAL_SUFFIX};
use crate::error::{CubeError, CubeResult};
use crate::store::{DefaultValue, MeasureStore, MeasureType};

static MEASURE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z][_a-z0-9]+$|^[_a-z0-9]+__total$").expect("measure id pattern is valid")
});

pub(crate) fn validate_measure_id(measure_id: &str) -> CubeResult<()> {
    if MEASURE_ID.is_match(measure_id) {
        Ok(())
    } else {
        Err(CubeError::InvalidIdentifier(measure_id.to_string()))
    }
}

impl Cube {
    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub(crate) fn check_new_measure(&self, measure_id: &str) -> CubeResult<()> {
        validate_measure_id(measure_id)?;
        if self.has_measure(measure_id) {
            return Err(CubeError::DuplicateMeasure(measure_id.to_string()));
        }
        Ok(())
    }

    pub fn create_stored_measure(
        &mut self,
        measure_id: &str,
        rules: AggregationRules,
        measure_type: MeasureType,
        default: DefaultValue,
    ) -> CubeResult<()> {
        self.check_new_measure(measure_id)?;
        log_debug!("MEASURE", "create stored {} ({:?}, {:?})", measure_id, measure_type, default);
        self.stored.push(StoredMeasure {
            id: measure_id.to_string(),
            store: Arc::new(MeasureStore::new(self.store_size(), measure_type, default)),
            rules,
        });
        Ok(())
    }

    /// Adds a measure computed from `formula`. References to other computed
    /// measures are replaced by their formulas, so the stored expression
    /// only reads stored measures (`x`) and their grand totals (`x__total`).
    pub fn create_computed_measure(&mut self, measure_id: &str, formula: &str) -> CubeResult<()> {
        self.check_new_measure(measure_id)?;
        let parsed = measure_parser::parse(formula)?;
        let expression = parsed.map_variables(&|name| {
            self.computed_measure(name).map(|m| m.expression.clone())
        });

        let unknown: Vec<String> = expression
            .variables()
            .into_iter()
            .filter(|name| !self.is_stored_operand(name))
            .collect();
        if !unknown.is_empty() {
            return Err(CubeError::UnknownMeasure(unknown.join(", ")));
        }

        log_debug!("MEASURE", "create computed {} = {}", measure_id, expression);
        self.computed.push(ComputedMeasure::new(measure_id, expression));
        Ok(())
    }

    fn is_stored_operand(&self, name: &str) -> bool {
        self.stored_measure(name).is_some()
            || name
                .strip_suffix(TOTAL_SUFFIX)
                .map_or(false, |base| self.stored_measure(base).is_some())
    }

    /// New stored measure sharing the data and rules of `measure_id`.
    pub fn copy_stored_measure(&mut self, measure_id: &str, copy_id: &str) -> CubeResult<()> {
        self.check_new_measure(copy_id)?;
        let source = self
            .stored_measure(measure_id)
            .ok_or_else(|| CubeError::UnknownMeasure(measure_id.to_string()))?;
        let copy = StoredMeasure {
            id: copy_id.to_string(),
            ..source.clone()
        };
        self.stored.push(copy);
        Ok(())
    }

    /// Empty stored measure with the type, default and rules that
    /// `measure_id` has in `origin`.
    pub fn clone_stored_measure(&mut self, origin: &Cube, measure_id: &str) -> CubeResult<()> {
        self.check_new_measure(measure_id)?;
        let source = origin
            .stored_measure(measure_id)
            .ok_or_else(|| CubeError::UnknownMeasure(measure_id.to_string()))?;
        self.create_stored_measure(
            measure_id,
            source.rules.clone(),
            source.store.measure_type(),
            source.store.default_value(),
        )
    }

    /// Materializes the values of any measure into a new stored measure.
    pub fn copy_to_stored_measure(
        &mut self,
        measure_id: &str,
        stored_id: &str,
        rules: AggregationRules,
        measure_type: MeasureType,
        default: DefaultValue,
    ) -> CubeResult<()> {
        let data = self.data(measure_id)?;
        self.create_stored_measure(stored_id, rules, measure_type, default)?;
        self.set_data(stored_id, &data)
    }

    /// Replaces a computed measure by a stored one holding its values.
    pub fn convert_to_stored_measure(
        &mut self,
        measure_id: &str,
        rules: AggregationRules,
        measure_type: MeasureType,
        default: DefaultValue,
    ) -> CubeResult<()> {
        if self.computed_measure(measure_id).is_none() {
            return Err(CubeError::UnknownMeasure(measure_id.to_string()));
        }
        let data = self.data(measure_id)?;
        self.computed.retain(|m| m.id != measure_id);
        self.create_stored_measure(measure_id, rules, measure_type, default)?;
        self.set_data(measure_id, &data)
    }

    /// Renames a measure. Formulas referencing a renamed stored measure
    /// (or its `__total`) are rewritten.
    pub fn rename_measure(&mut self, old_id: &str, new_id: &str) -> CubeResult<()> {
        if old_id == new_id {
            return Ok(());
        }
        self.check_new_measure(new_id)?;

        if let Some(measure) = self.computed.iter_mut().find(|m| m.id == old_id) {
            measure.id = new_id.to_string();
            return Ok(());
        }
        self.stored_measure_mut(old_id)?.id = new_id.to_string();
        self.rewrite_references(old_id, new_id);
        Ok(())
    }

    /// Points every formula reading `to_drop` at `to_keep`, then drops `to_drop`.
    pub fn replace_stored_measure(&mut self, to_keep: &str, to_drop: &str) -> CubeResult<()> {
        for id in [to_keep, to_drop] {
            if self.stored_measure(id).is_none() {
                return Err(CubeError::UnknownMeasure(id.to_string()));
            }
        }
        self.rewrite_references(to_drop, to_keep);
        self.drop_measure(to_drop)
    }

    fn rewrite_references(&mut self, from: &str, to: &str) {
        let from_total = format!("{}{}", from, TOTAL_SUFFIX);
        let to_total = format!("{}{}", to, TOTAL_SUFFIX);
        for measure in self.computed.iter_mut() {
            if !measure.references(from) {
                continue;
            }
            let expression = measure.expression.map_variables(&|name| {
                if name == from {
                    Some(Expression::Variable(to.to_string()))
                } else if name == from_total {
                    Some(Expression::Variable(to_total.clone()))
                } else {
                    None
                }
            });
            *measure = ComputedMeasure::new(&measure.id, expression);
        }
    }

    /// Drops a measure. Dropping a stored measure also drops every computed
    /// measure that reads it.
    pub fn drop_measure(&mut self, measure_id: &str) -> CubeResult<()> {
        if self.computed_measure(measure_id).is_some() {
            self.computed.retain(|m| m.id != measure_id);
            return Ok(());
        }
        if self.stored_measure(measure_id).is_none() {
            return Err(CubeError::UnknownMeasure(measure_id.to_string()));
        }
        self.stored.retain(|m| m.id != measure_id);
        self.computed.retain(|m| !m.references(measure_id));
        Ok(())
    }

    pub fn drop_measures(&mut self, measure_ids: &[&str]) -> CubeResult<()> {
        for id in measure_ids {
            self.drop_measure(id)?;
        }
        Ok(())
    }

    pub fn keep_measure(&mut self, measure_id: &str) {
        self.keep_measures(&[measure_id]);
    }

    pub fn keep_measures(&mut self, measure_ids: &[&str]) {
        self.retain_measures(|id| measure_ids.contains(&id));
    }

    pub fn update_stored_measure_rules<F>(&mut self, measure_id: &str, update: F) -> CubeResult<()>
    where
        F: FnOnce(&AggregationRules) -> AggregationRules,
    {
        let measure = self.stored_measure_mut(measure_id)?;
        measure.rules = update(&measure.rules);
        Ok(())
    }

    // ========================================================================
    // DATA ACCESS
    // ========================================================================

    /// Store of a stored measure, unshared first so the write stays local.
    fn writable_store(&mut self, measure_id: &str) -> CubeResult<&mut MeasureStore> {
        if self.computed_measure(measure_id).is_some() {
            return Err(CubeError::UnsupportedOperation(format!(
                "cannot write to computed measure {}",
                measure_id
            )));
        }
        let measure = self.stored_measure_mut(measure_id)?;
        Ok(Arc::make_mut(&mut measure.store))
    }

    /// Dense values of any measure.
    pub fn data(&self, measure_id: &str) -> CubeResult<Vec<f64>> {
        if let Some(measure) = self.stored_measure(measure_id) {
            return Ok(measure.store.data());
        }
        let reader = self.reader(measure_id)?;
        Ok((0..self.store_size()).map(|i| reader.get(i)).collect())
    }

    pub fn set_data(&mut self, measure_id: &str, values: &[f64]) -> CubeResult<()> {
        self.writable_store(measure_id)?.set_data(values)
    }

    pub fn fill_data(&mut self, measure_id: &str, value: f64) -> CubeResult<()> {
        self.writable_store(measure_id)?.fill(value);
        Ok(())
    }

    pub fn single_data(&self, measure_id: &str, coordinates: &[(&str, &str)]) -> CubeResult<f64> {
        let position = self.position(coordinates)?;
        Ok(self.reader(measure_id)?.get(position))
    }

    pub fn set_single_data(
        &mut self,
        measure_id: &str,
        coordinates: &[(&str, &str)],
        value: f64,
    ) -> CubeResult<()> {
        let position = self.position(coordinates)?;
        self.writable_store(measure_id)?.set(position, value);
        Ok(())
    }

    /// Occupied cell indexes. For a computed measure, the cells where any
    /// of its operands is set.
    pub fn status(&self, measure_id: &str) -> CubeResult<Vec<usize>> {
        if let Some(measure) = self.stored_measure(measure_id) {
            return Ok(measure.store.occupied());
        }
        let measure = self
            .computed_measure(measure_id)
            .ok_or_else(|| CubeError::UnknownMeasure(measure_id.to_string()))?;
        let mut occupied: Vec<usize> = self
            .operand_stores(measure)
            .iter()
            .flat_map(|store| store.occupied())
            .collect();
        occupied.sort_unstable();
        occupied.dedup();
        Ok(occupied)
    }

    /// Grand total. Stored measures sum their occupied cells; computed
    /// measures sum every cell.
    pub fn total(&self, measure_id: &str) -> CubeResult<f64> {
        if let Some(measure) = self.stored_measure(measure_id) {
            return Ok(measure.store.total());
        }
        Ok(self.data(measure_id)?.iter().sum())
    }

    /// Sum over the cells selected by `filter`: dimensions listed there are
    /// restricted to the given items, the others contribute every item.
    pub fn total_for_dimension_items(
        &self,
        measure_id: &str,
        filter: &[(String, Vec<String>)],
    ) -> CubeResult<f64> {
        let reader = self.reader(measure_id)?;
        Ok(self
            .filtered_positions(filter)?
            .into_iter()
            .map(|i| reader.get(i))
            .sum())
    }

    /// Share of the filtered total in the grand total. A zero grand total
    /// yields the filtered total itself.
    pub fn distribution(&self, measure_id: &str, filter: &[(String, Vec<String>)]) -> CubeResult<f64> {
        let space = self.total_for_dimension_items(measure_id, filter)?;
        let total = self.total(measure_id)?;
        Ok(if total == 0.0 { space } else { space / total })
    }

    /// Copies values of `source_id` into `target_id` on the filtered cells.
    pub fn copy_measure_data(
        &mut self,
        source_id: &str,
        target_id: &str,
        filter: &[(String, Vec<String>)],
    ) -> CubeResult<()> {
        let positions = self.filtered_positions(filter)?;
        let values: Vec<f64> = {
            let reader = self.reader(source_id)?;
            positions.iter().map(|&i| reader.get(i)).collect()
        };
        let store = self.writable_store(target_id)?;
        for (position, value) in positions.into_iter().zip(values) {
            store.set(position, value);
        }
        Ok(())
    }

    /// Cell indexes of the cross product described by `filter`.
    fn filtered_positions(&self, filter: &[(String, Vec<String>)]) -> CubeResult<Vec<usize>> {
        let mut positions = vec![0usize];
        for dimension in &self.dimensions {
            let indexes: Vec<usize> = match filter.iter().find(|(id, _)| id == dimension.id()) {
                Some((_, items)) => items
                    .iter()
                    .map(|item| {
                        dimension
                            .root_index_of(item)
                            .ok_or_else(|| CubeError::unknown_item(dimension.id(), item))
                    })
                    .collect::<CubeResult<_>>()?,
                None => (0..dimension.num_items()).collect(),
            };
            positions = positions
                .iter()
                .flat_map(|p| indexes.iter().map(move |i| p * dimension.num_items() + i))
                .collect();
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Dimension;

    fn cube() -> Cube {
        let mut cube = Cube::new(vec![
            Dimension::generic("location", "city", ["paris", "toledo", "tokyo"]).unwrap(),
            Dimension::generic("period", "season", ["summer", "winter"]).unwrap(),
        ])
        .unwrap();
        cube.create_stored_measure("antennas", AggregationRules::new(), MeasureType::Float32, DefaultValue::Zero)
            .unwrap();
        cube.set_data("antennas", &[1.0, 2.0, 4.0, 8.0, 16.0, 32.0]).unwrap();
        cube
    }

    #[test]
    fn test_measure_id_pattern() {
        assert!(validate_measure_id("antennas").is_ok());
        assert!(validate_measure_id("Routers_2").is_ok());
        assert!(validate_measure_id("_x__total").is_ok());
        assert!(validate_measure_id("a").is_err());
        assert!(validate_measure_id("2abc").is_err());
        assert!(validate_measure_id("with space").is_err());
    }

    #[test]
    fn test_ids_unique_across_stored_and_computed() {
        let mut cube = cube();
        cube.create_computed_measure("double", "antennas * 2").unwrap();
        let err = cube
            .create_stored_measure("double", AggregationRules::new(), MeasureType::Float32, DefaultValue::Zero)
            .unwrap_err();
        assert!(matches!(err, CubeError::DuplicateMeasure(_)));
    }

    #[test]
    fn test_computed_measure_flattens_references() {
        let mut cube = cube();
        cube.create_computed_measure("double", "antennas * 2").unwrap();
        cube.create_computed_measure("quad", "double * 2").unwrap();
        assert_eq!(cube.formula("quad").unwrap(), "((antennas * 2) * 2)");
        assert_eq!(cube.data("quad").unwrap(), vec![4.0, 8.0, 16.0, 32.0, 64.0, 128.0]);
    }

    #[test]
    fn test_computed_measure_rejects_unknown_operands() {
        let mut cube = cube();
        let err = cube.create_computed_measure("bad", "routers / antennas").unwrap_err();
        assert!(matches!(err, CubeError::UnknownMeasure(ref m) if m == "routers"));
    }

    #[test]
    fn test_total_reference_is_broadcast() {
        let mut cube = cube();
        cube.create_computed_measure("share", "antennas / antennas__total").unwrap();
        let share = cube.data("share").unwrap();
        assert_eq!(share[0], 1.0 / 63.0);
        assert_eq!(share[5], 32.0 / 63.0);
    }

    #[test]
    fn test_writes_do_not_leak_into_copies() {
        let mut cube = cube();
        cube.copy_stored_measure("antennas", "antennas_copy").unwrap();
        let snapshot = cube.clone();
        cube.fill_data("antennas", 7.0).unwrap();
        assert_eq!(cube.data("antennas_copy").unwrap()[0], 1.0);
        assert_eq!(snapshot.data("antennas").unwrap()[0], 1.0);
    }

    #[test]
    fn test_writing_computed_measure_fails() {
        let mut cube = cube();
        cube.create_computed_measure("double", "antennas * 2").unwrap();
        assert!(matches!(
            cube.set_data("double", &[0.0; 6]),
            Err(CubeError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_convert_to_stored_measure() {
        let mut cube = cube();
        cube.create_computed_measure("double", "antennas * 2").unwrap();
        cube.convert_to_stored_measure("double", AggregationRules::new(), MeasureType::Int32, DefaultValue::Zero)
            .unwrap();
        assert!(cube.computed_measure_ids().is_empty());
        assert_eq!(cube.store("double").unwrap().measure_type(), MeasureType::Int32);
        assert_eq!(cube.data("double").unwrap()[5], 64.0);
    }

    #[test]
    fn test_rename_rewrites_total_references() {
        let mut cube = cube();
        cube.create_computed_measure("share", "antennas / antennas__total").unwrap();
        cube.rename_measure("antennas", "masts").unwrap();
        assert_eq!(cube.formula("share").unwrap(), "(masts / masts__total)");
        assert_eq!(cube.data("share").unwrap()[5], 32.0 / 63.0);
    }

    #[test]
    fn test_drop_stored_drops_dependents() {
        let mut cube = cube();
        cube.create_computed_measure("share", "antennas / antennas__total").unwrap();
        cube.drop_measure("antennas").unwrap();
        assert!(cube.computed_measure_ids().is_empty());
        assert!(matches!(cube.drop_measure("antennas"), Err(CubeError::UnknownMeasure(_))));
    }

    #[test]
    fn test_replace_stored_measure() {
        let mut cube = cube();
        cube.copy_stored_measure("antennas", "masts").unwrap();
        cube.create_computed_measure("double", "masts * 2").unwrap();
        cube.replace_stored_measure("antennas", "masts").unwrap();
        assert_eq!(cube.stored_measure_ids(), vec!["antennas".to_string()]);
        assert_eq!(cube.formula("double").unwrap(), "(antennas * 2)");
    }

    #[test]
    fn test_single_data_and_status() {
        let mut cube = cube();
        cube.set_single_data("antennas", &[("location", "toledo"), ("period", "winter")], 0.0)
            .unwrap();
        assert_eq!(cube.status("antennas").unwrap(), vec![0, 1, 2, 4, 5]);
        assert_eq!(
            cube.single_data("antennas", &[("location", "tokyo"), ("period", "summer")]).unwrap(),
            16.0
        );
    }

    #[test]
    fn test_totals_and_distribution() {
        let cube = cube();
        let filter = vec![("location".to_string(), vec!["paris".to_string(), "tokyo".to_string()])];
        assert_eq!(cube.total("antennas").unwrap(), 63.0);
        assert_eq!(cube.total_for_dimension_items("antennas", &filter).unwrap(), 51.0);
        assert_eq!(cube.distribution("antennas", &filter).unwrap(), 51.0 / 63.0);
    }

    #[test]
    fn test_copy_measure_data_on_filtered_cells() {
        let mut cube = cube();
        cube.create_stored_measure("target", AggregationRules::new(), MeasureType::Float32, DefaultValue::NaN)
            .unwrap();
        let filter = vec![("period".to_string(), vec!["winter".to_string()])];
        cube.copy_measure_data("antennas", "target", &filter).unwrap();
        assert_eq!(cube.status("target").unwrap(), vec![1, 3, 5]);
        assert_eq!(cube.data("target").unwrap()[3], 8.0);
    }
}
