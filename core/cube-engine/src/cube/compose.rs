//! FILENAME: core/cube-engine/src/cube/compose.rs
//! Combining cubes: composition into a new cube, and hydration of an
//! existing cube from another one.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{axes, Cube};
use crate::error::{CubeError, CubeResult};

impl Cube {
    /// New cube holding the measures of both cubes.
    ///
    /// Dimensions present in both are intersected (or united with `union`);
    /// the others are dropped. Every stored measure is recreated with its
    /// type, default and rules, optionally pre-filled from `fill_with`, then
    /// loaded from its source cube. A stored measure present in both cubes
    /// is an error. Computed measures of `other` win over same-named ones
    /// of `self`.
    pub fn compose(&self, other: &Cube, union: bool, fill_with: Option<&BTreeMap<String, f64>>) -> CubeResult<Cube> {
        log_enter!("CUBE", "compose", "union={}", union);
        let dimensions = self
            .dimensions
            .iter()
            .filter_map(|mine| {
                other.dimension(mine.id()).map(|theirs| {
                    if union {
                        mine.union(theirs)
                    } else {
                        mine.intersect(theirs)
                    }
                })
            })
            .map(|d| d.map(Arc::new))
            .collect::<CubeResult<Vec<_>>>()?;

        let mut cube = Cube::from_shared(dimensions)?;
        for source in [self, other] {
            for measure in &source.stored {
                cube.create_stored_measure(
                    &measure.id,
                    measure.rules.clone(),
                    measure.store.measure_type(),
                    measure.store.default_value(),
                )?;
                if let Some(value) = fill_with.and_then(|f| f.get(&measure.id)) {
                    cube.fill_data(&measure.id, *value)?;
                }
            }
        }
        cube.hydrate_from_cube(self)?;
        cube.hydrate_from_cube(other)?;

        for measure in self.computed.iter().chain(other.computed.iter()) {
            if cube.stored_measure(&measure.id).is_some() {
                return Err(CubeError::DuplicateMeasure(measure.id.clone()));
            }
            match cube.computed.iter_mut().find(|m| m.id == measure.id) {
                Some(existing) => {
                    log_warn!("CUBE", "compose: computed measure {} replaced by the other cube's formula", measure.id);
                    *existing = measure.clone();
                }
                None => cube.computed.push(measure.clone()),
            }
        }

        log_exit!("CUBE", "compose", "{} cells", cube.store_size());
        Ok(cube)
    }

    /// Loads every stored measure shared with `other`, after reshaping
    /// `other` to this cube's layout. Cubes whose dimensions cannot be
    /// aligned are skipped.
    pub fn hydrate_from_cube(&mut self, other: &Cube) -> CubeResult<()> {
        let compatible = match other.reshape(&self.dimensions) {
            Ok(cube) => cube,
            Err(CubeError::IncompatibleDimension { dimension, reason }) => {
                log_info!("CUBE", "hydrate skipped, dimension {} incompatible: {}", dimension, reason);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let my_axes = axes(&self.dimensions);
        let their_axes = compatible.axes();
        for measure in self.stored.iter_mut() {
            if let Some(source) = compatible.stored_measure(&measure.id) {
                Arc::make_mut(&mut measure.store).load(&source.store, &my_axes, &their_axes)?;
            }
        }
        Ok(())
    }
}
