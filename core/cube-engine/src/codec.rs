//! FILENAME: core/cube-engine/src/codec.rs
//! Snapshot format of a whole cube.
//!
//! A cube is written as one JSON document: the dimension list with enough
//! metadata to rebuild each dimension, every stored measure with its type,
//! size, default and occupied cells, the rule table, and the computed
//! formulas as text. Occupied cells are two base64 buffers: little-endian
//! `u32` indexes and little-endian values of the measure's type, so values
//! (NaN included) come back bit for bit.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cube::{AggregationRules, Cube, StoredMeasure};
use crate::dimension::{Dimension, GenericDimension, Periodicity, TimeDimension};
use crate::error::{CubeError, CubeResult};
use crate::store::{DefaultValue, MeasureStore, MeasureType};

/// Current snapshot layout.
pub const FORMAT_VERSION: u32 = 1;

// ============================================================================
// SNAPSHOT TYPES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CubeSnapshot {
    version: u32,
    dimensions: Vec<DimensionSnapshot>,
    stored_measures: Vec<StoreSnapshot>,
    rules: BTreeMap<String, AggregationRules>,
    computed_measures: Vec<ComputedSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum DimensionSnapshot {
    #[serde(rename_all = "camelCase")]
    Generic {
        id: String,
        label: String,
        root_attribute: String,
        base_attribute: String,
        base_items: Vec<String>,
        levels: Vec<LevelSnapshot>,
        item_labels: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    Time {
        id: String,
        label: String,
        root_attribute: String,
        /// Days since 0001-01-01 (day 1), so empty ranges survive too.
        start: i32,
        end: i32,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct LevelSnapshot {
    name: String,
    parent: String,
    mapping: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    id: String,
    #[serde(rename = "type")]
    measure_type: MeasureType,
    size: usize,
    default: DefaultValue,
    indexes: String,
    values: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComputedSnapshot {
    id: String,
    formula: String,
}

// ============================================================================
// DIMENSIONS
// ============================================================================

impl From<&Dimension> for DimensionSnapshot {
    fn from(dimension: &Dimension) -> Self {
        match dimension {
            Dimension::Generic(d) => DimensionSnapshot::Generic {
                id: d.id().to_string(),
                label: d.label().to_string(),
                root_attribute: d.root_attribute().to_string(),
                base_attribute: d.base_attribute().to_string(),
                base_items: d.base_items().to_vec(),
                levels: d
                    .levels()
                    .iter()
                    .map(|level| LevelSnapshot {
                        name: level.name().to_string(),
                        parent: level.parent().to_string(),
                        mapping: level.mapping().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    })
                    .collect(),
                item_labels: d.item_labels().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            },
            Dimension::Time(d) => DimensionSnapshot::Time {
                id: d.id().to_string(),
                label: d.label().to_string(),
                root_attribute: d.root_attribute().to_string(),
                start: d.start().num_days_from_ce(),
                end: d.end().num_days_from_ce(),
            },
        }
    }
}

impl DimensionSnapshot {
    fn restore(self) -> CubeResult<Dimension> {
        match self {
            DimensionSnapshot::Generic {
                id,
                label,
                root_attribute,
                base_attribute,
                base_items,
                levels,
                item_labels,
            } => {
                let levels: Vec<(String, String, Vec<(String, String)>)> = levels
                    .into_iter()
                    .map(|l| (l.name, l.parent, l.mapping.into_iter().collect()))
                    .collect();
                Ok(Dimension::Generic(GenericDimension::from_parts(
                    id,
                    label,
                    root_attribute,
                    base_attribute,
                    base_items,
                    levels,
                    item_labels.into_iter().collect(),
                )?))
            }
            DimensionSnapshot::Time {
                id,
                label,
                root_attribute,
                start,
                end,
            } => {
                let root = Periodicity::parse(&root_attribute)
                    .ok_or_else(|| CubeError::unknown_attribute(&id, &root_attribute))?;
                let date = |days: i32| {
                    NaiveDate::from_num_days_from_ce_opt(days)
                        .ok_or_else(|| CubeError::Codec(format!("day {} out of range in dimension {}", days, id)))
                };
                Ok(Dimension::Time(TimeDimension::from_range(
                    &id,
                    &label,
                    root,
                    date(start)?,
                    date(end)?,
                )))
            }
        }
    }
}

// ============================================================================
// STORES
// ============================================================================

fn encode_store(id: &str, store: &MeasureStore) -> CubeResult<StoreSnapshot> {
    let entries = store.entries();
    let width = store.measure_type().byte_width();
    let mut indexes = Vec::with_capacity(entries.len() * 4);
    let mut values = Vec::with_capacity(entries.len() * width);
    for (index, value) in entries {
        let index = u32::try_from(index)
            .map_err(|_| CubeError::Codec(format!("cell index {} of {} does not fit in u32", index, id)))?;
        indexes.extend_from_slice(&index.to_le_bytes());
        store.measure_type().write_le(value, &mut values);
    }
    Ok(StoreSnapshot {
        id: id.to_string(),
        measure_type: store.measure_type(),
        size: store.len(),
        default: store.default_value(),
        indexes: STANDARD.encode(indexes),
        values: STANDARD.encode(values),
    })
}

fn decode_store(snapshot: &StoreSnapshot) -> CubeResult<MeasureStore> {
    let indexes = STANDARD.decode(&snapshot.indexes)?;
    let values = STANDARD.decode(&snapshot.values)?;
    let width = snapshot.measure_type.byte_width();
    if indexes.len() % 4 != 0 || values.len() % width != 0 || indexes.len() / 4 != values.len() / width {
        return Err(CubeError::Codec(format!(
            "measure {}: {} index bytes do not match {} value bytes",
            snapshot.id,
            indexes.len(),
            values.len()
        )));
    }

    let mut store = MeasureStore::new(snapshot.size, snapshot.measure_type, snapshot.default);
    for (index, value) in indexes.chunks_exact(4).zip(values.chunks_exact(width)) {
        let index = u32::from_le_bytes([index[0], index[1], index[2], index[3]]) as usize;
        if index >= snapshot.size {
            return Err(CubeError::Codec(format!(
                "measure {}: cell {} outside store of {}",
                snapshot.id, index, snapshot.size
            )));
        }
        let value = snapshot
            .measure_type
            .read_le(value)
            .ok_or_else(|| CubeError::Codec(format!("measure {}: truncated value", snapshot.id)))?;
        store.set(index, value);
    }
    Ok(store)
}

// ============================================================================
// CUBE
// ============================================================================

impl Cube {
    pub fn serialize(&self) -> CubeResult<Vec<u8>> {
        let snapshot = CubeSnapshot {
            version: FORMAT_VERSION,
            dimensions: self.dimensions.iter().map(|d| DimensionSnapshot::from(d.as_ref())).collect(),
            stored_measures: self
                .stored
                .iter()
                .map(|m| encode_store(&m.id, &m.store))
                .collect::<CubeResult<_>>()?,
            rules: self.stored.iter().map(|m| (m.id.clone(), m.rules.clone())).collect(),
            computed_measures: self
                .computed
                .iter()
                .map(|m| ComputedSnapshot {
                    id: m.id.clone(),
                    formula: m.expression.to_string(),
                })
                .collect(),
        };
        log_debug!(
            "CODEC",
            "serialize {} dimensions, {} stored measures",
            snapshot.dimensions.len(),
            snapshot.stored_measures.len()
        );
        Ok(serde_json::to_vec(&snapshot)?)
    }

    pub fn deserialize(bytes: &[u8]) -> CubeResult<Cube> {
        let snapshot: CubeSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != FORMAT_VERSION {
            return Err(CubeError::Codec(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, FORMAT_VERSION
            )));
        }

        let dimensions = snapshot
            .dimensions
            .into_iter()
            .map(|d| d.restore().map(Arc::new))
            .collect::<CubeResult<Vec<_>>>()?;
        let mut cube = Cube::from_shared(dimensions)?;
        let size = cube.store_size();

        let mut rules = snapshot.rules;
        for stored in &snapshot.stored_measures {
            cube.check_new_measure(&stored.id)?;
            let store = decode_store(stored)?;
            if store.len() != size {
                return Err(CubeError::SizeMismatch {
                    expected: size,
                    actual: store.len(),
                });
            }
            cube.stored.push(StoredMeasure {
                id: stored.id.clone(),
                store: Arc::new(store),
                rules: rules.remove(&stored.id).unwrap_or_default(),
            });
        }
        // Same checks as a live cube: valid unique ids, operands all stored
        for computed in &snapshot.computed_measures {
            cube.create_computed_measure(&computed.id, &computed.formula)?;
        }
        Ok(cube)
    }

    pub fn serialize_to_base64(&self) -> CubeResult<String> {
        Ok(STANDARD.encode(self.serialize()?))
    }

    pub fn deserialize_from_base64(encoded: &str) -> CubeResult<Cube> {
        Cube::deserialize(&STANDARD.decode(encoded)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Cube {
        let location = GenericDimension::new(
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
        .unwrap();
        let mut cube = Cube::new(vec![
            Dimension::Generic(location),
            Dimension::time("time", "month", "2010-01", "2010-02").unwrap(),
        ])
        .unwrap();
        cube.create_stored_measure("antennas", BTreeMap::new(), MeasureType::Int32, DefaultValue::NaN)
            .unwrap();
        cube.set_data("antennas", &[1.0, 2.0, 4.0, 8.0, 16.0, 32.0]).unwrap();
        cube.create_stored_measure("ratio", BTreeMap::new(), MeasureType::Float64, DefaultValue::Zero)
            .unwrap();
        cube.set_data("ratio", &[0.1, f64::NAN, 0.0, -2.5, 0.0, 0.0]).unwrap();
        cube.create_computed_measure("double", "antennas * 2").unwrap();
        cube
    }

    #[test]
    fn test_round_trip_keeps_values_and_metadata() {
        let cube = cube();
        let back = Cube::deserialize(&cube.serialize().unwrap()).unwrap();

        assert_eq!(back.dimensions(), cube.dimensions());
        assert_eq!(back.data("antennas").unwrap(), cube.data("antennas").unwrap());
        assert_eq!(back.data("double").unwrap(), cube.data("double").unwrap());
        assert_eq!(back.store("antennas").unwrap().measure_type(), MeasureType::Int32);
        assert_eq!(back.status("ratio").unwrap(), vec![0, 1, 3]);

        let ratio = back.data("ratio").unwrap();
        assert_eq!(ratio[0], 0.1);
        assert!(ratio[1].is_nan());
    }

    #[test]
    fn test_base64_round_trip() {
        let cube = cube().drill_up("location", "continent").unwrap();
        let back = Cube::deserialize_from_base64(&cube.serialize_to_base64().unwrap()).unwrap();
        assert_eq!(back.dimension("location").unwrap().items(), &["europe", "asia"]);
        assert_eq!(back.data("antennas").unwrap(), vec![5.0, 10.0, 16.0, 32.0]);
    }

    #[test]
    fn test_empty_time_range_survives() {
        let cube = Cube::new(vec![Dimension::time("time", "month", "2010-05", "2010-01").unwrap()]).unwrap();
        let back = Cube::deserialize(&cube.serialize().unwrap()).unwrap();
        assert_eq!(back.store_size(), 0);
    }

    #[test]
    fn test_unknown_version_fails() {
        let mut json: serde_json::Value = serde_json::from_slice(&cube().serialize().unwrap()).unwrap();
        json["version"] = serde_json::json!(99);
        let err = Cube::deserialize(&serde_json::to_vec(&json).unwrap()).unwrap_err();
        assert!(matches!(err, CubeError::Codec(_)));
    }

    #[test]
    fn test_snapshot_measures_are_validated_on_load() {
        let bytes = cube().serialize().unwrap();

        let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["computedMeasures"][0]["formula"] = serde_json::json!("(antennas * inf)");
        let err = Cube::deserialize(&serde_json::to_vec(&json).unwrap()).unwrap_err();
        assert!(matches!(err, CubeError::UnknownMeasure(name) if name == "inf"));

        let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["computedMeasures"][0]["id"] = serde_json::json!("ratio");
        let err = Cube::deserialize(&serde_json::to_vec(&json).unwrap()).unwrap_err();
        assert!(matches!(err, CubeError::DuplicateMeasure(_)));

        let mut json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["storedMeasures"][1]["id"] = serde_json::json!("antennas");
        let err = Cube::deserialize(&serde_json::to_vec(&json).unwrap()).unwrap_err();
        assert!(matches!(err, CubeError::DuplicateMeasure(_)));
    }
}
