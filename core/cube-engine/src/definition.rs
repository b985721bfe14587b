//! FILENAME: core/cube-engine/src/definition.rs
//! Cube Definition - the serializable statement of what a cube is.
//!
//! A definition lists the dimensions, the stored measures with their type,
//! default and aggregation rules, and the computed measures as formulas.
//! It carries no cell values; `build` turns it into an empty cube ready to
//! be filled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cube::Cube;
use crate::dimension::{Dimension, GenericDimension, TimeDimension};
use crate::error::CubeResult;
use crate::store::{AggregationMethod, DefaultValue, MeasureType};

// ============================================================================
// DIMENSIONS
// ============================================================================

/// A coarser attribute, described by the label each `parent` item rolls up to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub parent: String,
    pub mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DimensionDefinition {
    #[serde(rename_all = "camelCase")]
    Generic {
        id: String,
        #[serde(default)]
        label: Option<String>,
        /// Finest attribute; `items` are its items.
        root_attribute: String,
        items: Vec<String>,
        /// Coarser attributes, parents before children.
        #[serde(default)]
        attributes: Vec<AttributeDefinition>,
        /// Display labels, keyed by item.
        #[serde(default)]
        item_labels: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    Time {
        id: String,
        #[serde(default)]
        label: Option<String>,
        root_attribute: String,
        start: String,
        end: String,
    },
}

impl DimensionDefinition {
    pub fn id(&self) -> &str {
        match self {
            DimensionDefinition::Generic { id, .. } | DimensionDefinition::Time { id, .. } => id,
        }
    }

    pub fn build(&self) -> CubeResult<Dimension> {
        match self {
            DimensionDefinition::Generic {
                id,
                label,
                root_attribute,
                items,
                attributes,
                item_labels,
            } => {
                let dimension = GenericDimension::from_parts(
                    id.clone(),
                    label.clone().unwrap_or_else(|| id.clone()),
                    root_attribute.clone(),
                    root_attribute.clone(),
                    items.clone(),
                    attributes
                        .iter()
                        .map(|a| {
                            let mapping: Vec<(String, String)> =
                                a.mapping.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                            (a.name.clone(), a.parent.clone(), mapping)
                        })
                        .collect(),
                    item_labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                )?;
                Ok(Dimension::Generic(dimension))
            }
            DimensionDefinition::Time {
                id,
                label,
                root_attribute,
                start,
                end,
            } => {
                let dimension = TimeDimension::new(id, root_attribute, start, end)?;
                Ok(Dimension::Time(match label {
                    Some(label) => dimension.with_label(label),
                    None => dimension,
                }))
            }
        }
    }
}

// ============================================================================
// MEASURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMeasureDefinition {
    pub id: String,

    /// Aggregation per dimension id; dimensions not listed use `sum`.
    #[serde(default)]
    pub rules: BTreeMap<String, AggregationMethod>,

    #[serde(default, rename = "type")]
    pub measure_type: MeasureType,

    #[serde(default)]
    pub default: DefaultValue,
}

impl StoredMeasureDefinition {
    pub fn new(id: &str) -> Self {
        StoredMeasureDefinition {
            id: id.to_string(),
            rules: BTreeMap::new(),
            measure_type: MeasureType::default(),
            default: DefaultValue::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedMeasureDefinition {
    pub id: String,
    pub formula: String,
}

// ============================================================================
// CUBE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeDefinition {
    pub dimensions: Vec<DimensionDefinition>,

    #[serde(default)]
    pub stored_measures: Vec<StoredMeasureDefinition>,

    /// Built in order, so a formula may use computed measures listed before it.
    #[serde(default)]
    pub computed_measures: Vec<ComputedMeasureDefinition>,
}

impl CubeDefinition {
    pub fn from_json(json: &str) -> CubeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> CubeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// An empty cube with every dimension and measure of the definition.
    pub fn build(&self) -> CubeResult<Cube> {
        log_enter!(
            "DEFINITION",
            "build",
            "dimensions={} stored={} computed={}",
            self.dimensions.len(),
            self.stored_measures.len(),
            self.computed_measures.len()
        );
        let dimensions = self
            .dimensions
            .iter()
            .map(DimensionDefinition::build)
            .collect::<CubeResult<Vec<_>>>()?;
        let mut cube = Cube::new(dimensions)?;
        for measure in &self.stored_measures {
            cube.create_stored_measure(&measure.id, measure.rules.clone(), measure.measure_type, measure.default)?;
        }
        for measure in &self.computed_measures {
            cube.create_computed_measure(&measure.id, &measure.formula)?;
        }
        log_exit!("DEFINITION", "build", "size={}", cube.store_size());
        Ok(cube)
    }
}
