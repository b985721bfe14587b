//! FILENAME: core/cube-engine/src/formatter.rs
//! Nested views of a measure's flat values.
//!
//! A `NestedArray` has one array level per dimension, in cube order; a
//! `NestedObject` has one object level per dimension keyed by item. With no
//! dimension both are a single number. Both serialize to plain JSON, with
//! NaN written as `null` and read back from it.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::dimension::Axis;
use crate::error::{CubeError, CubeResult};

// ============================================================================
// NESTED ARRAY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedArray {
    Value(#[serde(deserialize_with = "nan_from_null")] f64),
    Array(Vec<NestedArray>),
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

pub fn to_nested_array(values: &[f64], dimensions: &[&dyn Axis]) -> NestedArray {
    let lengths: Vec<usize> = dimensions.iter().map(|d| d.num_items()).collect();
    if lengths.is_empty() {
        return NestedArray::Value(values.first().copied().unwrap_or(f64::NAN));
    }
    build_array(values, &lengths)
}

fn build_array(values: &[f64], lengths: &[usize]) -> NestedArray {
    match lengths {
        [] | [_] => NestedArray::Array(values.iter().map(|v| NestedArray::Value(*v)).collect()),
        [first, rest @ ..] => {
            let chunk: usize = rest.iter().product();
            NestedArray::Array(
                (0..*first)
                    .map(|i| build_array(&values[i * chunk..(i + 1) * chunk], rest))
                    .collect(),
            )
        }
    }
}

/// Flattens `array`, which must have exactly the shape of `dimensions`.
pub fn from_nested_array(array: &NestedArray, dimensions: &[&dyn Axis]) -> CubeResult<Vec<f64>> {
    let lengths: Vec<usize> = dimensions.iter().map(|d| d.num_items()).collect();
    let mut values = Vec::with_capacity(lengths.iter().product());
    flatten_array(array, &lengths, &mut values)?;
    Ok(values)
}

fn flatten_array(array: &NestedArray, lengths: &[usize], out: &mut Vec<f64>) -> CubeResult<()> {
    match (array, lengths.split_first()) {
        (NestedArray::Value(value), None) => {
            out.push(*value);
            Ok(())
        }
        (NestedArray::Array(children), Some((&length, rest))) => {
            if children.len() != length {
                return Err(CubeError::SizeMismatch {
                    expected: length,
                    actual: children.len(),
                });
            }
            for child in children {
                flatten_array(child, rest, out)?;
            }
            Ok(())
        }
        (NestedArray::Value(_), Some(_)) => Err(CubeError::Codec("nested array is too shallow".into())),
        (NestedArray::Array(_), None) => Err(CubeError::Codec("nested array is too deep".into())),
    }
}

// ============================================================================
// NESTED OBJECT
// ============================================================================

/// Item-keyed tree. Keys keep item order.
#[derive(Debug, Clone, PartialEq)]
pub enum NestedObject {
    Value(f64),
    Object(Vec<(String, NestedObject)>),
}

impl NestedObject {
    pub fn get(&self, key: &str) -> Option<&NestedObject> {
        match self {
            NestedObject::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            NestedObject::Value(_) => None,
        }
    }

    /// Follows `path` down the tree.
    pub fn at(&self, path: &[&str]) -> Option<&NestedObject> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_value(&self) -> Option<f64> {
        match self {
            NestedObject::Value(value) => Some(*value),
            NestedObject::Object(_) => None,
        }
    }

    /// Deep merge: objects merge key by key, anything else is replaced.
    pub fn merge(&mut self, other: NestedObject) {
        match (self, other) {
            (NestedObject::Object(entries), NestedObject::Object(others)) => {
                for (key, value) in others {
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, existing)) => existing.merge(value),
                        None => entries.push((key, value)),
                    }
                }
            }
            (this, other) => *this = other,
        }
    }
}

impl Serialize for NestedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NestedObject::Value(value) => serializer.serialize_f64(*value),
            NestedObject::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct NestedObjectVisitor;

impl<'de> Visitor<'de> for NestedObjectVisitor {
    type Value = NestedObject;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number, null or an object")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<NestedObject, E> {
        Ok(NestedObject::Value(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<NestedObject, E> {
        Ok(NestedObject::Value(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<NestedObject, E> {
        Ok(NestedObject::Value(value as f64))
    }

    fn visit_unit<E: de::Error>(self) -> Result<NestedObject, E> {
        Ok(NestedObject::Value(f64::NAN))
    }

    fn visit_none<E: de::Error>(self) -> Result<NestedObject, E> {
        Ok(NestedObject::Value(f64::NAN))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NestedObject, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, NestedObject>()? {
            entries.push((key, value));
        }
        Ok(NestedObject::Object(entries))
    }
}

impl<'de> Deserialize<'de> for NestedObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NestedObjectVisitor)
    }
}

pub fn to_nested_object(values: &[f64], dimensions: &[&dyn Axis]) -> NestedObject {
    build_object(values, dimensions, 0)
}

fn build_object(values: &[f64], dimensions: &[&dyn Axis], offset: usize) -> NestedObject {
    let Some((dimension, rest)) = dimensions.split_first() else {
        return NestedObject::Value(values.get(offset).copied().unwrap_or(f64::NAN));
    };
    let items = dimension.items();
    NestedObject::Object(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), build_object(values, rest, offset * items.len() + i)))
            .collect(),
    )
}

/// Flat values read from `object`. Missing keys read as NaN.
pub fn from_nested_object(object: &NestedObject, dimensions: &[&dyn Axis]) -> CubeResult<Vec<f64>> {
    let mut level: Vec<Option<&NestedObject>> = vec![Some(object)];
    for dimension in dimensions {
        let mut next = Vec::with_capacity(level.len() * dimension.num_items());
        for node in &level {
            for item in dimension.items() {
                let child = match node {
                    Some(NestedObject::Object(_)) => node.and_then(|n| n.get(item)),
                    Some(NestedObject::Value(_)) => {
                        return Err(CubeError::Codec(format!(
                            "expected an object keyed by {} items",
                            dimension.id()
                        )))
                    }
                    None => None,
                };
                next.push(child);
            }
        }
        level = next;
    }
    level
        .into_iter()
        .map(|node| match node {
            Some(NestedObject::Value(value)) => Ok(*value),
            Some(NestedObject::Object(_)) => Err(CubeError::Codec("nested object is too deep".into())),
            None => Ok(f64::NAN),
        })
        .collect()
}
