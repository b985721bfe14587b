//! FILENAME: core/cube-engine/src/dimension/generic.rs
//! Categorical dimension with an explicit attribute hierarchy.
//!
//! The dimension keeps its finest known items (the *base*) and one mapping
//! table per coarser attribute (`city -> country -> continent`). The root
//! attribute selects which level the cube currently addresses; drilling up
//! or down only moves the root, so the base survives a round trip.

use rustc_hash::{FxHashMap, FxHashSet};

use super::ALL;
use crate::error::{CubeError, CubeResult};

/// One coarser attribute: every item of `parent` maps to one item of `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    name: String,
    parent: String,
    mapping: FxHashMap<String, String>,
}

impl Level {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn mapping(&self) -> &FxHashMap<String, String> {
        &self.mapping
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericDimension {
    id: String,
    label: String,
    root_attribute: String,
    base_attribute: String,
    base_items: Vec<String>,
    levels: Vec<Level>,
    /// Display labels of base items, when they differ from the item itself.
    item_labels: FxHashMap<String, String>,

    // Derived from the fields above by `refresh`.
    items: Vec<String>,
    items_to_idx: FxHashMap<String, usize>,
    /// Per attribute, the bucket index of every root item.
    group_indexes: FxHashMap<String, Vec<usize>>,
}

impl GenericDimension {
    pub fn new(id: &str, root_attribute: &str, items: Vec<String>) -> CubeResult<Self> {
        let mut seen = FxHashSet::default();
        for item in &items {
            if !seen.insert(item.as_str()) {
                return Err(CubeError::DuplicateItem {
                    dimension: id.to_string(),
                    item: item.clone(),
                });
            }
        }

        let mut dimension = GenericDimension {
            id: id.to_string(),
            label: id.to_string(),
            root_attribute: root_attribute.to_string(),
            base_attribute: root_attribute.to_string(),
            base_items: items,
            levels: Vec::new(),
            item_labels: FxHashMap::default(),
            items: Vec::new(),
            items_to_idx: FxHashMap::default(),
            group_indexes: FxHashMap::default(),
        };
        dimension.refresh()?;
        Ok(dimension)
    }

    /// Rebuilds a dimension from its serialized parts.
    pub(crate) fn from_parts(
        id: String,
        label: String,
        root_attribute: String,
        base_attribute: String,
        base_items: Vec<String>,
        levels: Vec<(String, String, Vec<(String, String)>)>,
        item_labels: Vec<(String, String)>,
    ) -> CubeResult<Self> {
        let mut dimension = GenericDimension::new(&id, &base_attribute, base_items)?;
        dimension.label = label;
        for (name, parent, mapping) in levels {
            dimension = dimension.with_attribute(&parent, &name, mapping)?;
        }
        dimension.item_labels = item_labels.into_iter().collect();
        if root_attribute != dimension.root_attribute {
            dimension.root_attribute = root_attribute;
            dimension.refresh()?;
        }
        Ok(dimension)
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Adds a coarser attribute above `parent`. `mapping` must cover every item of `parent`.
    pub fn with_attribute<K, V>(
        &self,
        parent: &str,
        attribute: &str,
        mapping: impl IntoIterator<Item = (K, V)>,
    ) -> CubeResult<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        if parent != self.base_attribute && self.level(parent).is_none() {
            return Err(CubeError::unknown_attribute(&self.id, parent));
        }
        if attribute == ALL || attribute == self.base_attribute || self.level(attribute).is_some() {
            return Err(CubeError::UnsupportedOperation(format!(
                "attribute {} already exists in dimension {}",
                attribute, self.id
            )));
        }

        let mapping: FxHashMap<String, String> =
            mapping.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        for item in self.base_labels(parent)? {
            if !mapping.contains_key(&item) {
                return Err(CubeError::unknown_item(&self.id, &item));
            }
        }

        let mut dimension = self.clone();
        dimension.levels.push(Level {
            name: attribute.to_string(),
            parent: parent.to_string(),
            mapping,
        });
        dimension.refresh()?;
        Ok(dimension)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root_attribute(&self) -> &str {
        &self.root_attribute
    }

    pub fn base_attribute(&self) -> &str {
        &self.base_attribute
    }

    pub fn base_items(&self) -> &[String] {
        &self.base_items
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn item_labels(&self) -> &FxHashMap<String, String> {
        &self.item_labels
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn items_to_idx(&self) -> &FxHashMap<String, usize> {
        &self.items_to_idx
    }

    /// Root attribute, every attribute it rolls up into, then `all`.
    pub fn attributes(&self) -> Vec<String> {
        let mut attributes = vec![self.root_attribute.clone()];
        if self.root_attribute != ALL {
            attributes.extend(
                self.levels
                    .iter()
                    .filter(|level| self.is_above(&level.name, &self.root_attribute))
                    .map(|level| level.name.clone()),
            );
            attributes.push(ALL.to_string());
        }
        attributes
    }

    /// Bucket index among `items_at(attribute)` of every root item.
    pub fn group_indexes(&self, attribute: &str) -> CubeResult<&[usize]> {
        self.group_indexes
            .get(attribute)
            .map(Vec::as_slice)
            .ok_or_else(|| CubeError::unknown_attribute(&self.id, attribute))
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        attribute == ALL || attribute == self.root_attribute || self.is_above(attribute, &self.root_attribute)
    }

    /// Items at `attribute`, in order of first appearance over the base items.
    pub fn items_at(&self, attribute: &str) -> CubeResult<Vec<String>> {
        if attribute == self.root_attribute {
            return Ok(self.items.clone());
        }
        self.check_attribute(attribute)?;
        Ok(distinct(self.base_labels(attribute)?))
    }

    /// For every root item, the item it rolls up into at `attribute`.
    pub fn group_items(&self, attribute: &str) -> CubeResult<Vec<String>> {
        self.check_attribute(attribute)?;
        if attribute == ALL {
            return Ok(vec![ALL.to_string(); self.items.len()]);
        }
        let roots = self.base_labels(&self.root_attribute)?;
        let groups = self.base_labels(attribute)?;
        let by_root: FxHashMap<&str, &str> = roots
            .iter()
            .zip(groups.iter())
            .map(|(r, g)| (r.as_str(), g.as_str()))
            .collect();
        Ok(self
            .items
            .iter()
            .map(|item| by_root.get(item.as_str()).map(|g| g.to_string()).unwrap_or_default())
            .collect())
    }

    pub fn entries(&self, attribute: &str) -> CubeResult<Vec<(String, String)>> {
        Ok(self
            .items_at(attribute)?
            .into_iter()
            .map(|item| {
                let label = self.item_labels.get(&item).cloned().unwrap_or_else(|| item.clone());
                (item, label)
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Reshaping
    // ------------------------------------------------------------------------

    pub fn dice(&self, attribute: &str, items: &[String], reorder: bool) -> CubeResult<Self> {
        self.check_attribute(attribute)?;

        if reorder {
            if attribute != self.root_attribute {
                return Err(CubeError::UnsupportedOperation(format!(
                    "reordering dice on {} must use the root attribute {}",
                    self.id, self.root_attribute
                )));
            }
            let mut seen = FxHashSet::default();
            let kept: Vec<String> = items
                .iter()
                .filter(|item| self.items_to_idx.contains_key(item.as_str()))
                .filter(|item| seen.insert(item.as_str()))
                .cloned()
                .collect();
            if kept == self.items {
                return Ok(self.clone());
            }
            return self.rebased()?.with_base_items(kept);
        }

        let wanted: FxHashSet<&str> = items.iter().map(|s| s.as_str()).collect();
        let labels = self.base_labels(attribute)?;
        let kept: Vec<String> = self
            .base_items
            .iter()
            .zip(labels.iter())
            .filter(|(_, label)| wanted.contains(label.as_str()))
            .map(|(item, _)| item.clone())
            .collect();
        if kept.len() == self.base_items.len() {
            return Ok(self.clone());
        }
        self.with_base_items(kept)
    }

    pub fn dice_range(&self, attribute: &str, start: Option<&str>, end: Option<&str>) -> CubeResult<Self> {
        let items = self.items_at(attribute)?;
        let position = |item: &str| {
            items
                .iter()
                .position(|i| i == item)
                .ok_or_else(|| CubeError::unknown_item(&self.id, item))
        };
        let first = match start {
            Some(item) => position(item)?,
            None => 0,
        };
        let last = match end {
            Some(item) => position(item)? + 1,
            None => items.len(),
        };
        let selected = if first < last { &items[first..last] } else { &[][..] };
        self.dice(attribute, selected, false)
    }

    pub fn drill_up(&self, attribute: &str) -> CubeResult<Self> {
        if attribute == self.root_attribute {
            return Ok(self.clone());
        }
        self.check_attribute(attribute)?;
        self.with_root(attribute)
    }

    pub fn drill_down(&self, attribute: &str) -> CubeResult<Self> {
        if attribute == self.root_attribute {
            return Ok(self.clone());
        }
        let known = attribute == self.base_attribute || self.level(attribute).is_some();
        let refines = self.root_attribute == ALL || self.is_above(&self.root_attribute, attribute);
        if !known || !refines {
            return Err(CubeError::UnsupportedOperation(format!(
                "cannot drill dimension {} down from {} to {}",
                self.id, self.root_attribute, attribute
            )));
        }
        self.with_root(attribute)
    }

    /// Sorted merged item set at the coarser of the two roots.
    pub fn union(&self, other: &GenericDimension) -> CubeResult<Self> {
        let root = self.common_root(other)?;
        let mine = self.drill_up(&root)?.rebased()?;
        let theirs = other.drill_up(&root)?.rebased()?;

        let mut items: Vec<String> = mine.base_items.clone();
        let known: FxHashSet<&str> = mine.base_items.iter().map(|s| s.as_str()).collect();
        items.extend(theirs.base_items.iter().filter(|i| !known.contains(i.as_str())).cloned());
        items.sort();

        // Only levels both sides can map survive, merged
        let mut levels: Vec<Level> = Vec::new();
        for level in &mine.levels {
            let parent_kept = level.parent == mine.base_attribute || levels.iter().any(|l| l.name == level.parent);
            let counterpart = theirs
                .levels
                .iter()
                .find(|l| l.name == level.name && l.parent == level.parent);
            if let (true, Some(counterpart)) = (parent_kept, counterpart) {
                let mut mapping = counterpart.mapping.clone();
                mapping.extend(level.mapping.iter().map(|(k, v)| (k.clone(), v.clone())));
                levels.push(Level {
                    name: level.name.clone(),
                    parent: level.parent.clone(),
                    mapping,
                });
            }
        }

        let mut item_labels = theirs.item_labels.clone();
        item_labels.extend(mine.item_labels.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut merged = GenericDimension {
            base_items: items,
            levels,
            item_labels,
            ..mine
        };
        merged.refresh()?;
        Ok(merged)
    }

    /// Overlap at the coarser of the two roots, in this dimension's order.
    pub fn intersect(&self, other: &GenericDimension) -> CubeResult<Self> {
        let root = self.common_root(other)?;
        let mine = self.drill_up(&root)?.rebased()?;
        let theirs = other.drill_up(&root)?;
        let kept: Vec<String> = mine
            .base_items
            .iter()
            .filter(|item| theirs.items_to_idx.contains_key(item.as_str()))
            .cloned()
            .collect();
        if kept.len() == mine.base_items.len() {
            return Ok(mine);
        }
        mine.with_base_items(kept)
    }

    /// Renames a root item. Only possible while the root is the base attribute.
    pub fn rename_item(&self, item: &str, new_name: &str, new_label: Option<&str>) -> CubeResult<Self> {
        if self.root_attribute != self.base_attribute {
            return Err(CubeError::UnsupportedOperation(format!(
                "items of {} can only be renamed at {}",
                self.id, self.base_attribute
            )));
        }
        if !self.items_to_idx.contains_key(item) {
            return Err(CubeError::unknown_item(&self.id, item));
        }
        if item != new_name && self.items_to_idx.contains_key(new_name) {
            return Err(CubeError::DuplicateItem {
                dimension: self.id.clone(),
                item: new_name.to_string(),
            });
        }

        let mut dimension = self.clone();
        for base in dimension.base_items.iter_mut() {
            if base == item {
                *base = new_name.to_string();
            }
        }
        for level in dimension.levels.iter_mut().filter(|l| l.parent == self.base_attribute) {
            if let Some(group) = level.mapping.remove(item) {
                level.mapping.insert(new_name.to_string(), group);
            }
        }
        let old_label = dimension.item_labels.remove(item);
        if let Some(label) = new_label.map(str::to_string).or(old_label) {
            dimension.item_labels.insert(new_name.to_string(), label);
        }
        dimension.refresh()?;
        Ok(dimension)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// True if `attribute` is a level strictly coarser than `below`.
    fn is_above(&self, attribute: &str, below: &str) -> bool {
        let mut current = match self.level(attribute) {
            Some(level) => level,
            None => return false,
        };
        loop {
            if current.parent == below {
                return true;
            }
            match self.level(&current.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn check_attribute(&self, attribute: &str) -> CubeResult<()> {
        if self.has_attribute(attribute) {
            Ok(())
        } else {
            Err(CubeError::unknown_attribute(&self.id, attribute))
        }
    }

    /// Label of every base item at `attribute`.
    fn base_labels(&self, attribute: &str) -> CubeResult<Vec<String>> {
        if attribute == self.base_attribute {
            return Ok(self.base_items.clone());
        }
        if attribute == ALL {
            return Ok(vec![ALL.to_string(); self.base_items.len()]);
        }

        // Levels from just above the base up to `attribute`
        let mut path = Vec::new();
        let mut current = self
            .level(attribute)
            .ok_or_else(|| CubeError::unknown_attribute(&self.id, attribute))?;
        loop {
            path.push(current);
            if current.parent == self.base_attribute {
                break;
            }
            current = self
                .level(&current.parent)
                .ok_or_else(|| CubeError::unknown_attribute(&self.id, &current.parent))?;
        }

        self.base_items
            .iter()
            .map(|item| {
                let mut label = item.as_str();
                for level in path.iter().rev() {
                    label = level
                        .mapping
                        .get(label)
                        .map(String::as_str)
                        .ok_or_else(|| CubeError::unknown_item(&self.id, label))?;
                }
                Ok(label.to_string())
            })
            .collect()
    }

    fn common_root(&self, other: &GenericDimension) -> CubeResult<String> {
        if self.id != other.id {
            return Err(CubeError::incompatible(
                &self.id,
                format!("cannot combine with dimension {}", other.id),
            ));
        }
        if self.has_attribute(&other.root_attribute) {
            Ok(other.root_attribute.clone())
        } else if other.has_attribute(&self.root_attribute) {
            Ok(self.root_attribute.clone())
        } else {
            Err(CubeError::incompatible(
                &self.id,
                format!(
                    "attributes {} and {} are not in the same hierarchy",
                    self.root_attribute, other.root_attribute
                ),
            ))
        }
    }

    /// Same dimension with the root attribute as its base; finer levels are forgotten.
    fn rebased(&self) -> CubeResult<Self> {
        if self.root_attribute == self.base_attribute {
            return Ok(self.clone());
        }
        let levels = self
            .levels
            .iter()
            .filter(|level| self.is_above(&level.name, &self.root_attribute))
            .cloned()
            .collect();
        let mut dimension = GenericDimension {
            base_attribute: self.root_attribute.clone(),
            base_items: self.items.clone(),
            levels,
            item_labels: FxHashMap::default(),
            ..self.clone()
        };
        dimension.refresh()?;
        Ok(dimension)
    }

    fn with_base_items(&self, base_items: Vec<String>) -> CubeResult<Self> {
        let mut dimension = GenericDimension {
            base_items,
            ..self.clone()
        };
        dimension.refresh()?;
        Ok(dimension)
    }

    fn with_root(&self, attribute: &str) -> CubeResult<Self> {
        let mut dimension = GenericDimension {
            root_attribute: attribute.to_string(),
            ..self.clone()
        };
        dimension.refresh()?;
        Ok(dimension)
    }

    /// Rebuilds the derived tables. Without base items even `all` is empty.
    fn refresh(&mut self) -> CubeResult<()> {
        self.items = distinct(self.base_labels(&self.root_attribute)?);
        self.items_to_idx = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.clone(), i))
            .collect();

        let mut group_indexes = FxHashMap::default();
        for attribute in self.attributes() {
            let buckets: FxHashMap<String, usize> = self
                .items_at(&attribute)?
                .into_iter()
                .enumerate()
                .map(|(i, item)| (item, i))
                .collect();
            let indexes = self
                .group_items(&attribute)?
                .iter()
                .map(|group| {
                    buckets
                        .get(group)
                        .copied()
                        .ok_or_else(|| CubeError::unknown_item(&self.id, group))
                })
                .collect::<CubeResult<Vec<_>>>()?;
            group_indexes.insert(attribute, indexes);
        }
        self.group_indexes = group_indexes;
        Ok(())
    }
}

fn distinct(labels: Vec<String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    labels
        .into_iter()
        .filter(|label| seen.insert(label.clone()))
        .collect()
}
