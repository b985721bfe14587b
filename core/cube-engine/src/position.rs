//! FILENAME: core/cube-engine/src/position.rs
//! Mixed-radix addressing of cube cells.
//!
//! A cell index is `fold(idx * axis.num_items + item_index)` over the axes in
//! cube order, most significant first.

use smallvec::SmallVec;

use crate::dimension::Axis;

/// Per-axis coordinates; cubes rarely have more than a handful of axes.
pub type Coordinates = SmallVec<[usize; 8]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Radix {
    lengths: SmallVec<[usize; 8]>,
}

impl Radix {
    pub fn new(lengths: &[usize]) -> Self {
        Radix {
            lengths: SmallVec::from_slice(lengths),
        }
    }

    pub fn from_axes(axes: &[&dyn Axis]) -> Self {
        Radix {
            lengths: axes.iter().map(|a| a.num_items()).collect(),
        }
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Number of addressable cells.
    pub fn size(&self) -> usize {
        self.lengths.iter().product()
    }

    pub fn compose(&self, coordinates: &[usize]) -> usize {
        coordinates
            .iter()
            .zip(self.lengths.iter())
            .fold(0, |index, (coordinate, length)| index * length + coordinate)
    }

    pub fn decompose(&self, mut index: usize) -> Coordinates {
        let mut coordinates: Coordinates = SmallVec::from_elem(0, self.lengths.len());
        for (slot, length) in coordinates.iter_mut().zip(self.lengths.iter()).rev() {
            if *length > 0 {
                *slot = index % length;
                index /= length;
            }
        }
        coordinates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_significant_axis_first() {
        let radix = Radix::new(&[3, 2]);
        assert_eq!(radix.size(), 6);
        assert_eq!(radix.compose(&[1, 0]), 2);
        assert_eq!(radix.compose(&[2, 1]), 5);
        assert_eq!(radix.decompose(3).as_slice(), &[1, 1]);
    }

    #[test]
    fn test_no_axes_is_a_single_cell() {
        let radix = Radix::new(&[]);
        assert_eq!(radix.size(), 1);
        assert_eq!(radix.compose(&[]), 0);
        assert!(radix.decompose(0).is_empty());
    }
}
