//! FILENAME: tests/test_position.rs
//! Property tests for the position encoding of cube cells.

use cube_engine::Radix;
use proptest::prelude::*;

proptest! {
    #[test]
    fn compose_decompose_is_a_bijection(lengths in prop::collection::vec(1usize..6, 0..5)) {
        let radix = Radix::new(&lengths);
        let size: usize = lengths.iter().product();
        prop_assert_eq!(radix.size(), size);

        for index in 0..size {
            let coordinates = radix.decompose(index);
            prop_assert_eq!(coordinates.len(), lengths.len());
            for (coordinate, length) in coordinates.iter().zip(lengths.iter()) {
                prop_assert!(coordinate < length);
            }
            prop_assert_eq!(radix.compose(&coordinates), index);
        }
    }

    #[test]
    fn reordered_axes_keep_the_bijection(
        lengths in prop::collection::vec(1usize..5, 1..5),
        seed in any::<u64>(),
    ) {
        // Rotate the axes; every cell must land on a distinct index.
        let shift = (seed as usize) % lengths.len();
        let mut rotated = lengths.clone();
        rotated.rotate_left(shift);

        let original = Radix::new(&lengths);
        let reordered = Radix::new(&rotated);
        let mut seen = vec![false; reordered.size()];
        for index in 0..original.size() {
            let mut coordinates = original.decompose(index);
            coordinates.rotate_left(shift);
            let target = reordered.compose(&coordinates);
            prop_assert!(!seen[target]);
            seen[target] = true;
        }
        prop_assert!(seen.iter().all(|s| *s));
    }
}
