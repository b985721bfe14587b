//! FILENAME: tests/test_measures.rs
//! Integration tests for measure lifecycle, computed measures and views.

mod common;

use std::collections::BTreeMap;

use common::AntennaFixture;
use cube_engine::{AggregationMethod, CubeError, DefaultValue, MeasureType, NestedObject};

// ============================================================================
// COMPUTED MEASURES
// ============================================================================

#[test]
fn test_computed_measure_follows_operands() {
    let mut cube = AntennaFixture::cube_with_routers();
    assert_eq!(cube.formula("routers_per_antenna").unwrap(), "(routers / antennas)");

    cube.set_single_data("routers", &[("location", "tokyo"), ("period", "summer")], 32.0)
        .unwrap();
    assert_eq!(
        cube.single_data("routers_per_antenna", &[("location", "tokyo"), ("period", "summer")])
            .unwrap(),
        2.0
    );
}

#[test]
fn test_computed_measure_survives_drill_up() {
    let cube = AntennaFixture::cube_with_routers()
        .drill_up("location", "continent")
        .unwrap();
    // europe summer: (2 + 8) / (1 + 4)
    assert_eq!(cube.data("routers_per_antenna").unwrap()[0], 2.0);
}

#[test]
fn test_rename_referenced_measure_rewrites_formula() {
    let mut cube = AntennaFixture::cube_with_routers();
    let before = cube.data("routers_per_antenna").unwrap();

    cube.rename_measure("antennas", "masts").unwrap();
    assert_eq!(cube.formula("routers_per_antenna").unwrap(), "(routers / masts)");
    assert_eq!(cube.data("routers_per_antenna").unwrap(), before);
    assert!(!cube.has_measure("antennas"));
}

#[test]
fn test_rename_unreferenced_measure_leaves_formulas() {
    let mut cube = AntennaFixture::cube_with_routers();
    cube.create_stored_measure("visitors", BTreeMap::new(), MeasureType::Float32, DefaultValue::Zero)
        .unwrap();

    cube.rename_measure("visitors", "guests").unwrap();
    assert_eq!(cube.formula("routers_per_antenna").unwrap(), "(routers / antennas)");
    assert_eq!(cube.stored_measure_ids(), vec!["antennas", "routers", "guests"]);
}

#[test]
fn test_rename_to_existing_or_invalid_id_fails() {
    let mut cube = AntennaFixture::cube_with_routers();
    assert!(matches!(
        cube.rename_measure("antennas", "routers").unwrap_err(),
        CubeError::DuplicateMeasure(_)
    ));
    assert!(matches!(
        cube.rename_measure("antennas", "2fast").unwrap_err(),
        CubeError::InvalidIdentifier(_)
    ));
}

#[test]
fn test_update_rules_changes_drill_up() {
    let mut cube = AntennaFixture::cube();
    cube.update_stored_measure_rules("antennas", |rules| {
        let mut rules = rules.clone();
        rules.insert("location".to_string(), AggregationMethod::Highest);
        rules
    })
    .unwrap();

    let continents = cube.drill_up("location", "continent").unwrap();
    assert_eq!(continents.data("antennas").unwrap(), vec![4.0, 8.0, 16.0, 32.0]);
}

// ============================================================================
// TOTALS
// ============================================================================

#[test]
fn test_totals_and_distribution() {
    let cube = AntennaFixture::cube();
    let europe = vec![(
        "location".to_string(),
        vec!["paris".to_string(), "toledo".to_string()],
    )];

    assert_eq!(cube.total("antennas").unwrap(), 63.0);
    assert_eq!(cube.total_for_dimension_items("antennas", &europe).unwrap(), 15.0);
    assert!((cube.distribution("antennas", &europe).unwrap() - 15.0 / 63.0).abs() < 1e-12);
}

#[test]
fn test_total_reference_in_formula() {
    let mut cube = AntennaFixture::cube();
    cube.create_computed_measure("share", "antennas / antennas__total").unwrap();
    let share = cube.data("share").unwrap();
    assert!((share.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!((share[5] - 32.0 / 63.0).abs() < 1e-12);
}

// ============================================================================
// NESTED VIEWS
// ============================================================================

#[test]
fn test_nested_object_with_totals() {
    let nested = AntennaFixture::cube().nested_object("antennas", true).unwrap();
    let value = |path: &[&str]| nested.at(path).and_then(NestedObject::as_value);

    assert_eq!(value(&["toledo", "winter"]), Some(8.0));
    assert_eq!(value(&["tokyo", "all"]), Some(48.0));
    assert_eq!(value(&["all", "winter"]), Some(42.0));
    assert_eq!(value(&["all", "all"]), Some(63.0));
}

#[test]
fn test_sparse_hydration_patches_cells() {
    let mut cube = AntennaFixture::cube();
    let patch: NestedObject = serde_json::from_str(r#"{"toledo": {"winter": 80}, "lyon": {"summer": 1}}"#).unwrap();
    cube.hydrate_from_sparse_nested_object("antennas", &patch).unwrap();

    assert_eq!(cube.data("antennas").unwrap(), vec![1.0, 2.0, 4.0, 80.0, 16.0, 32.0]);
}
