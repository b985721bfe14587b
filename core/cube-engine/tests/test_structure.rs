//! FILENAME: tests/test_structure.rs
//! Integration tests for filtering, drilling and dimension list changes.

mod common;

use std::collections::BTreeMap;

use common::{AntennaFixture, MonthlyFixture};
use cube_engine::{Cube, CubeError, DefaultValue, Dimension, MeasureType};
use serde_json::json;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn nested(cube: &Cube, measure_id: &str) -> serde_json::Value {
    serde_json::to_value(cube.nested_array(measure_id).unwrap()).unwrap()
}

fn quarterly(total: f64) -> Cube {
    let time = Dimension::time("time", "quarter", "2010-Q1", "2010-Q1").unwrap();
    let mut cube = Cube::new(vec![time]).unwrap();
    cube.create_stored_measure("antennas", BTreeMap::new(), MeasureType::Int32, DefaultValue::NaN)
        .unwrap();
    cube.set_data("antennas", &[total]).unwrap();
    cube
}

// ============================================================================
// END TO END
// ============================================================================

#[test]
fn test_antenna_example() {
    let cube = AntennaFixture::cube();
    assert_eq!(cube.store_size(), 6);
    assert_eq!(cube.data("antennas").unwrap(), AntennaFixture::ANTENNAS.to_vec());

    let continents = cube.drill_up("location", "continent").unwrap();
    assert_eq!(nested(&continents, "antennas"), json!([[5.0, 10.0], [16.0, 32.0]]));

    let paris = cube.slice("location", "city", "paris").unwrap();
    assert_eq!(paris.dimension_ids(), vec!["period"]);
    assert_eq!(paris.data("antennas").unwrap(), vec![1.0, 2.0]);
}

#[test]
fn test_source_cube_is_untouched_by_operations() {
    let cube = AntennaFixture::cube();
    let _ = cube.drill_up("location", "continent").unwrap();
    let _ = cube.dice("period", "season", &["winter"], false).unwrap();
    let _ = cube.remove_dimension("period").unwrap();
    assert_eq!(cube.data("antennas").unwrap(), AntennaFixture::ANTENNAS.to_vec());
    assert_eq!(cube.dimension("location").unwrap().root_attribute(), "city");
}

// ============================================================================
// FILTERING
// ============================================================================

#[test]
fn test_dice_ignores_unknown_items() {
    let cube = AntennaFixture::cube();
    let diced = cube.dice("location", "city", &["nonexisting", "paris"], false).unwrap();
    let paris = cube.dice("location", "city", &["paris"], false).unwrap();

    assert_eq!(diced.store_size(), paris.store_size());
    assert_eq!(diced.data("antennas").unwrap(), vec![1.0, 2.0]);
}

#[test]
fn test_dice_on_coarser_attribute() {
    let europe = AntennaFixture::cube()
        .dice("location", "continent", &["europe"], false)
        .unwrap();
    assert_eq!(europe.dimension("location").unwrap().items(), &["paris", "toledo"]);
    assert_eq!(europe.data("antennas").unwrap(), vec![1.0, 2.0, 4.0, 8.0]);
}

#[test]
fn test_dice_with_reorder() {
    let reordered = AntennaFixture::cube()
        .dice("location", "city", &["tokyo", "paris"], true)
        .unwrap();
    assert_eq!(reordered.data("antennas").unwrap(), vec![16.0, 32.0, 1.0, 2.0]);
}

#[test]
fn test_dice_range_on_time() {
    let cube = MonthlyFixture::cube("sales", "2010-01", "2010-12");
    let spring = cube.dice_range("time", "month", Some("2010-03"), Some("2010-05")).unwrap();
    assert_eq!(spring.data("sales").unwrap(), vec![3.0, 4.0, 5.0]);

    let second_half = cube.dice_range("time", "semester", Some("2010-S2"), None).unwrap();
    assert_eq!(second_half.store_size(), 6);
}

#[test]
fn test_unknown_dimension_fails() {
    let err = AntennaFixture::cube()
        .dice("color", "name", &["red"], false)
        .unwrap_err();
    assert!(matches!(err, CubeError::UnknownDimension(_)));
}

// ============================================================================
// DRILLING
// ============================================================================

#[test]
fn test_integer_drill_down_then_up_is_exact() {
    let months = quarterly(90.0).drill_down("time", "month").unwrap();
    assert_eq!(months.dimension("time").unwrap().items(), &["2010-01", "2010-02", "2010-03"]);
    assert_eq!(months.data("antennas").unwrap(), vec![30.0, 30.0, 30.0]);

    let back = months.drill_up("time", "quarter").unwrap();
    assert_eq!(back.data("antennas").unwrap(), vec![90.0]);
}

#[test]
fn test_average_roll_up_ignores_absent_months() {
    let absent = MonthlyFixture::averaged(&[10.0, f64::NAN, 20.0]);
    assert_eq!(absent.drill_up("time", "quarter").unwrap().data("price").unwrap(), vec![15.0]);

    let zero = MonthlyFixture::averaged(&[10.0, 0.0, 20.0]);
    assert_eq!(zero.drill_up("time", "quarter").unwrap().data("price").unwrap(), vec![10.0]);
}

#[test]
fn test_drill_up_to_unknown_attribute_fails() {
    let err = AntennaFixture::cube().drill_up("location", "country").unwrap_err();
    assert!(matches!(err, CubeError::UnknownAttribute { .. }));
}

#[test]
fn test_drill_to_current_root_is_a_noop() {
    let cube = AntennaFixture::cube();
    let same = cube.drill_up("location", "city").unwrap();
    assert_eq!(same.dimensions(), cube.dimensions());
    assert_eq!(same.data("antennas").unwrap(), cube.data("antennas").unwrap());
}

// ============================================================================
// DIMENSION LIST
// ============================================================================

#[test]
fn test_remove_dimension_aggregates_it_away() {
    let cube = AntennaFixture::cube();
    let by_city = cube.remove_dimension("period").unwrap();
    assert_eq!(by_city.data("antennas").unwrap(), vec![3.0, 12.0, 48.0]);
    assert_eq!(cube.collapse().unwrap().data("antennas").unwrap(), vec![63.0]);
}

#[test]
fn test_add_dimension_with_distribution() {
    let by_city = AntennaFixture::cube().remove_dimension("period").unwrap();
    let distributions = BTreeMap::from([("antennas".to_string(), vec![0.0, 1.0])]);
    let cube = by_city
        .add_dimension(AntennaFixture::period(), &BTreeMap::new(), Some(1), &distributions)
        .unwrap();

    assert_eq!(cube.dimension_ids(), vec!["location", "period"]);
    assert_eq!(cube.data("antennas").unwrap()[1], 3.0);
    assert_eq!(cube.data("antennas").unwrap()[5], 48.0);
    assert_eq!(cube.total("antennas").unwrap(), 63.0);
}

#[test]
fn test_add_existing_dimension_fails() {
    let err = AntennaFixture::cube()
        .add_dimension(AntennaFixture::period(), &BTreeMap::new(), None, &BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, CubeError::DuplicateDimension(_)));
}

#[test]
fn test_swap_dimensions_moves_values() {
    let swapped = AntennaFixture::cube().swap_dimensions("location", "period").unwrap();
    assert_eq!(swapped.dimension_ids(), vec!["period", "location"]);
    assert_eq!(nested(&swapped, "antennas"), json!([[1.0, 4.0, 16.0], [2.0, 8.0, 32.0]]));
}

#[test]
fn test_aggregate_by_dimensions() {
    let by_season = AntennaFixture::cube().aggregate_by_dimensions(&["period"]).unwrap();
    assert_eq!(by_season.dimension_ids(), vec!["period"]);
    assert_eq!(by_season.data("antennas").unwrap(), vec![21.0, 42.0]);
}

#[test]
fn test_reshape_inserts_missing_dimension() {
    let by_city = AntennaFixture::cube().remove_dimension("period").unwrap();
    let target = AntennaFixture::cube().dimensions().to_vec();
    let reshaped = by_city.reshape(&target).unwrap();

    assert_eq!(reshaped.dimension_ids(), vec!["location", "period"]);
    assert_eq!(reshaped.store_size(), 6);
    assert_eq!(reshaped.total("antennas").unwrap(), 63.0);
}
