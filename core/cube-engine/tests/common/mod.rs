//! FILENAME: tests/common/mod.rs
//! Fixtures for cube-engine integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use cube_engine::{
    AggregationMethod, Cube, DefaultValue, Dimension, GenericDimension, MeasureType,
};

/// Antenna counts per city and season, the reference example of the engine.
pub struct AntennaFixture;

impl AntennaFixture {
    pub const ANTENNAS: [f64; 6] = [1.0, 2.0, 4.0, 8.0, 16.0, 32.0];

    /// `city` rolls up to `continent`.
    pub fn location() -> Dimension {
        Dimension::Generic(
            GenericDimension::new(
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
            .unwrap(),
        )
    }

    pub fn period() -> Dimension {
        Dimension::generic("period", "season", ["summer", "winter"]).unwrap()
    }

    /// location x period with `antennas` filled.
    pub fn cube() -> Cube {
        let mut cube = Cube::new(vec![Self::location(), Self::period()]).unwrap();
        cube.create_stored_measure("antennas", BTreeMap::new(), MeasureType::Int32, DefaultValue::NaN)
            .unwrap();
        cube.set_data("antennas", &Self::ANTENNAS).unwrap();
        cube
    }

    /// Same cube plus `routers` and a computed `routers_per_antenna`.
    pub fn cube_with_routers() -> Cube {
        let mut cube = Self::cube();
        cube.create_stored_measure("routers", BTreeMap::new(), MeasureType::Float64, DefaultValue::NaN)
            .unwrap();
        cube.set_data("routers", &[2.0, 4.0, 8.0, 8.0, 8.0, 64.0]).unwrap();
        cube.create_computed_measure("routers_per_antenna", "routers / antennas")
            .unwrap();
        cube
    }
}

/// Monthly cubes for time-range tests.
pub struct MonthlyFixture;

impl MonthlyFixture {
    pub fn time(start: &str, end: &str) -> Dimension {
        Dimension::time("time", "month", start, end).unwrap()
    }

    /// One stored measure over `[start, end]`, cell `i` holding `i + 1`.
    pub fn cube(measure_id: &str, start: &str, end: &str) -> Cube {
        let mut cube = Cube::new(vec![Self::time(start, end)]).unwrap();
        cube.create_stored_measure(measure_id, BTreeMap::new(), MeasureType::Float64, DefaultValue::NaN)
            .unwrap();
        let values: Vec<f64> = (0..cube.store_size()).map(|i| (i + 1) as f64).collect();
        cube.set_data(measure_id, &values).unwrap();
        cube
    }

    /// A quarterly cube whose measure averages over time.
    pub fn averaged(values: &[f64]) -> Cube {
        let mut cube = Cube::new(vec![Self::time("2010-01", "2010-03")]).unwrap();
        let rules = BTreeMap::from([("time".to_string(), AggregationMethod::Average)]);
        cube.create_stored_measure("price", rules, MeasureType::Float64, DefaultValue::NaN)
            .unwrap();
        cube.set_data("price", values).unwrap();
        cube
    }
}
