//! Synthetic single-row grids for unit tests.

use crate::crosswalk::{tests::sample_tables, Crosswalk};
use crate::grid::{GridSpec, Layer, NODATA, NODATA_F32};
use crate::inputs::{AreaInputs, CellKeys, GridInputs};
use crate::land_units::{LandUnit, LandUnitTable};

/// One synthetic cell. Areas in km².
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell {
    pub country: i32,
    pub unit: i32,
    pub zone: i32,
    pub cover: i32,
    pub protected: bool,
    pub area_cover: f32,
    pub area_extent: f32,
    pub cropland_cover: f32,
    pub cropland: f32,
    pub pasture: f32,
    pub urban: f32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            country: 10,
            unit: 1,
            zone: 1,
            cover: 7,
            protected: false,
            area_cover: 100.0,
            area_extent: 100.0,
            cropland_cover: 0.0,
            cropland: 0.0,
            pasture: 0.0,
            urban: 0.0,
        }
    }
}

impl Cell {
    pub fn at(country: i32, unit: i32) -> Self {
        Self { country, unit, ..Self::default() }
    }

    pub fn no_data() -> Self {
        Self {
            country: NODATA,
            unit: NODATA,
            zone: NODATA,
            cover: NODATA,
            area_cover: NODATA_F32,
            area_extent: NODATA_F32,
            ..Self::default()
        }
    }
}

/// 1° cells along the equator: every cell is ~12,300 km², far above the
/// synthetic land areas.
pub(crate) fn spec_for(n: usize) -> GridSpec {
    GridSpec::new(1, n, 0.0, 0.5, 1.0)
}

pub(crate) fn grid(cells: &[Cell]) -> GridInputs {
    let spec = spec_for(cells.len());
    let ints = |name: &str, f: fn(&Cell) -> i32| {
        Layer::from_vec(name, spec, cells.iter().map(f).collect(), NODATA).unwrap()
    };
    let floats = |name: &str, f: fn(&Cell) -> f32| {
        Layer::from_vec(name, spec, cells.iter().map(f).collect(), NODATA_F32).unwrap()
    };
    let protected = Layer::from_vec(
        "protected",
        spec,
        cells.iter().map(|c| if c.protected { 1 } else { 255 }).collect(),
        0u8,
    )
    .unwrap();
    GridInputs {
        spec,
        keys: CellKeys {
            country: ints("country", |c| c.country),
            land_unit: ints("land_unit", |c| c.unit),
            legacy_zone: ints("legacy_zone", |c| c.zone),
            land_cover: ints("land_cover", |c| c.cover),
            protected,
        },
        areas: AreaInputs {
            land_area_cover: floats("land_area_cover", |c| c.area_cover),
            land_area_extent: floats("land_area_extent", |c| c.area_extent),
            cropland_cover: floats("cropland_cover", |c| c.cropland_cover),
            cropland: floats("cropland", |c| c.cropland),
            pasture: floats("pasture", |c| c.pasture),
            urban: floats("urban", |c| c.urban),
        },
    }
}

pub(crate) fn crosswalk() -> Crosswalk {
    Crosswalk::from_tables(sample_tables()).unwrap()
}

pub(crate) fn land_units(n: u32) -> LandUnitTable {
    LandUnitTable::new((1..=n).map(|id| LandUnit { id, name: format!("unit{id}") }).collect()).unwrap()
}
