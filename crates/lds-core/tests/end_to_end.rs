//! Whole-pipeline scenarios on small synthetic grids.

use approx::assert_relative_eq;
use lds_core::crosswalk::{Country, Crop, LandCoverClass, ModelRegion, TradeRegion, UseCategory, UseFamily};
use lds_core::diagnostics::UnallocatedReason;
use lds_core::pipeline::{HARVESTED_AREA_TABLE, PRODUCTION_TABLE, RENT_TABLE};
use lds_core::{
    AreaInputs, Calibration, CellKeys, CodeTables, CropLayers, Crosswalk, FaoRecord, FaoStats, GridInputs,
    GridSpec, InMemoryCrops, LandUnit, LandUnitTable, Layer, LegacyRent, LegacyRentRecord, MemorySink,
    Pipeline, PriceRecord, ProducerPrices, ReferenceData, RunOptions, NODATA, NODATA_F32,
};

const A: i32 = 4;
const B: i32 = 8;

fn code_tables() -> CodeTables {
    let country = |fao: i32, iso: &str, region: i32| Country {
        fao,
        iso: iso.into(),
        name: iso.to_uppercase(),
        trade_region: Some(region),
        model_region: Some(1),
    };
    CodeTables {
        countries: vec![country(A, "aaa", 1), country(B, "bbb", 2)],
        trade_regions: vec![
            TradeRegion { code: 1, abbr: "RA".into(), name: "Region A".into() },
            TradeRegion { code: 2, abbr: "RB".into(), name: "Region B".into() },
        ],
        model_regions: vec![ModelRegion { code: 1, name: "World".into() }],
        crops: vec![Crop { code: 1, name: "crop_x".into(), fao_code: 100, use_code: 1 }],
        uses: vec![
            UseCategory { code: 1, name: "crops".into(), family: UseFamily::Crop },
            UseCategory { code: 2, name: "forest".into(), family: UseFamily::Forestry },
        ],
        land_cover: vec![
            LandCoverClass { code: 1, name: "forest".into(), forest: true, ice: false },
            LandCoverClass { code: 2, name: "grass".into(), forest: false, ice: false },
            LandCoverClass { code: 3, name: "ice".into(), forest: false, ice: true },
        ],
    }
}

struct Grid {
    country: Vec<i32>,
    unit: Vec<i32>,
    zone: Vec<i32>,
    frac: Vec<f32>,
}

fn inputs(g: &Grid) -> (GridInputs, InMemoryCrops) {
    let n = g.country.len();
    let spec = GridSpec::new(1, n, 10.0, 0.5, 1.0);
    let ints = |name: &str, v: &[i32]| Layer::from_vec(name, spec, v.to_vec(), NODATA).unwrap();
    let area = |name: &str, v: f32| Layer::filled(name, spec, v, NODATA_F32).unwrap();
    let inputs = GridInputs {
        spec,
        keys: CellKeys {
            country: ints("country", &g.country),
            land_unit: ints("land_unit", &g.unit),
            legacy_zone: ints("legacy_zone", &g.zone),
            land_cover: ints("land_cover", &vec![2; n]),
            protected: Layer::filled("protected", spec, 255u8, 0).unwrap(),
        },
        areas: AreaInputs {
            land_area_cover: area("land_area_cover", 1000.0),
            land_area_extent: area("land_area_extent", 1000.0),
            cropland_cover: area("cropland_cover", 0.0),
            cropland: area("cropland", 0.0),
            pasture: area("pasture", 0.0),
            urban: area("urban", 0.0),
        },
    };
    let mut crops = InMemoryCrops::new();
    crops.insert(
        1,
        CropLayers {
            harvest_fraction: Layer::from_vec("crop_x_frac", spec, g.frac.clone(), NODATA_F32).unwrap(),
            yield_t_ha: Layer::filled("crop_x_yield", spec, 2.0, NODATA_F32).unwrap(),
        },
    );
    (inputs, crops)
}

fn reference(rent: Vec<LegacyRentRecord>, fao: Vec<FaoRecord>) -> ReferenceData {
    let crosswalk = Crosswalk::from_tables(code_tables()).unwrap();
    let legacy_rent = LegacyRent::from_records(rent, &crosswalk).unwrap();
    ReferenceData {
        crosswalk,
        land_units: LandUnitTable::new(vec![
            LandUnit { id: 1, name: "north".into() },
            LandUnit { id: 2, name: "south".into() },
        ])
        .unwrap(),
        fao: FaoStats::from_records(fao).unwrap(),
        legacy_rent,
        prices: ProducerPrices::from_records(vec![PriceRecord { region: 1, crop: 100, usd_per_t: 50.0 }]),
    }
}

fn rent_row(region: i32, use_code: i32, zone: usize, musd: f64) -> LegacyRentRecord {
    let mut zones_musd = vec![0.0; 18];
    zones_musd[zone - 1] = musd;
    LegacyRentRecord { region, use_code, zones_musd }
}

#[test]
fn two_countries_on_one_land_unit() {
    let (grid, mut crops) = inputs(&Grid {
        country: vec![A, B],
        unit: vec![1, 1],
        zone: vec![1, 1],
        frac: vec![0.5, 0.2],
    });
    let reference = reference(Vec::new(), Vec::new());
    let mut sink = MemorySink::default();
    Pipeline::new(&reference, RunOptions::default())
        .unwrap()
        .run(grid, &mut crops, &mut sink)
        .unwrap();

    let (_, harvested) = &sink.aggregates[HARVESTED_AREA_TABLE];
    // fraction × 1000 km² × 100 ha/km²
    assert_relative_eq!(harvested.get(A, 1, 0).unwrap(), 50_000.0, max_relative = 1e-6);
    assert_relative_eq!(harvested.get(B, 1, 0).unwrap(), 20_000.0, max_relative = 1e-6);
    assert_eq!(harvested.row_count(), 2);
}

#[test]
fn legacy_rent_follows_production_value() {
    // Zone 1 of region A overlaps units 1 and 2 with production 3:7.
    let (grid, mut crops) = inputs(&Grid {
        country: vec![A, A, A, B],
        unit: vec![1, 2, 2, 2],
        zone: vec![1, 1, 1, 1],
        frac: vec![0.3, 0.35, 0.35, 0.1],
    });
    let reference = reference(
        vec![rent_row(1, 1, 1, 100.0e-6), rent_row(1, 2, 1, 5.0), rent_row(2, 1, 9, 1.0)],
        Vec::new(),
    );
    let mut sink = MemorySink::default();
    let report = Pipeline::new(&reference, RunOptions::default())
        .unwrap()
        .run(grid, &mut crops, &mut sink)
        .unwrap();

    let (_, rent) = &sink.aggregates[RENT_TABLE];
    assert_relative_eq!(rent.get(1, 1, 0).unwrap(), 30.0, max_relative = 1e-6);
    assert_relative_eq!(rent.get(1, 2, 0).unwrap(), 70.0, max_relative = 1e-6);

    // No forest cover anywhere: forestry rent is flagged, and region B's
    // zone 9 rent has nowhere to go.
    let d = &report.diagnostics;
    assert_eq!(d.rent_unallocated.len(), 2);
    assert_eq!(d.rent_unallocated[0].reason, UnallocatedReason::ZeroWeight);
    assert_eq!(d.rent_unallocated[1].reason, UnallocatedReason::NoOverlap);
    assert_relative_eq!(d.unallocated_rent(), 6.0e6, max_relative = 1e-12);
}

#[test]
fn yield_calibration_hits_fao_production() {
    let (grid, mut crops) = inputs(&Grid {
        country: vec![A, A, B, NODATA],
        unit: vec![1, 2, 1, 1],
        zone: vec![1, 1, 1, 1],
        frac: vec![0.1, 0.3, 0.2, 0.9],
    });
    let fao = vec![
        FaoRecord { country: A, crop: 100, year: 2000, harvested_ha: None, production_t: Some(1.0e6) },
        FaoRecord { country: B, crop: 100, year: 2000, harvested_ha: None, production_t: None },
    ];
    let reference = reference(Vec::new(), fao);
    let options = RunOptions { calibration: Calibration::Yield { year: 2000 }, ..RunOptions::default() };
    let mut sink = MemorySink::default();
    let report = Pipeline::new(&reference, options)
        .unwrap()
        .run(grid, &mut crops, &mut sink)
        .unwrap();

    let (_, production) = &sink.aggregates[PRODUCTION_TABLE];
    assert_relative_eq!(production.owner_total(A, 0), 1.0e6, max_relative = 1e-9);
    // 1:3 split between the units is preserved.
    assert_relative_eq!(production.get(A, 2, 0).unwrap(), 0.75e6, max_relative = 1e-6);
    // Country B has no reference and keeps its pixel production.
    assert_relative_eq!(production.owner_total(B, 0), 0.2 * 1000.0 * 100.0 * 2.0, max_relative = 1e-6);
    assert_eq!(report.diagnostics.calibration.len(), 1);
    assert_eq!(report.diagnostics.reconcile.missing_country_or_unit, 1);
}
