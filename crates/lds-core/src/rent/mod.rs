//! Land-rent disaggregation from legacy zones onto land units.
//!
//! Rent of one (trade region, use, legacy zone) is split across the land
//! units overlapping that zone in that region:
//!   crop and livestock uses  by production value (production × producer
//!                            price) of the crops mapped to the use,
//!   forestry uses            by forest area.
//! A livestock use with no production value anywhere in the zone falls back
//! to pasture area.
//! A zone overlapping a single land unit passes its rent through unchanged.
//! Rent that cannot be placed is reported, never dropped or spread evenly.

pub mod legacy;
pub mod overlap;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::crop::ZoneProduction;
use crate::crosswalk::{Crosswalk, UseFamily};
use crate::diagnostics::{RentCounts, UnallocatedReason, UnallocatedRent};
use crate::error::Result;
use crate::table::AggregateTable;

pub use legacy::{LegacyRent, LegacyRentRecord, PriceRecord, ProducerPrices};
pub use overlap::{OverlapArea, ZoneOverlap};

/// Output of the rent stage.
#[derive(Debug, Clone)]
pub struct RentTables {
    /// Trade region × land unit × use, USD.
    pub rent: AggregateTable,
    pub counts: RentCounts,
    pub unallocated: Vec<UnallocatedRent>,
}

/// Production value (USD) per (region, zone, unit), dense over uses.
fn production_value(
    production: &ZoneProduction,
    crosswalk: &Crosswalk,
    prices: &ProducerPrices,
) -> IndexMap<(i32, u32, u32), Vec<f64>> {
    let uses = crosswalk.use_count();
    let mut value: IndexMap<(i32, u32, u32), Vec<f64>> = IndexMap::new();
    for ((country, zone, unit), per_crop) in production.iter() {
        let Some(region) = crosswalk.trade_region_of(country) else { continue };
        let row = value.entry((region, zone, unit)).or_insert_with(|| vec![0.0; uses]);
        for (ci, (crop, &t)) in crosswalk.crops().iter().zip(per_crop).enumerate() {
            if t <= 0.0 {
                continue;
            }
            if let Some(ui) = crosswalk.crop_use_index(ci) {
                row[ui] += t * prices.price(region, crop.fao_code);
            }
        }
    }
    value
}

pub fn disaggregate_rent(
    overlap: &ZoneOverlap,
    production: &ZoneProduction,
    crosswalk: &Crosswalk,
    legacy: &LegacyRent,
    prices: &ProducerPrices,
) -> Result<RentTables> {
    let value = production_value(production, crosswalk, prices);
    let mut rent = AggregateTable::zeros(&overlap.region_units, crosswalk.use_count());
    let mut counts = RentCounts::default();
    let mut unallocated = Vec::new();
    let mut regions_seen = Vec::new();

    for ((region, use_code), zones) in legacy.iter() {
        let Some(ui) = crosswalk.use_index(use_code) else { continue };
        let Some(family) = crosswalk.use_at(ui).map(|u| u.family) else { continue };
        if !regions_seen.contains(&region) {
            regions_seen.push(region);
            if zones.iter().any(|r| *r > 0.0) && !overlap.has_region(region) {
                counts.regions_without_cells += 1;
            }
        }

        for (zi, &amount) in zones.iter().enumerate() {
            if amount <= 0.0 {
                continue;
            }
            let zone = zi as u32 + 1;
            let mut flag = |reason| {
                unallocated.push(UnallocatedRent { region, use_code, zone, amount, reason });
            };
            let Some(units) = overlap.units(region, zone) else {
                flag(UnallocatedReason::NoOverlap);
                continue;
            };

            if units.len() == 1 {
                if let Some(&unit) = units.keys().next() {
                    rent.add(region, unit, ui, amount);
                    counts.identity_allocations += 1;
                }
                continue;
            }

            let value_of = |unit: u32| value.get(&(region, zone, unit)).map_or(0.0, |v| v[ui]);
            let mut weights: Vec<(u32, f64)> = units
                .iter()
                .map(|(&unit, area)| {
                    let w = match family {
                        UseFamily::Crop | UseFamily::Livestock => value_of(unit),
                        UseFamily::Forestry => area.forest,
                    };
                    (unit, w.max(0.0))
                })
                .collect();
            if family == UseFamily::Livestock && weights.iter().all(|(_, w)| *w <= 0.0) {
                weights = units.iter().map(|(&unit, area)| (unit, area.pasture.max(0.0))).collect();
                counts.pasture_fallbacks += 1;
            }
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            if total <= 0.0 {
                flag(UnallocatedReason::ZeroWeight);
                continue;
            }
            for (unit, w) in weights {
                if w > 0.0 {
                    rent.add(region, unit, ui, amount * w / total);
                }
            }
            counts.weighted_allocations += 1;
        }
    }

    let left: f64 = unallocated.iter().map(|u| u.amount).sum();
    info!(
        identity = counts.identity_allocations,
        weighted = counts.weighted_allocations,
        pasture_fallbacks = counts.pasture_fallbacks,
        "disaggregated legacy land rent"
    );
    if !unallocated.is_empty() {
        warn!(
            entries = unallocated.len(),
            usd = left,
            regions_without_cells = counts.regions_without_cells,
            "legacy rent left unallocated"
        );
    }

    Ok(RentTables { rent, counts, unallocated })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::Calibration;
    use crate::crop::{aggregate_crops, CropLayers, FaoStats, InMemoryCrops};
    use crate::crosswalk::tests::sample_tables;
    use crate::grid::{Layer, NODATA_F32};
    use crate::harmonize::harmonize;
    use crate::reconcile::reconcile;
    use crate::testkit::{self, Cell};

    struct Fixture {
        overlap: ZoneOverlap,
        production: ZoneProduction,
    }

    /// Cells with wheat harvest fractions (yield 1 t/ha).
    fn fixture(cells: &[(Cell, f32)]) -> Fixture {
        fixture_with(&testkit::crosswalk(), cells)
    }

    fn fixture_with(cw: &Crosswalk, cells: &[(Cell, f32)]) -> Fixture {
        let plain: Vec<Cell> = cells.iter().map(|c| c.0).collect();
        let g = testkit::grid(&plain);
        let recon = reconcile(&g.spec, &g.keys, &g.areas, cw, &testkit::land_units(4)).unwrap();
        let areas = harmonize(&g.spec, g.keys.land_cover, g.areas, cw).unwrap();

        let spec = g.spec;
        let mut crops = InMemoryCrops::new();
        crops.insert(
            1,
            CropLayers {
                harvest_fraction: Layer::from_vec("frac", spec, cells.iter().map(|c| c.1).collect(), NODATA_F32)
                    .unwrap(),
                yield_t_ha: Layer::filled("yield", spec, 1.0, NODATA_F32).unwrap(),
            },
        );
        let tables =
            aggregate_crops(&recon, &areas, cw, Calibration::None, &FaoStats::default(), &mut crops).unwrap();
        Fixture {
            overlap: ZoneOverlap::build(&recon, &areas, cw),
            production: tables.zone_production,
        }
    }

    fn rent_of(region: i32, use_code: i32, zone: usize, musd: f64) -> LegacyRent {
        let mut zones = vec![0.0; 18];
        zones[zone - 1] = musd;
        LegacyRent::from_records(
            vec![LegacyRentRecord { region, use_code, zones_musd: zones }],
            &testkit::crosswalk(),
        )
        .unwrap()
    }

    fn run(f: &Fixture, legacy: &LegacyRent) -> RentTables {
        run_with(&testkit::crosswalk(), f, legacy)
    }

    fn run_with(cw: &Crosswalk, f: &Fixture, legacy: &LegacyRent) -> RentTables {
        disaggregate_rent(&f.overlap, &f.production, cw, legacy, &ProducerPrices::default()).unwrap()
    }

    /// Wheat feeds the cattle use instead of its own.
    fn fodder_crosswalk() -> Crosswalk {
        let mut t = sample_tables();
        t.crops[0].use_code = 3;
        Crosswalk::from_tables(t).unwrap()
    }

    #[test]
    fn production_value_weights_split_rent() {
        let f = fixture(&[(Cell::at(10, 1), 0.3), (Cell::at(10, 2), 0.7)]);
        let t = run(&f, &rent_of(1, 1, 1, 100.0e-6));
        assert_relative_eq!(t.rent.get(1, 1, 0).unwrap(), 30.0, max_relative = 1e-6);
        assert_relative_eq!(t.rent.get(1, 2, 0).unwrap(), 70.0, max_relative = 1e-6);
        assert_eq!(t.counts.weighted_allocations, 1);
        assert!(t.unallocated.is_empty());
    }

    #[test]
    fn livestock_follows_production_value_not_pasture() {
        let cw = fodder_crosswalk();
        let f = fixture_with(
            &cw,
            &[(Cell { pasture: 80.0, ..Cell::at(10, 1) }, 0.3), (Cell::at(10, 2), 0.7)],
        );
        let t = run_with(&cw, &f, &rent_of(1, 3, 1, 100.0e-6));
        assert_relative_eq!(t.rent.get(1, 1, 2).unwrap(), 30.0, max_relative = 1e-6);
        assert_relative_eq!(t.rent.get(1, 2, 2).unwrap(), 70.0, max_relative = 1e-6);
        assert_eq!(t.counts.pasture_fallbacks, 0);
    }

    #[test]
    fn livestock_without_production_falls_back_to_pasture() {
        let f = fixture(&[
            (Cell { pasture: 20.0, ..Cell::at(10, 1) }, 0.5),
            (Cell { pasture: 60.0, ..Cell::at(10, 2) }, 0.5),
        ]);
        let t = run(&f, &rent_of(1, 3, 1, 1.0));
        assert_relative_eq!(t.rent.get(1, 1, 2).unwrap(), 0.25e6, max_relative = 1e-6);
        assert_relative_eq!(t.rent.get(1, 2, 2).unwrap(), 0.75e6, max_relative = 1e-6);
        assert_eq!(t.counts.pasture_fallbacks, 1);
        assert!(t.unallocated.is_empty());
    }

    #[test]
    fn zone_without_land_units_is_flagged() {
        let f = fixture(&[
            (Cell { zone: 4, ..Cell::at(10, -9999) }, 0.0),
            (Cell { zone: 5, ..Cell::at(10, 1) }, 0.0),
        ]);
        assert!(f.overlap.region_zones.contains(1, 4));
        let t = run(&f, &rent_of(1, 4, 4, 1.0));
        assert_eq!(t.unallocated.len(), 1);
        assert_eq!(t.unallocated[0].reason, UnallocatedReason::NoOverlap);
        assert_eq!(t.counts.regions_without_cells, 0);
    }

    #[test]
    fn single_unit_zone_passes_through() {
        let f = fixture(&[(Cell::at(20, 3), 0.0)]);
        let t = run(&f, &rent_of(2, 4, 1, 2.5));
        assert_relative_eq!(t.rent.get(2, 3, 3).unwrap(), 2.5e6);
        assert_eq!(t.counts.identity_allocations, 1);
    }

    #[test]
    fn forestry_is_weighted_by_forest_area() {
        let f = fixture(&[
            (Cell { cover: 1, cropland: 75.0, ..Cell::at(10, 1) }, 0.0),
            (Cell { cover: 1, ..Cell::at(10, 2) }, 0.0),
        ]);
        let t = run(&f, &rent_of(1, 4, 1, 1.0));
        assert_relative_eq!(t.rent.get(1, 1, 3).unwrap(), 0.2e6, max_relative = 1e-6);
        assert_relative_eq!(t.rent.get(1, 2, 3).unwrap(), 0.8e6, max_relative = 1e-6);
    }

    #[test]
    fn zero_weight_and_missing_overlap_are_flagged() {
        let f = fixture(&[(Cell::at(10, 1), 0.0), (Cell::at(10, 2), 0.0)]);
        let mut zones = vec![0.0; 18];
        zones[0] = 3.0;
        zones[6] = 4.0;
        let legacy = LegacyRent::from_records(
            vec![LegacyRentRecord { region: 1, use_code: 3, zones_musd: zones }],
            &testkit::crosswalk(),
        )
        .unwrap();
        let t = run(&f, &legacy);
        assert_eq!(t.unallocated.len(), 2);
        assert_eq!(t.unallocated[0].reason, UnallocatedReason::ZeroWeight);
        assert_eq!(t.unallocated[0].zone, 1);
        assert_eq!(t.unallocated[1].reason, UnallocatedReason::NoOverlap);
        assert_eq!(t.unallocated[1].zone, 7);
        assert_eq!(t.rent.owner_total(1, 2), 0.0);
    }

    #[test]
    fn allocated_plus_flagged_rent_is_conserved() {
        let f = fixture(&[
            (Cell { zone: 1, pasture: 20.0, ..Cell::at(10, 1) }, 0.4),
            (Cell { zone: 1, pasture: 60.0, ..Cell::at(10, 2) }, 0.1),
            (Cell { zone: 2, cover: 1, ..Cell::at(10, 2) }, 0.2),
            (Cell { zone: 2, cover: 1, ..Cell::at(10, 3) }, 0.0),
            (Cell { zone: 3, ..Cell::at(20, 4) }, 0.5),
        ]);
        let mut records = Vec::new();
        for (region, use_code) in [(1, 1), (1, 2), (1, 3), (1, 4), (2, 1), (2, 3)] {
            let zones = (0..18).map(|z| (z as f64 + 1.0) * 0.25 * f64::from(use_code)).collect();
            records.push(LegacyRentRecord { region, use_code, zones_musd: zones });
        }
        let legacy = LegacyRent::from_records(records, &testkit::crosswalk()).unwrap();
        let t = run(&f, &legacy);

        let cw = testkit::crosswalk();
        for ((region, use_code), _) in legacy.iter() {
            let ui = cw.use_index(use_code).unwrap();
            let flagged: f64 = t
                .unallocated
                .iter()
                .filter(|u| u.region == region && u.use_code == use_code)
                .map(|u| u.amount)
                .sum();
            assert_relative_eq!(
                t.rent.owner_total(region, ui) + flagged,
                legacy.total(region, use_code),
                max_relative = 1e-9
            );
        }
        assert!(t.counts.weighted_allocations > 0);
        assert!(t.counts.identity_allocations > 0);
    }
}
