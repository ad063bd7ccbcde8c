//! How legacy zones overlap the land units of each trade region.

use indexmap::IndexMap;
use tracing::debug;

use crate::crosswalk::Crosswalk;
use crate::harmonize::HarmonizedAreas;
use crate::reconcile::{CellFlags, Purpose, Reconciliation};
use crate::table::Membership;

/// Area (km²) shared by one legacy zone and one land unit within a region.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapArea {
    /// Cover-baseline land.
    pub land: f64,
    pub pasture: f64,
    pub forest: f64,
}

/// Per (trade region, legacy zone): the land units it overlaps, in
/// first-seen order. Built from per-cell layers so those can be released
/// before rent is allocated.
#[derive(Debug, Clone, Default)]
pub struct ZoneOverlap {
    zones: IndexMap<(i32, u32), IndexMap<u32, OverlapArea>>,
    /// Trade region → land units, folded from the country membership.
    pub region_units: Membership,
    /// Trade region → legacy zones, folded from the country × zone membership.
    pub region_zones: Membership,
}

impl ZoneOverlap {
    pub fn build(recon: &Reconciliation, areas: &HarmonizedAreas, crosswalk: &Crosswalk) -> Self {
        let regions: Vec<i32> = crosswalk.trade_regions().map(|r| r.code).collect();
        let region_of = |c| crosswalk.trade_region_of(c);
        let region_units = recon.country_units.regroup(regions.iter().copied(), region_of);
        let region_zones = recon.country_zones.regroup(regions.iter().copied(), region_of);

        // Every zone a region's land touches, even where no cell has a land unit.
        let mut zones: IndexMap<(i32, u32), IndexMap<u32, OverlapArea>> = region_zones
            .iter()
            .flat_map(|(region, set)| set.iter().map(move |&zone| ((region, zone), IndexMap::new())))
            .collect();
        let mut unitless = 0usize;

        for cell in 0..recon.spec().ncells() {
            let flags = recon.flags(cell);
            if !flags.has(CellFlags::LEGACY_MEMBER) {
                continue;
            }
            let (Some(country), Some(zone)) = (recon.country_of(cell), recon.zone_of(cell)) else {
                continue;
            };
            let Some(units) = region_of(country).and_then(|r| zones.get_mut(&(r, zone))) else {
                continue;
            };
            if !flags.valid_for(Purpose::RentOverlap) {
                unitless += 1;
                continue;
            }
            let Some((_, unit)) = recon.member_key(cell) else { continue };
            let land = areas.cover.amount(cell);
            if land <= 0.0 {
                continue;
            }
            let o = units.entry(unit).or_default();
            o.land += land;
            o.pasture += areas.pasture.amount(cell);
            o.forest += areas.forest.amount(cell);
        }

        if unitless > 0 {
            debug!(cells = unitless, "legacy-zone cells without a land unit left out of rent overlap");
        }
        Self { zones, region_units, region_zones }
    }

    /// Land units overlapping (region, zone), or `None` when there are none.
    pub fn units(&self, region: i32, zone: u32) -> Option<&IndexMap<u32, OverlapArea>> {
        self.zones.get(&(region, zone)).filter(|u| !u.is_empty())
    }

    /// True if any zone of `region` holds land.
    pub fn has_region(&self, region: i32) -> bool {
        self.region_zones.units(region).is_some_and(|z| !z.is_empty())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::harmonize::harmonize;
    use crate::reconcile::reconcile;
    use crate::testkit::{self, Cell};

    #[test]
    fn overlap_folds_countries_into_regions() {
        let cells = [
            Cell { zone: 2, cover: 1, pasture: 10.0, ..Cell::at(10, 1) },
            Cell { zone: 2, pasture: 5.0, ..Cell::at(10, 3) },
            Cell { zone: 2, ..Cell::at(20, 3) },
            Cell { zone: -9999, ..Cell::at(10, 4) },
        ];
        let g = testkit::grid(&cells);
        let cw = testkit::crosswalk();
        let recon = reconcile(&g.spec, &g.keys, &g.areas, &cw, &testkit::land_units(4)).unwrap();
        let areas = harmonize(&g.spec, g.keys.land_cover, g.areas, &cw).unwrap();
        let o = ZoneOverlap::build(&recon, &areas, &cw);

        let units = o.units(1, 2).unwrap();
        assert_eq!(units.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_relative_eq!(units[&1].forest, 90.0);
        assert_relative_eq!(units[&3].pasture, 5.0);
        assert_eq!(o.units(2, 2).unwrap().len(), 1);
        assert!(o.units(1, 3).is_none());
        // Unit 4 has no legacy zone but still belongs to region 1.
        assert!(o.region_units.contains(1, 4));
        assert!(o.has_region(2));
        assert!(o.region_zones.contains(1, 2));
    }

    #[test]
    fn zones_come_from_the_legacy_membership() {
        let cells = [
            Cell { zone: 5, ..Cell::at(10, 1) },
            Cell { zone: 6, ..Cell::at(10, -9999) },
            Cell { zone: 7, area_cover: 0.0, area_extent: 0.0, ..Cell::at(10, 2) },
        ];
        let g = testkit::grid(&cells);
        let cw = testkit::crosswalk();
        let recon = reconcile(&g.spec, &g.keys, &g.areas, &cw, &testkit::land_units(4)).unwrap();
        let areas = harmonize(&g.spec, g.keys.land_cover, g.areas, &cw).unwrap();
        let o = ZoneOverlap::build(&recon, &areas, &cw);

        let zones: Vec<u32> = o.region_zones.units(1).unwrap().iter().copied().collect();
        assert_eq!(zones, vec![5, 6]);
        assert_eq!(o.len(), 2);
        assert!(o.units(1, 5).is_some());
        // Land without a land unit: the zone exists but overlaps nothing.
        assert!(o.units(1, 6).is_none());
        assert!(!o.has_region(2));
    }
}
