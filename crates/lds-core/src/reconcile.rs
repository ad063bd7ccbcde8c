//! Cell reconciliation: per-dataset validity for every cell, and the sparse
//! country → land-unit and country → legacy-zone membership sets every later
//! aggregate is shaped by.
//!
//! Per-cell anomalies (unknown codes, missing layers) only mask cells out and
//! are counted; the only fatal failures are shape and allocation errors.

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::crosswalk::Crosswalk;
use crate::diagnostics::{CountryCounts, ReconcileCounts};
use crate::error::Result;
use crate::grid::{alloc_cells, GridSpec, NODATA};
use crate::inputs::{AreaInputs, CellKeys};
use crate::land_units::LandUnitTable;
use crate::table::{MappingRow, Membership};

/// Number of zones in the legacy land-rent partition.
pub const LEGACY_ZONE_COUNT: u32 = 18;

// ── Cell flags ──────────────────────────────────────────────────────────────

/// Per-cell validity bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFlags(u16);

impl CellFlags {
    pub const COUNTRY_PRESENT: u16 = 1 << 0;
    pub const COUNTRY_KNOWN: u16 = 1 << 1;
    pub const UNIT_PRESENT: u16 = 1 << 2;
    pub const UNIT_KNOWN: u16 = 1 << 3;
    /// Legacy zone within 1..=18.
    pub const ZONE_VALID: u16 = 1 << 4;
    pub const COVER_PRESENT: u16 = 1 << 5;
    pub const LAND_A: u16 = 1 << 6;
    pub const LAND_B: u16 = 1 << 7;
    pub const PROTECTED: u16 = 1 << 8;
    /// Counted in the country × land-unit membership.
    pub const MEMBER: u16 = 1 << 9;
    /// Counted in the country × legacy-zone membership.
    pub const LEGACY_MEMBER: u16 = 1 << 10;

    #[inline]
    pub fn has(self, bits: u16) -> bool {
        self.0 & bits == bits
    }

    #[inline]
    fn set(&mut self, bits: u16) {
        self.0 |= bits;
    }

    pub fn has_land(self) -> bool {
        self.0 & (Self::LAND_A | Self::LAND_B) != 0
    }

    /// True when every attribute `purpose` depends on is present.
    pub fn valid_for(self, purpose: Purpose) -> bool {
        match purpose {
            Purpose::CropArea => self.has(Self::MEMBER),
            Purpose::LandType => self.has(Self::MEMBER | Self::COVER_PRESENT),
            Purpose::RentOverlap => self.has(Self::MEMBER | Self::LEGACY_MEMBER),
        }
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

/// Downstream uses of a cell, each with its own validity requirements.
///
/// Crop area deliberately does not depend on cover or on cropland extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    CropArea,
    LandType,
    RentOverlap,
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Reconciled cell keys. Raw key rasters can be released once this exists.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    spec: GridSpec,
    flags: Vec<CellFlags>,
    /// FAO code when known, else `NODATA`.
    country: Vec<i32>,
    /// Land-unit id when known, else 0.
    unit: Vec<u32>,
    /// Legacy zone when valid, else 0.
    zone: Vec<u8>,
    pub country_units: Membership,
    pub country_zones: Membership,
    pub counts: ReconcileCounts,
    pub per_country: IndexMap<i32, CountryCounts>,
}

impl Reconciliation {
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn flags(&self, cell: usize) -> CellFlags {
        self.flags.get(cell).copied().unwrap_or_default()
    }

    /// (country, land unit) of a membership-valid cell.
    #[inline]
    pub fn member_key(&self, cell: usize) -> Option<(i32, u32)> {
        self.flags(cell)
            .has(CellFlags::MEMBER)
            .then(|| (self.country[cell], self.unit[cell]))
    }

    /// Known country of a cell, regardless of its land unit.
    pub fn country_of(&self, cell: usize) -> Option<i32> {
        self.flags(cell)
            .has(CellFlags::COUNTRY_KNOWN)
            .then(|| self.country[cell])
    }

    pub fn zone_of(&self, cell: usize) -> Option<u32> {
        self.flags(cell)
            .has(CellFlags::ZONE_VALID)
            .then(|| u32::from(self.zone[cell]))
    }

    /// Country / land-unit mapping list, in membership order.
    pub fn mapping_rows(&self, crosswalk: &Crosswalk, units: &LandUnitTable) -> Vec<MappingRow> {
        let mut rows = Vec::with_capacity(self.country_units.pair_count());
        for (country, set) in self.country_units.iter() {
            let iso = crosswalk.country(country).map(|c| c.iso.clone()).unwrap_or_default();
            for &unit in set {
                rows.push(MappingRow {
                    country,
                    iso: iso.clone(),
                    land_unit: unit,
                    land_unit_name: units.name(unit).unwrap_or_default().to_string(),
                });
            }
        }
        rows
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Scan every cell once, flag it, and build the membership sets.
pub fn reconcile(
    spec: &GridSpec,
    keys: &CellKeys,
    areas: &AreaInputs,
    crosswalk: &Crosswalk,
    units: &LandUnitTable,
) -> Result<Reconciliation> {
    for layer in [&keys.country, &keys.land_unit, &keys.legacy_zone, &keys.land_cover] {
        layer.ensure_on(spec)?;
    }
    keys.protected.ensure_on(spec)?;
    areas.land_area_cover.ensure_on(spec)?;
    areas.land_area_extent.ensure_on(spec)?;

    let n = spec.ncells();
    let mut flags = alloc_cells("cell flags", n, CellFlags::default())?;
    let mut country = alloc_cells("reconciled country", n, NODATA)?;
    let mut unit = alloc_cells("reconciled land unit", n, 0u32)?;
    let mut zone = alloc_cells("reconciled legacy zone", n, 0u8)?;

    let fao_codes: Vec<i32> = crosswalk.countries().map(|c| c.fao).collect();
    let mut country_units = Membership::with_owners(fao_codes.iter().copied());
    let mut country_zones = Membership::with_owners(fao_codes.iter().copied());
    let mut per_country: IndexMap<i32, CountryCounts> =
        fao_codes.iter().map(|&c| (c, CountryCounts::default())).collect();
    let mut counts = ReconcileCounts { cells: n, ..Default::default() };

    for cell in 0..n {
        let mut f = CellFlags::default();

        let land_a = areas.land_area_cover.amount(cell) > 0.0;
        let land_b = areas.land_area_extent.amount(cell) > 0.0;
        if land_a {
            f.set(CellFlags::LAND_A);
        }
        if land_b {
            f.set(CellFlags::LAND_B);
        }
        match (land_a, land_b) {
            (true, false) => counts.land_cover_baseline_only += 1,
            (false, true) => counts.land_extent_baseline_only += 1,
            _ => {}
        }
        let has_land = land_a || land_b;

        let raw_country = keys.country.value(cell);
        let raw_unit = keys.land_unit.value(cell);
        if raw_country.is_none() || raw_unit.is_none() {
            counts.missing_country_or_unit += 1;
        }

        let known_country = match raw_country {
            Some(c) => {
                f.set(CellFlags::COUNTRY_PRESENT);
                if crosswalk.knows_country(c) {
                    f.set(CellFlags::COUNTRY_KNOWN);
                    country[cell] = c;
                    Some(c)
                } else {
                    counts.unknown_country += 1;
                    None
                }
            }
            None => None,
        };

        let known_unit = match raw_unit {
            Some(u) => {
                f.set(CellFlags::UNIT_PRESENT);
                let resolved = units.resolve(u);
                match resolved {
                    Some(id) => {
                        f.set(CellFlags::UNIT_KNOWN);
                        unit[cell] = id;
                    }
                    None => counts.unknown_unit += 1,
                }
                resolved
            }
            None => None,
        };

        match keys.legacy_zone.value(cell) {
            Some(z) if (1..=LEGACY_ZONE_COUNT as i32).contains(&z) => {
                f.set(CellFlags::ZONE_VALID);
                zone[cell] = z as u8;
            }
            Some(_) => counts.unknown_legacy_zone += 1,
            None => {}
        }

        let has_cover = keys.land_cover.value(cell).is_some();
        if has_cover {
            f.set(CellFlags::COVER_PRESENT);
        } else if has_land {
            counts.land_missing_cover += 1;
        }

        if keys.protected.value(cell) == Some(1) {
            f.set(CellFlags::PROTECTED);
        }

        if let Some(c) = known_country {
            let cc = per_country.entry(c).or_default();
            match (raw_unit, known_unit) {
                (None, _) => {
                    counts.country_without_unit += 1;
                    cc.missing_unit_cells += 1;
                }
                (Some(_), None) => cc.unknown_unit_cells += 1,
                _ => {}
            }
            if has_land && !has_cover {
                cc.missing_cover_cells += 1;
            }

            if has_land {
                if let Some(u) = known_unit {
                    f.set(CellFlags::MEMBER);
                    country_units.insert(c, u);
                    cc.valid_cells += 1;
                    counts.membership_cells += 1;
                }
                if f.has(CellFlags::ZONE_VALID) {
                    f.set(CellFlags::LEGACY_MEMBER);
                    country_zones.insert(c, u32::from(zone[cell]));
                    counts.legacy_cells += 1;
                }
            }
        }

        flags[cell] = f;
    }

    info!(
        cells = n,
        members = counts.membership_cells,
        pairs = country_units.pair_count(),
        legacy_pairs = country_zones.pair_count(),
        "reconciled cell membership"
    );
    if counts.unknown_country > 0 || counts.unknown_unit > 0 {
        warn!(
            unknown_country = counts.unknown_country,
            unknown_unit = counts.unknown_unit,
            unknown_legacy_zone = counts.unknown_legacy_zone,
            "cells with codes missing from the lookup tables were excluded"
        );
    }
    debug!(
        missing = counts.missing_country_or_unit,
        country_without_unit = counts.country_without_unit,
        cover_only = counts.land_cover_baseline_only,
        extent_only = counts.land_extent_baseline_only,
        missing_cover = counts.land_missing_cover,
        "reconciliation counts"
    );

    Ok(Reconciliation {
        spec: *spec,
        flags,
        country,
        unit,
        zone,
        country_units,
        country_zones,
        counts,
        per_country,
    })
}
