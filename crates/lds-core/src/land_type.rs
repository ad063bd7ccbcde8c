//! Land-type area and pasture area by country × land unit.

use tracing::{debug, info};

use crate::crosswalk::Crosswalk;
use crate::diagnostics::LandTypeCounts;
use crate::grid::KM2_TO_HA;
use crate::harmonize::HarmonizedAreas;
use crate::reconcile::{CellFlags, Purpose, Reconciliation};
use crate::table::AggregateTable;

/// Land-use split recorded for every cover class.
pub const LAND_USES: [&str; 5] = [
    "cropland",
    "pasture",
    "urban",
    "unmanaged_unprotected",
    "unmanaged_protected",
];

/// Column labels: every cover class × every land use, class-major.
pub fn land_type_columns(crosswalk: &Crosswalk) -> Vec<String> {
    crosswalk
        .land_cover()
        .flat_map(|class| LAND_USES.iter().map(move |u| format!("{}_{u}", class.code)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct LandTypeTables {
    /// ha, `land_type_columns` wide.
    pub land_type: AggregateTable,
    /// ha, one column.
    pub pasture: AggregateTable,
    pub counts: LandTypeCounts,
}

pub fn aggregate_land_types(
    recon: &Reconciliation,
    areas: &HarmonizedAreas,
    crosswalk: &Crosswalk,
) -> LandTypeTables {
    let width = crosswalk.land_cover_count() * LAND_USES.len();
    let mut land_type = AggregateTable::zeros(&recon.country_units, width);
    let mut pasture = AggregateTable::zeros(&recon.country_units, 1);
    let mut counts = LandTypeCounts::default();

    for cell in 0..recon.spec().ncells() {
        let Some((country, unit)) = recon.member_key(cell) else { continue };
        let p = areas.pasture.amount(cell);
        pasture.add(country, unit, 0, p * KM2_TO_HA);

        let flags = recon.flags(cell);
        if !flags.valid_for(Purpose::LandType) {
            counts.missing_cover_cells += 1;
            continue;
        }
        let Some(ci) = areas.cover_class.value(cell).and_then(|c| crosswalk.cover_index(c)) else {
            counts.unknown_cover_cells += 1;
            continue;
        };

        let crop = areas.cropland.amount(cell);
        let urban = areas.urban.amount(cell);
        let unmanaged = (areas.cover.amount(cell) - crop - p - urban).max(0.0);
        let protected = flags.has(CellFlags::PROTECTED);
        let base = ci * LAND_USES.len();
        let split = [
            crop,
            p,
            urban,
            if protected { 0.0 } else { unmanaged },
            if protected { unmanaged } else { 0.0 },
        ];
        for (k, km2) in split.into_iter().enumerate() {
            if km2 > 0.0 {
                land_type.add(country, unit, base + k, km2 * KM2_TO_HA);
            }
        }
    }

    info!(rows = land_type.row_count(), "aggregated land-type area");
    if counts.missing_cover_cells > 0 || counts.unknown_cover_cells > 0 {
        debug!(
            missing_cover = counts.missing_cover_cells,
            unknown_cover = counts.unknown_cover_cells,
            "cells left out of land-type area"
        );
    }
    LandTypeTables { land_type, pasture, counts }
}
