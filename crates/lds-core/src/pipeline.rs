//! Pipeline driver: runs every stage in dependency order and hands the
//! finished tables to a [`TableSink`].
//!
//!   Load → Reconcile → Harmonize → CropAggregate → LandType
//!        → RentDisaggregate → Emit
//!
//! Per-cell working layers are released as soon as no later stage reads
//! them. The first fatal error stops the run and is attributed to its stage.

use std::time::Instant;

use tracing::{error, info, info_span};

use crate::config::RunOptions;
use crate::crop::{aggregate_crops, CropSource, FaoStats};
use crate::crosswalk::Crosswalk;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, Stage};
use crate::harmonize::harmonize;
use crate::inputs::{CellKeys, GridInputs};
use crate::land_type::{aggregate_land_types, land_type_columns};
use crate::land_units::LandUnitTable;
use crate::reconcile::reconcile;
use crate::rent::{disaggregate_rent, LegacyRent, ProducerPrices, ZoneOverlap};
use crate::table::{AggregateTable, TableMeta, TableSink};

// ── Table names ─────────────────────────────────────────────────────────────

pub const MAPPING_TABLE: &str = "country_land_unit";
pub const HARVESTED_AREA_TABLE: &str = "harvested_area_ha";
pub const PRODUCTION_TABLE: &str = "production_t";
pub const PASTURE_TABLE: &str = "pasture_area_ha";
pub const LAND_TYPE_TABLE: &str = "land_type_area_ha";
pub const RENT_TABLE: &str = "land_rent_usd";
/// Suffix of tables regrouped to model regions.
pub const MODEL_REGION_SUFFIX: &str = "_region";

// ── Public structs ──────────────────────────────────────────────────────────

/// Static lookup tables and statistics a run reads but never changes.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub crosswalk: Crosswalk,
    pub land_units: LandUnitTable,
    pub fao: FaoStats,
    pub legacy_rent: LegacyRent,
    pub prices: ProducerPrices,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub diagnostics: Diagnostics,
    /// Names of the emitted tables, in emission order.
    pub tables: Vec<String>,
    pub elapsed_ms: u64,
}

pub struct Pipeline<'a> {
    reference: &'a ReferenceData,
    options: RunOptions,
}

fn in_stage<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let _span = info_span!("stage", %stage).entered();
    let started = Instant::now();
    let out = f().map_err(|e| e.in_stage(stage));
    match &out {
        Ok(_) => info!(elapsed_ms = started.elapsed().as_millis() as u64, "stage complete"),
        Err(e) => error!(error = %e, "stage failed"),
    }
    out
}

impl<'a> Pipeline<'a> {
    pub fn new(reference: &'a ReferenceData, options: RunOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { reference, options })
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// One full-globe pass over `inputs`.
    pub fn run(
        &self,
        inputs: GridInputs,
        crops: &mut dyn CropSource,
        sink: &mut dyn TableSink,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let cw = &self.reference.crosswalk;
        let units = &self.reference.land_units;
        let mut diagnostics = Diagnostics::default();

        in_stage(Stage::Load, || inputs.validate())?;
        let GridInputs { spec, keys, areas } = inputs;

        // ── 1. Reconcile ────────────────────────────────────────────────────
        let mut recon = in_stage(Stage::Reconcile, || reconcile(&spec, &keys, &areas, cw, units))?;
        let mapping = recon.mapping_rows(cw, units);
        // Identity rasters are fully captured by the reconciliation.
        let CellKeys { country, land_unit, legacy_zone, land_cover, protected } = keys;
        drop((country, land_unit, legacy_zone, protected));

        // ── 2. Harmonize ────────────────────────────────────────────────────
        let harmonized = in_stage(Stage::Harmonize, || harmonize(&spec, land_cover, areas, cw))?;

        // ── 3. Crops ────────────────────────────────────────────────────────
        let crop_tables = in_stage(Stage::CropAggregate, || {
            aggregate_crops(&recon, &harmonized, cw, self.options.calibration, &self.reference.fao, crops)
        })?;

        // ── 4. Land types ───────────────────────────────────────────────────
        let land_types = in_stage(Stage::LandType, || Ok(aggregate_land_types(&recon, &harmonized, cw)))?;

        // ── 5. Rent ─────────────────────────────────────────────────────────
        diagnostics.harmonize = harmonized.counts.clone();
        diagnostics.reconcile = std::mem::take(&mut recon.counts);
        diagnostics.countries = std::mem::take(&mut recon.per_country);
        let pairs = recon.country_units.pair_count();

        let rent = in_stage(Stage::RentDisaggregate, || {
            let overlap = ZoneOverlap::build(&recon, &harmonized, cw);
            drop(harmonized);
            drop(recon);
            disaggregate_rent(
                &overlap,
                &crop_tables.zone_production,
                cw,
                &self.reference.legacy_rent,
                &self.reference.prices,
            )
        })?;

        // ── 6. Emit ─────────────────────────────────────────────────────────
        let crop_cols: Vec<String> = cw.crops().iter().map(|c| c.name.clone()).collect();
        let use_cols: Vec<String> = cw.uses().map(|u| u.name.clone()).collect();
        let country_tables: [(&str, Vec<String>, &AggregateTable); 4] = [
            (HARVESTED_AREA_TABLE, crop_cols.clone(), &crop_tables.harvested_area),
            (PRODUCTION_TABLE, crop_cols, &crop_tables.production),
            (PASTURE_TABLE, vec!["pasture".to_string()], &land_types.pasture),
            (LAND_TYPE_TABLE, land_type_columns(cw), &land_types.land_type),
        ];

        let tables = in_stage(Stage::Emit, || {
            let mut emitted = Vec::new();
            sink.emit_mapping(MAPPING_TABLE, &mapping)?;
            emitted.push(MAPPING_TABLE.to_string());

            for (name, columns, table) in &country_tables {
                let meta = TableMeta {
                    name: name.to_string(),
                    owner_label: "fao_code".into(),
                    columns: columns.clone(),
                };
                sink.emit_aggregate(&meta, table)?;
                emitted.push(meta.name);
            }
            let meta = TableMeta { name: RENT_TABLE.into(), owner_label: "ctry87".into(), columns: use_cols };
            sink.emit_aggregate(&meta, &rent.rent)?;
            emitted.push(meta.name);

            if self.options.aggregate_model_regions {
                let regions: Vec<i32> = cw.model_regions().map(|r| r.code).collect();
                for (name, columns, table) in &country_tables {
                    let regrouped = table.regroup(regions.iter().copied(), |c| cw.model_region_of(c));
                    let meta = TableMeta {
                        name: format!("{name}{MODEL_REGION_SUFFIX}"),
                        owner_label: "region".into(),
                        columns: columns.clone(),
                    };
                    sink.emit_aggregate(&meta, &regrouped)?;
                    emitted.push(meta.name);
                }
            }
            Ok(emitted)
        })?;

        diagnostics.crop = crop_tables.counts;
        diagnostics.calibration = crop_tables.anomalies;
        diagnostics.land_type = land_types.counts;
        diagnostics.rent = rent.counts;
        diagnostics.rent_unallocated = rent.unallocated;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            pairs,
            tables = tables.len(),
            unallocated_rent_usd = diagnostics.unallocated_rent(),
            elapsed_ms,
            "run complete"
        );
        Ok(RunReport { diagnostics, tables, elapsed_ms })
    }
}
