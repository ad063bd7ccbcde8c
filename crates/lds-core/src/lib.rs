//! Land data system core: reconciles independently rasterized global
//! datasets on a 5 arc-minute grid and aggregates them into country ×
//! land-unit tables of harvested area, production, land type and land rent.

pub mod config;
pub mod crop;
pub mod crosswalk;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod harmonize;
pub mod inputs;
pub mod land_type;
pub mod land_units;
pub mod pipeline;
pub mod reconcile;
pub mod rent;
pub mod table;

#[cfg(test)]
mod testkit;

pub use config::{Calibration, RunOptions};
pub use crop::{CropLayers, CropSource, FaoRecord, FaoStats, InMemoryCrops};
pub use crosswalk::{CodeTables, Crosswalk};
pub use diagnostics::Diagnostics;
pub use error::{LdsError, Result, Stage};
pub use grid::{GridSpec, Layer, NODATA, NODATA_F32};
pub use inputs::{AreaInputs, CellKeys, GridInputs};
pub use land_units::{LandUnit, LandUnitTable};
pub use pipeline::{Pipeline, ReferenceData, RunReport};
pub use rent::{LegacyRent, LegacyRentRecord, PriceRecord, ProducerPrices};
pub use table::{AggregateTable, MappingRow, MemorySink, TableMeta, TableSink};
