//! Historical land rent on the legacy 18-zone partition, and the producer
//! prices used to value crop production.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::crosswalk::Crosswalk;
use crate::error::{LdsError, Result};
use crate::reconcile::LEGACY_ZONE_COUNT;

const ZONES: usize = LEGACY_ZONE_COUNT as usize;

/// Legacy rent inputs are in million USD.
pub const MUSD_TO_USD: f64 = 1.0e6;

/// One legacy rent row: trade region × use, one value per legacy zone
/// (million USD, zone 1 first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyRentRecord {
    pub region: i32,
    pub use_code: i32,
    pub zones_musd: Vec<f64>,
}

/// Legacy land rent in USD, keyed by (trade region, use code).
#[derive(Debug, Clone, Default)]
pub struct LegacyRent {
    values: IndexMap<(i32, i32), [f64; ZONES]>,
}

impl LegacyRent {
    /// Validate codes against the crosswalk and convert to USD. Negative or
    /// non-finite values are read as zero, like missing ones.
    pub fn from_records(records: Vec<LegacyRentRecord>, crosswalk: &Crosswalk) -> Result<Self> {
        let known_regions: Vec<i32> = crosswalk.trade_regions().map(|r| r.code).collect();
        let mut values = IndexMap::with_capacity(records.len());
        for r in records {
            if !known_regions.contains(&r.region) {
                return Err(LdsError::UnknownCode { taxonomy: "trade region", code: r.region.into() });
            }
            if crosswalk.use_index(r.use_code).is_none() {
                return Err(LdsError::UnknownCode { taxonomy: "use", code: r.use_code.into() });
            }
            if r.zones_musd.len() != ZONES {
                return Err(LdsError::InvalidTable {
                    table: "legacy rent",
                    reason: format!(
                        "region {} use {} has {} zone values, expected {ZONES}",
                        r.region,
                        r.use_code,
                        r.zones_musd.len()
                    ),
                });
            }
            let mut usd = [0.0; ZONES];
            for (dst, v) in usd.iter_mut().zip(&r.zones_musd) {
                if v.is_finite() && *v > 0.0 {
                    *dst = v * MUSD_TO_USD;
                }
            }
            if values.insert((r.region, r.use_code), usd).is_some() {
                return Err(LdsError::InvalidTable {
                    table: "legacy rent",
                    reason: format!("region {} use {} is listed twice", r.region, r.use_code),
                });
            }
        }
        Ok(Self { values })
    }

    /// USD per legacy zone; index 0 is zone 1.
    pub fn get(&self, region: i32, use_code: i32) -> Option<&[f64; ZONES]> {
        self.values.get(&(region, use_code))
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), &[f64; ZONES])> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Total rent of one region and use, USD.
    pub fn total(&self, region: i32, use_code: i32) -> f64 {
        self.get(region, use_code).map_or(0.0, |z| z.iter().sum())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub region: i32,
    /// FAO crop code.
    pub crop: i32,
    pub usd_per_t: f64,
}

/// Producer prices by (trade region, FAO crop), USD/t.
#[derive(Debug, Clone, Default)]
pub struct ProducerPrices {
    values: HashMap<(i32, i32), f64>,
}

impl ProducerPrices {
    /// Price used when a region reports none for a crop.
    pub const DEFAULT_USD_PER_T: f64 = 1.0;

    pub fn from_records(records: Vec<PriceRecord>) -> Self {
        let values = records
            .into_iter()
            .filter(|r| r.usd_per_t.is_finite() && r.usd_per_t >= 0.0)
            .map(|r| ((r.region, r.crop), r.usd_per_t))
            .collect();
        Self { values }
    }

    pub fn price(&self, region: i32, fao_crop: i32) -> f64 {
        self.values
            .get(&(region, fao_crop))
            .copied()
            .unwrap_or(Self::DEFAULT_USD_PER_T)
    }
}
