//! Classification crosswalk between the country, crop, use and land-cover
//! code systems.
//!
//! Four parallel country taxonomies are carried: FAO codes (the cell key),
//! ISO abbreviations, the fixed trade-region taxonomy used by the legacy land
//! rent data, and the run-specific model regions.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LdsError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    /// FAO country code, as stored in the country raster.
    pub fao: i32,
    pub iso: String,
    pub name: String,
    /// Trade region (87-region taxonomy). Countries without one are not
    /// part of the land rent outputs.
    #[serde(default)]
    pub trade_region: Option<i32>,
    #[serde(default)]
    pub model_region: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRegion {
    pub code: i32,
    pub abbr: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRegion {
    pub code: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crop {
    pub code: i32,
    pub name: String,
    /// FAO crop code used to look up national statistics and prices.
    pub fao_code: i32,
    pub use_code: i32,
}

/// Which weighting scheme re-keys a use's legacy land rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseFamily {
    Crop,
    Livestock,
    Forestry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCategory {
    pub code: i32,
    pub name: String,
    pub family: UseFamily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandCoverClass {
    pub code: i32,
    pub name: String,
    #[serde(default)]
    pub forest: bool,
    /// The class assigned to ice / permanent snow cells.
    #[serde(default)]
    pub ice: bool,
}

/// The decoded static code tables, as delivered by the table readers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeTables {
    pub countries: Vec<Country>,
    pub trade_regions: Vec<TradeRegion>,
    #[serde(default)]
    pub model_regions: Vec<ModelRegion>,
    pub crops: Vec<Crop>,
    pub uses: Vec<UseCategory>,
    pub land_cover: Vec<LandCoverClass>,
}

/// Validated lookup tables. Order of every list is the order of the input
/// tables and is the output order of every emitted table.
#[derive(Debug, Clone)]
pub struct Crosswalk {
    countries: IndexMap<i32, Country>,
    trade_regions: IndexMap<i32, TradeRegion>,
    model_regions: IndexMap<i32, ModelRegion>,
    crops: Vec<Crop>,
    crop_use: Vec<usize>,
    uses: IndexMap<i32, UseCategory>,
    land_cover: IndexMap<i32, LandCoverClass>,
    ice_class: Option<i32>,
}

fn keyed<T>(
    items: Vec<T>,
    taxonomy: &'static str,
    key: impl Fn(&T) -> i32,
) -> Result<IndexMap<i32, T>> {
    let mut map = IndexMap::with_capacity(items.len());
    for item in items {
        let code = key(&item);
        if map.insert(code, item).is_some() {
            return Err(LdsError::DuplicateCode { taxonomy, code: code.into() });
        }
    }
    Ok(map)
}

impl Crosswalk {
    pub fn from_tables(tables: CodeTables) -> Result<Self> {
        let countries = keyed(tables.countries, "country", |c| c.fao)?;
        let trade_regions = keyed(tables.trade_regions, "trade region", |r| r.code)?;
        let model_regions = keyed(tables.model_regions, "model region", |r| r.code)?;
        let uses = keyed(tables.uses, "use", |u| u.code)?;
        let land_cover = keyed(tables.land_cover, "land cover", |l| l.code)?;

        for country in countries.values() {
            if let Some(code) = country.trade_region {
                if !trade_regions.contains_key(&code) {
                    return Err(LdsError::UnknownCode { taxonomy: "trade region", code: code.into() });
                }
            }
            if let Some(code) = country.model_region {
                if !model_regions.contains_key(&code) {
                    return Err(LdsError::UnknownCode { taxonomy: "model region", code: code.into() });
                }
            }
        }

        let mut seen = HashSet::with_capacity(tables.crops.len());
        let mut crop_use = Vec::with_capacity(tables.crops.len());
        for crop in &tables.crops {
            if !seen.insert(crop.code) {
                return Err(LdsError::DuplicateCode { taxonomy: "crop", code: crop.code.into() });
            }
            let idx = uses
                .get_index_of(&crop.use_code)
                .ok_or(LdsError::UnknownCode { taxonomy: "use", code: crop.use_code.into() })?;
            crop_use.push(idx);
        }

        let mut ice = land_cover.values().filter(|l| l.ice).map(|l| l.code);
        let ice_class = ice.next();
        if ice.next().is_some() {
            return Err(LdsError::InvalidTable {
                table: "land cover",
                reason: "more than one class is flagged as ice".into(),
            });
        }

        Ok(Self {
            countries,
            trade_regions,
            model_regions,
            crops: tables.crops,
            crop_use,
            uses,
            land_cover,
            ice_class,
        })
    }

    // ── Countries ───────────────────────────────────────────────────────────

    pub fn countries(&self) -> impl Iterator<Item = &Country> {
        self.countries.values()
    }

    pub fn country(&self, fao: i32) -> Option<&Country> {
        self.countries.get(&fao)
    }

    pub fn knows_country(&self, fao: i32) -> bool {
        self.countries.contains_key(&fao)
    }

    pub fn trade_region_of(&self, fao: i32) -> Option<i32> {
        self.countries.get(&fao)?.trade_region
    }

    pub fn model_region_of(&self, fao: i32) -> Option<i32> {
        self.countries.get(&fao)?.model_region
    }

    pub fn trade_regions(&self) -> impl Iterator<Item = &TradeRegion> {
        self.trade_regions.values()
    }

    pub fn model_regions(&self) -> impl Iterator<Item = &ModelRegion> {
        self.model_regions.values()
    }

    // ── Crops and uses ──────────────────────────────────────────────────────

    pub fn crops(&self) -> &[Crop] {
        &self.crops
    }

    /// Position in [`uses`](Self::uses) of the use category of crop `crop_idx`.
    pub fn crop_use_index(&self, crop_idx: usize) -> Option<usize> {
        self.crop_use.get(crop_idx).copied()
    }

    pub fn uses(&self) -> impl Iterator<Item = &UseCategory> {
        self.uses.values()
    }

    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    pub fn use_index(&self, code: i32) -> Option<usize> {
        self.uses.get_index_of(&code)
    }

    pub fn use_at(&self, idx: usize) -> Option<&UseCategory> {
        self.uses.get_index(idx).map(|(_, u)| u)
    }

    // ── Land cover ──────────────────────────────────────────────────────────

    pub fn land_cover(&self) -> impl Iterator<Item = &LandCoverClass> {
        self.land_cover.values()
    }

    pub fn land_cover_count(&self) -> usize {
        self.land_cover.len()
    }

    pub fn cover_index(&self, code: i32) -> Option<usize> {
        self.land_cover.get_index_of(&code)
    }

    pub fn is_forest(&self, code: i32) -> bool {
        self.land_cover.get(&code).is_some_and(|l| l.forest)
    }

    pub fn ice_class(&self) -> Option<i32> {
        self.ice_class
    }
}
