//! Where per-crop pixel layers come from.

use indexmap::IndexMap;

use crate::crosswalk::Crop;
use crate::error::Result;
use crate::grid::Layer;

/// Pixel-level data for one crop.
#[derive(Debug, Clone)]
pub struct CropLayers {
    /// Harvested area as a fraction of the cover-baseline land area.
    pub harvest_fraction: Layer<f32>,
    /// Yield, t/ha.
    pub yield_t_ha: Layer<f32>,
}

/// Supplies crop layers one crop at a time, so only one crop is resident.
pub trait CropSource {
    /// `Ok(None)` when the source has no data for `crop`; its rows stay zero.
    fn load(&mut self, crop: &Crop) -> Result<Option<CropLayers>>;
}

/// Crop layers already decoded in memory, keyed by crop code.
#[derive(Debug, Default)]
pub struct InMemoryCrops {
    layers: IndexMap<i32, CropLayers>,
}

impl InMemoryCrops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, crop_code: i32, layers: CropLayers) {
        self.layers.insert(crop_code, layers);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl CropSource for InMemoryCrops {
    fn load(&mut self, crop: &Crop) -> Result<Option<CropLayers>> {
        Ok(self.layers.shift_remove(&crop.code))
    }
}
