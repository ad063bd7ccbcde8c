//! Fatal failure reasons for the land data pipeline.
//!
//! Only input-shape, classification and resource failures live here.
//! Per-cell data-quality anomalies are counted in
//! [`Diagnostics`](crate::diagnostics::Diagnostics) and never abort a run.

use std::fmt;

use thiserror::Error;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Reconcile,
    Harmonize,
    CropAggregate,
    LandType,
    RentDisaggregate,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Reconcile => "reconcile",
            Stage::Harmonize => "harmonize",
            Stage::CropAggregate => "crop-aggregate",
            Stage::LandType => "land-type",
            Stage::RentDisaggregate => "rent-disaggregate",
            Stage::Emit => "emit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LdsError {
    #[error("layer `{layer}` has {found} cells, working grid has {expected}")]
    ShapeMismatch {
        layer: String,
        expected: usize,
        found: usize,
    },

    #[error("layer `{layer}` is declared on {found}, working grid is {expected}")]
    GridMismatch {
        layer: String,
        expected: String,
        found: String,
    },

    #[error("unknown {taxonomy} code {code}")]
    UnknownCode { taxonomy: &'static str, code: i64 },

    #[error("duplicate {taxonomy} code {code}")]
    DuplicateCode { taxonomy: &'static str, code: i64 },

    #[error("invalid {table} table: {reason}")]
    InvalidTable { table: &'static str, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to allocate {cells} cells for `{what}`")]
    Allocation { what: String, cells: usize },

    #[error("emit of table `{table}` failed: {reason}")]
    Emit { table: String, reason: String },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<LdsError>,
    },
}

impl LdsError {
    /// Attribute this error to a pipeline stage. Already-attributed errors
    /// keep their original stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            e @ LdsError::Stage { .. } => e,
            other => LdsError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// True for resource (allocation) failures, as opposed to input errors.
    pub fn is_resource(&self) -> bool {
        match self {
            LdsError::Allocation { .. } => true,
            LdsError::Stage { source, .. } => source.is_resource(),
            _ => false,
        }
    }

    /// The stage this error was attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            LdsError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_keeps_first_attribution() {
        let err = LdsError::Config("bad".into())
            .in_stage(Stage::CropAggregate)
            .in_stage(Stage::Emit);
        assert_eq!(err.stage(), Some(Stage::CropAggregate));
        assert!(err.to_string().starts_with("crop-aggregate stage failed"));
    }

    #[test]
    fn allocation_is_resource_error() {
        let err = LdsError::Allocation { what: "cropland".into(), cells: 10 }
            .in_stage(Stage::Harmonize);
        assert!(err.is_resource());
        assert!(!LdsError::Config("x".into()).is_resource());
    }
}
