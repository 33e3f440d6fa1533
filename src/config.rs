//! Analysis configuration, read from TOON.
//!
//! ```text
//! max_depth: 3
//! cycle_iterations: 64
//! cutoff: 0.01
//! batch:
//!   parallel: true
//!   workers: 4
//! ```

use serde::{Deserialize, Serialize};

use crate::core::error::AnalysisError;
use crate::core::resolve::CycleSettings;
use crate::core::tree::TreeOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upstream tree depth; the root is level 0.
    pub max_depth: usize,
    /// Iteration cap for refining totals on cyclic graphs.
    pub cycle_iterations: usize,
    /// Largest per-sweep change at which cyclic refinement stops early.
    pub cycle_tolerance: f64,
    /// Minimum |share of root| for a tree child to be materialized.
    pub cutoff: f64,
    pub batch: BatchConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            cycle_iterations: 64,
            cycle_tolerance: 1e-12,
            cutoff: 0.0,
            batch: BatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Run work items on a worker pool instead of one after another.
    pub parallel: bool,
    /// Pool size; `None` lets the pool pick one per core.
    pub workers: Option<usize>,
}

impl AnalysisConfig {
    pub fn from_toon(input: &str) -> Result<Self, AnalysisError> {
        let config: Self =
            toon_format::decode_default(input).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toon(&self) -> Result<String, AnalysisError> {
        toon_format::encode_default(self).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.cycle_tolerance.is_finite() && self.cycle_tolerance >= 0.0) {
            return Err(AnalysisError::Config(format!(
                "cycle_tolerance must be a non-negative number, got {}",
                self.cycle_tolerance
            )));
        }
        if !(self.cutoff.is_finite() && (0.0..=1.0).contains(&self.cutoff)) {
            return Err(AnalysisError::Config(format!(
                "cutoff must be within [0, 1], got {}",
                self.cutoff
            )));
        }
        if self.batch.workers == Some(0) {
            return Err(AnalysisError::Config("batch.workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            max_iterations: self.cycle_iterations,
            tolerance: self.cycle_tolerance,
        }
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            max_depth: self.max_depth,
            cutoff: self.cutoff,
        }
    }
}
