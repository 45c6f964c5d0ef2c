//! Pipeline configuration.
//!
//! ```yaml
//! gap_penalty: 1.0
//! missing_distance: 1.0
//! threads: 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::align::{DEFAULT_GAP_PENALTY, MISSING_DISTANCE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Cost of aligning a segment against the gap
    pub gap_penalty: f64,
    /// Substitution cost for segment pairs absent from the similarity table
    pub missing_distance: f64,
    /// Worker threads; `None` uses rayon's default
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gap_penalty: DEFAULT_GAP_PENALTY,
            missing_distance: MISSING_DISTANCE,
            threads: None,
        }
    }
}

impl PipelineConfig {
    /// Load config from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_yaml(&content)?;
        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.gap_penalty.is_finite() && self.gap_penalty >= 0.0) {
            return Err(Error::Config(format!(
                "gap_penalty must be a non-negative number, got {}",
                self.gap_penalty
            )));
        }
        if !(self.missing_distance.is_finite() && self.missing_distance >= 0.0) {
            return Err(Error::Config(format!(
                "missing_distance must be a non-negative number, got {}",
                self.missing_distance
            )));
        }
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Run `op` on a pool sized by `threads`
    pub fn install<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        Ok(pool.install(op))
    }
}
