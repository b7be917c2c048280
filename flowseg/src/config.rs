//! Configuration for encoding flows and recovering masks from them.
//!
//! [`Config`] is flat; parameters are grouped by comments into the pipeline
//! stages they control. It can be loaded from YAML or JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use common::FileFormat;

use crate::encode::FlowMethod;
use crate::error::{FlowError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ------------------------------------------------------------------------
    // Flow encoding
    // ------------------------------------------------------------------------
    /// Encoder used to derive flows from masks, both for training targets
    /// and for the flow-consistency check.
    pub method: FlowMethod,

    // ------------------------------------------------------------------------
    // Dynamics
    // ------------------------------------------------------------------------
    /// Euler integration steps.
    pub niter: usize,
    /// Magnitude of predicted flows relative to unit vectors. Flows are
    /// divided by it before advection.
    pub flow_scale: f32,
    /// Pixels whose object probability does not exceed this stay in place.
    pub cellprob_threshold: f32,

    // ------------------------------------------------------------------------
    // Instance extraction
    // ------------------------------------------------------------------------
    /// Histogram bins added beyond the grid on every side.
    pub histogram_padding: usize,
    /// Width of the separable maximum filter used for peak finding. Must be odd.
    pub peak_window: usize,
    /// A peak needs strictly more converged pixels than this to seed an instance.
    pub min_seed_count: u32,
    /// Region growth only enters bins with strictly more pixels than this.
    pub min_grow_count: u32,
    /// Neighborhood expansion rounds per seed.
    pub growth_rounds: usize,
    /// Instances covering more than this fraction of the grid are discarded.
    pub max_area_fraction: f32,
    /// Instances whose flow error exceeds this are discarded. `None` or a
    /// non-positive value disables the check.
    pub flow_threshold: Option<f32>,

    // ------------------------------------------------------------------------
    // Post-processing
    // ------------------------------------------------------------------------
    /// Minimum fragment size kept by hole filling. `None` skips hole filling.
    pub min_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            method: FlowMethod::Diffusion,

            niter: 200,
            flow_scale: 1.0,
            cellprob_threshold: 0.0,

            histogram_padding: 20,
            peak_window: 5,
            min_seed_count: 10,
            min_grow_count: 2,
            growth_rounds: 5,
            max_area_fraction: 0.35,
            flow_threshold: Some(0.4),

            min_size: Some(15),
        }
    }
}

impl Config {
    /// Validate all parameters.
    ///
    /// # Panics
    /// Panics with a descriptive message if any parameter is out of range.
    pub fn validate(&self) {
        assert!(
            self.flow_scale > 0.0 && self.flow_scale.is_finite(),
            "flow_scale must be positive and finite, got {}",
            self.flow_scale
        );
        assert!(
            self.cellprob_threshold.is_finite(),
            "cellprob_threshold must be finite, got {}",
            self.cellprob_threshold
        );
        assert!(
            self.peak_window % 2 == 1,
            "peak_window must be odd, got {}",
            self.peak_window
        );
        assert!(
            self.max_area_fraction > 0.0 && self.max_area_fraction <= 1.0,
            "max_area_fraction must be in (0, 1], got {}",
            self.max_area_fraction
        );
        if let Some(threshold) = self.flow_threshold {
            assert!(!threshold.is_nan(), "flow_threshold must not be NaN");
        }
    }

    /// The flow-consistency threshold when the check is enabled.
    pub fn active_flow_threshold(&self) -> Option<f32> {
        self.flow_threshold.filter(|&t| t > 0.0)
    }

    /// Load a config from a `.yaml`, `.yml` or `.json` file. Missing fields
    /// take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path).map_err(|source| FlowError::ConfigExtension {
            path: path.to_path_buf(),
            source,
        })?;
        let text = std::fs::read_to_string(path).map_err(|source| FlowError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = common::deserialize(&text, format)?;
        tracing::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn to_text(&self, format: FileFormat) -> Result<String> {
        Ok(common::serialize(self, format)?)
    }
}
