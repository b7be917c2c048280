//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use flowseg::prelude::*;
//! ```

// Core types
pub use crate::{FlowError, FlowField, LabelMap, Shape, TrainingTarget};

// Configuration
pub use crate::{Config, FlowMethod};

// Encoding
pub use crate::{
    encode_flows, DiameterEstimator, EquivalentDiameter, FlowErrorMetric, FlowFieldBuilder,
    LabelInput, MeanSquaredFlowError,
};

// Decoding
pub use crate::{compute_masks, extract_instances, fill_holes, follow_flows, MaskResult, ParticleSet};
