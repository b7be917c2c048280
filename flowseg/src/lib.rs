//! Flowseg - flow-field encoding and decoding of instance masks.
//!
//! Instance masks are represented as dense flow fields in which every object
//! pixel points toward the center of its instance. This library provides:
//! - Flow encoders (center-seeded diffusion in 2D and 3D, geodesic distance in 2D)
//! - Training targets for batches of label maps
//! - Particle advection along predicted flows
//! - Instance extraction from converged particles, with hole filling
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use flowseg::prelude::*;
//!
//! // Encode ground-truth labels
//! let encoded = encode_flows(&labels, FlowMethod::Diffusion, &EquivalentDiameter)?;
//!
//! // Recover masks from a flow field and object probabilities
//! let config = Config::default();
//! let result = compute_masks(
//!     &encoded.flow,
//!     Some(&cellprob),
//!     &config,
//!     &EquivalentDiameter,
//!     &MeanSquaredFlowError::default(),
//! )?;
//! println!("Found {} masks", result.labels.max_label());
//! ```

mod config;
pub mod dynamics;
pub mod encode;
mod error;
pub mod extract;
mod flow;
pub mod grid;
mod labels;
pub mod metrics;
mod pipeline;
mod targets;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude;

// ============================================================================
// Core types
// ============================================================================

pub use error::{FlowError, Result};
pub use flow::{ChannelStack, FlowField, TrainingTarget, NORM_EPSILON};
pub use grid::{BoundingBox, Grid, Shape};
pub use labels::LabelMap;

// ============================================================================
// Configuration
// ============================================================================

pub use config::Config;

// ============================================================================
// Encoding
// ============================================================================

pub use encode::{diffusion_flows, encode_flows, geodesic_flows, EncodedFlow, FlowMethod};
pub use metrics::{DiameterEstimator, EquivalentDiameter, FlowErrorMetric, MeanSquaredFlowError};
pub use targets::{FlowFieldBuilder, LabelInput};

// ============================================================================
// Decoding
// ============================================================================

pub use dynamics::{advect, follow_flows, ParticleSet, Position};
pub use extract::{discard_inconsistent_instances, extract_instances, fill_holes, FlowConsistency};
pub use pipeline::{compute_masks, MaskResult};
