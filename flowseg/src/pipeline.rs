//! Masks from predicted flows and object probabilities.

use crate::config::Config;
use crate::dynamics::{follow_flows, ParticleSet};
use crate::error::Result;
use crate::extract::{extract_instances, fill_holes, FlowConsistency};
use crate::flow::FlowField;
use crate::labels::LabelMap;
use crate::metrics::{DiameterEstimator, FlowErrorMetric};

/// Recovered instances and the particle positions they were read from.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskResult {
    pub labels: LabelMap,
    pub positions: ParticleSet,
}

/// Recovers instance masks from a predicted flow field.
///
/// Pixels whose object probability does not exceed
/// `config.cellprob_threshold` keep zero flow and stay in place; without
/// `cellprob` every pixel counts as object. Predicted flows point toward
/// instance centers, so they are negated and divided by `config.flow_scale`
/// before advection.
pub fn compute_masks(
    flow: &FlowField,
    cellprob: Option<&[f32]>,
    config: &Config,
    estimator: &dyn DiameterEstimator,
    metric: &dyn FlowErrorMetric,
) -> Result<MaskResult> {
    config.validate();
    let shape = flow.shape().clone();

    let is_object: Vec<bool> = match cellprob {
        Some(prob) => {
            shape.ensure_len("object probability", prob.len())?;
            prob.iter().map(|&p| p > config.cellprob_threshold).collect()
        }
        None => vec![true; shape.len()],
    };

    let mut input = flow.clone();
    input.gate(&is_object)?;
    input.scale(-1.0 / config.flow_scale);

    let positions = follow_flows(&input, config.niter);

    let consistency = FlowConsistency::from_config(flow, config, estimator, metric);
    let mut labels = extract_instances(
        &positions,
        Some(is_object.as_slice()),
        consistency.as_ref(),
        config,
    )?;
    let extracted = labels.max_label();

    if let Some(min_size) = config.min_size {
        fill_holes(&mut labels, min_size);
    }

    tracing::info!(
        "Found {} masks ({} before hole filling) on {:?}",
        labels.max_label(),
        extracted,
        shape.extents()
    );

    Ok(MaskResult { labels, positions })
}
