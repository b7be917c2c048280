//! Histogram peak seeding and region growth over converged particle positions.

use std::cmp::Reverse;

use hashbrown::HashSet;
use rayon::prelude::*;

use crate::config::Config;
use crate::dynamics::ParticleSet;
use crate::encode::{encode_flows, FlowMethod};
use crate::error::Result;
use crate::flow::FlowField;
use crate::grid::{window_offsets, Coords, Shape};
use crate::labels::LabelMap;
use crate::metrics::{DiameterEstimator, FlowErrorMetric};

/// Inputs of the flow-consistency check: the predicted flow field and how to
/// re-derive and score flows from candidate masks.
#[derive(Clone, Copy)]
pub struct FlowConsistency<'a> {
    /// Flow field the particles were advected along, before negation.
    pub flow: &'a FlowField,
    /// Instances whose error exceeds this are discarded.
    pub threshold: f32,
    pub method: FlowMethod,
    pub estimator: &'a dyn DiameterEstimator,
    pub metric: &'a dyn FlowErrorMetric,
}

impl<'a> FlowConsistency<'a> {
    /// The check configured by `config`, or `None` when its flow threshold
    /// disables it.
    pub fn from_config(
        flow: &'a FlowField,
        config: &Config,
        estimator: &'a dyn DiameterEstimator,
        metric: &'a dyn FlowErrorMetric,
    ) -> Option<Self> {
        let threshold = config.active_flow_threshold()?;
        Some(Self {
            flow,
            threshold,
            method: config.method,
            estimator,
            metric,
        })
    }
}

impl std::fmt::Debug for FlowConsistency<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowConsistency")
            .field("shape", &self.flow.shape().extents())
            .field("threshold", &self.threshold)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Labels every pixel by the histogram peak its particle converged to.
///
/// When `is_object` is given, particles of non-object pixels are treated as
/// if they never moved. Regions larger than `config.max_area_fraction` of the
/// grid are dropped and the result is renumbered to `1..=K`. With
/// `consistency`, instances whose re-derived flow disagrees with the
/// predicted one are dropped as well.
pub fn extract_instances(
    particles: &ParticleSet,
    is_object: Option<&[bool]>,
    consistency: Option<&FlowConsistency<'_>>,
    config: &Config,
) -> Result<LabelMap> {
    config.validate();
    let shape = particles.shape().clone();
    if let Some(mask) = is_object {
        shape.ensure_len("object mask", mask.len())?;
    }

    let hist_shape = shape.padded(config.histogram_padding);
    let bins: Vec<Option<usize>> = (0..shape.len())
        .map(|idx| {
            let moved = is_object.map_or(true, |mask| mask[idx]);
            if moved {
                histogram_bin(&hist_shape, particles.position(idx), config.histogram_padding)
            } else {
                let coords: Coords = shape
                    .coords(idx)
                    .iter()
                    .map(|&c| c + config.histogram_padding)
                    .collect();
                Some(hist_shape.flat_index(&coords))
            }
        })
        .collect();

    let mut hist = vec![0u32; hist_shape.len()];
    for &bin in bins.iter().flatten() {
        hist[bin] += 1;
    }

    let seeds = find_seeds(&hist, &hist_shape, config);
    let footprints: Vec<Vec<usize>> = seeds
        .par_iter()
        .map(|&seed| grow_seed(seed, &hist, &hist_shape, config))
        .collect();

    // Later seeds overwrite earlier ones where footprints overlap.
    let mut hist_labels = vec![0u32; hist_shape.len()];
    for (k, footprint) in footprints.iter().enumerate() {
        for &bin in footprint {
            hist_labels[bin] = k as u32 + 1;
        }
    }

    let labels = bins.iter().map(|bin| bin.map_or(0, |b| hist_labels[b])).collect();
    let mut labels = LabelMap::new(shape.clone(), labels)?;

    let max_area = config.max_area_fraction as f64 * shape.len() as f64;
    let oversized: Vec<u32> = labels
        .counts()
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &count)| count as f64 > max_area)
        .map(|(label, _)| label as u32)
        .collect();
    if !oversized.is_empty() {
        tracing::debug!("Dropping {} oversized regions", oversized.len());
        labels.clear_labels(&oversized);
    }
    let count = labels.renumber();

    tracing::debug!(
        "Extracted {} instances from {} seeds on {:?}",
        count,
        seeds.len(),
        shape.extents()
    );

    if let Some(consistency) = consistency {
        discard_inconsistent_instances(&mut labels, consistency)?;
    }
    Ok(labels)
}

/// Drops instances whose flows, re-derived from `labels`, disagree with the
/// predicted flow by more than the threshold, then renumbers.
///
/// Returns the number of instances dropped.
pub fn discard_inconsistent_instances(
    labels: &mut LabelMap,
    consistency: &FlowConsistency<'_>,
) -> Result<usize> {
    labels.shape().ensure_same(consistency.flow.shape())?;
    if labels.max_label() == 0 {
        return Ok(0);
    }

    let derived = encode_flows(labels, consistency.method, consistency.estimator)?.flow;
    let errors = consistency
        .metric
        .flow_error(labels, &derived, consistency.flow);
    let bad: Vec<u32> = errors
        .iter()
        .enumerate()
        .filter(|&(_, &error)| error > consistency.threshold)
        .map(|(k, _)| k as u32 + 1)
        .collect();

    if !bad.is_empty() {
        tracing::debug!(
            "Dropping {} instances with flow error above {}",
            bad.len(),
            consistency.threshold
        );
        labels.clear_labels(&bad);
    }
    labels.renumber();
    Ok(bad.len())
}

// ============================================================================
// Histogram
// ============================================================================

/// Histogram bin of a position: its truncated coordinates shifted by the
/// padding. `None` when it falls outside the padded histogram.
fn histogram_bin(hist_shape: &Shape, position: &[f32], padding: usize) -> Option<usize> {
    let mut idx = 0;
    for (&v, &extent) in position.iter().zip(hist_shape.extents()) {
        let bin = v.trunc() as isize + padding as isize;
        if bin < 0 || bin >= extent as isize {
            return None;
        }
        idx = idx * extent + bin as usize;
    }
    Some(idx)
}

/// Separable maximum filter with a window of `2 * radius + 1` bins per axis,
/// clipped at the borders.
fn maximum_filter(hist: &[u32], shape: &Shape, radius: usize) -> Vec<u32> {
    let strides = shape.strides();
    let mut current = hist.to_vec();
    for axis in 0..shape.ndim() {
        let extent = shape.extent(axis);
        let stride = strides[axis];
        current = (0..current.len())
            .into_par_iter()
            .map(|idx| {
                let c = (idx / stride) % extent;
                let lo = c.saturating_sub(radius);
                let hi = (c + radius).min(extent - 1);
                let base = idx - c * stride;
                (lo..=hi)
                    .map(|i| current[base + i * stride])
                    .max()
                    .unwrap_or(0)
            })
            .collect();
    }
    current
}

/// Bins that are local maxima of the histogram with more than
/// `min_seed_count` particles, by descending count. Equal counts keep their
/// row-major order.
fn find_seeds(hist: &[u32], shape: &Shape, config: &Config) -> Vec<usize> {
    let hmax = maximum_filter(hist, shape, config.peak_window / 2);
    let mut seeds: Vec<usize> = (0..hist.len())
        .filter(|&i| hist[i] == hmax[i] && hist[i] > config.min_seed_count)
        .collect();
    seeds.sort_by_key(|&s| Reverse(hist[s]));
    seeds
}

/// Grows one seed by `growth_rounds` window expansions, keeping only bins with
/// more than `min_grow_count` particles.
fn grow_seed(seed: usize, hist: &[u32], shape: &Shape, config: &Config) -> Vec<usize> {
    let window = window_offsets(shape.ndim());
    let mut footprint = vec![seed];
    for _ in 0..config.growth_rounds {
        let mut grown = HashSet::with_capacity(footprint.len() * window.len());
        for &bin in &footprint {
            let coords = shape.coords(bin);
            for offset in &window {
                if let Some(neighbor) = shape.offset_index(&coords, offset) {
                    if hist[neighbor] > config.min_grow_count {
                        grown.insert(neighbor);
                    }
                }
            }
        }
        footprint = grown.into_iter().collect();
    }
    footprint
}
