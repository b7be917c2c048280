//! Flow fields and training targets.

#[cfg(test)]
mod tests;

use arrayvec::ArrayVec;

use crate::error::{FlowError, Result};
use crate::grid::{Shape, MAX_DIMS};

/// Floor added to vector magnitudes before normalizing, so background pixels
/// with zero flow stay zero instead of dividing by zero.
pub const NORM_EPSILON: f64 = 1e-20;

/// One real-valued channel per grid axis; channel `a` is the flow component
/// along axis `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    shape: Shape,
    channels: ArrayVec<Vec<f32>, MAX_DIMS>,
}

impl FlowField {
    pub fn zeros(shape: Shape) -> Self {
        let channels = (0..shape.ndim()).map(|_| vec![0.0; shape.len()]).collect();
        Self { shape, channels }
    }

    pub fn from_channels(shape: Shape, channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.len() != shape.ndim() {
            return Err(FlowError::LengthMismatch {
                what: "flow channels",
                expected: shape.ndim(),
                actual: channels.len(),
            });
        }
        for channel in &channels {
            shape.ensure_len("flow channel", channel.len())?;
        }
        Ok(Self {
            shape,
            channels: channels.into_iter().collect(),
        })
    }

    /// Wraps channels already known to match `shape`.
    pub(crate) fn from_parts(shape: Shape, channels: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(channels.len(), shape.ndim());
        debug_assert!(channels.iter().all(|c| c.len() == shape.len()));
        Self {
            shape,
            channels: channels.into_iter().collect(),
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel(&self, axis: usize) -> &[f32] {
        &self.channels[axis]
    }

    #[inline]
    pub fn channel_mut(&mut self, axis: usize) -> &mut [f32] {
        &mut self.channels[axis]
    }

    #[inline]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels.into_iter().collect()
    }

    /// Flow vector at a flat pixel index.
    #[inline]
    pub fn vector(&self, idx: usize) -> ArrayVec<f32, MAX_DIMS> {
        self.channels.iter().map(|c| c[idx]).collect()
    }

    #[inline]
    pub fn magnitude(&self, idx: usize) -> f32 {
        self.channels
            .iter()
            .map(|c| c[idx] * c[idx])
            .sum::<f32>()
            .sqrt()
    }

    /// Rescales every vector to unit length as `v / (NORM_EPSILON + |v|)`.
    pub fn normalize(&mut self) {
        for idx in 0..self.shape.len() {
            let norm = self
                .channels
                .iter()
                .map(|c| (c[idx] as f64).powi(2))
                .sum::<f64>()
                .sqrt();
            let denom = NORM_EPSILON + norm;
            for channel in &mut self.channels {
                channel[idx] = (channel[idx] as f64 / denom) as f32;
            }
        }
    }

    /// Multiplies every component by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for channel in &mut self.channels {
            for v in channel.iter_mut() {
                *v *= factor;
            }
        }
    }

    /// Flips every vector.
    pub fn negate(&mut self) {
        self.scale(-1.0);
    }

    /// Zeroes the flow wherever `keep` is false.
    pub fn gate(&mut self, keep: &[bool]) -> Result<()> {
        self.shape.ensure_len("flow gate", keep.len())?;
        for channel in &mut self.channels {
            for (v, &k) in channel.iter_mut().zip(keep) {
                if !k {
                    *v = 0.0;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Training targets
// ============================================================================

/// Supervision for one image: an object-probability channel followed by the
/// flow channels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTarget {
    pub probability: Vec<f32>,
    pub flow: FlowField,
    /// Characteristic instance diameter, reported by the geodesic encoder.
    pub diameter: Option<f32>,
}

impl TrainingTarget {
    pub fn shape(&self) -> &Shape {
        self.flow.shape()
    }

    /// Channel-major `(1 + C, *grid)` layout.
    pub fn to_channels(&self) -> Vec<Vec<f32>> {
        let mut channels = Vec::with_capacity(1 + self.flow.ndim());
        channels.push(self.probability.clone());
        channels.extend(self.flow.channels().iter().cloned());
        channels
    }
}

/// A generic multi-channel f32 array over a grid, as stored alongside images:
/// either a single label channel or precomputed `[label?, probability, flow..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStack {
    shape: Shape,
    channels: Vec<Vec<f32>>,
}

impl ChannelStack {
    pub fn new(shape: Shape, channels: Vec<Vec<f32>>) -> Result<Self> {
        for channel in &channels {
            shape.ensure_len("stacked channel", channel.len())?;
        }
        Ok(Self { shape, channels })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel(&self, idx: usize) -> &[f32] {
        &self.channels[idx]
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
