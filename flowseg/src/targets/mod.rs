//! Training targets from label maps.
//!
//! [`FlowFieldBuilder`] turns a batch of per-image label inputs into
//! [`TrainingTarget`]s. Plain label maps are encoded with the configured
//! [`FlowMethod`]; stacked arrays that already carry flows are passed through.


use common::parallel::{default_max_in_flight, try_par_map_limited};

use crate::encode::{encode_flows, FlowMethod};
use crate::error::{FlowError, Result};
use crate::flow::{ChannelStack, FlowField, TrainingTarget};
use crate::labels::LabelMap;
use crate::metrics::{DiameterEstimator, EquivalentDiameter};

/// Per-image input of the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelInput {
    Labels(LabelMap),
    /// Multi-channel array: a single label channel, `[probability, flow..]`,
    /// or `[labels, probability, flow..]`.
    Stacked(ChannelStack),
}

/// How a stacked array is interpreted, decided from its channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackLayout {
    Labels,
    Precomputed { skip: usize },
}

fn stack_layout(stack: &ChannelStack) -> Result<StackLayout> {
    let ndim = stack.shape().ndim();
    match stack.num_channels() {
        1 => Ok(StackLayout::Labels),
        n if n == ndim + 1 => Ok(StackLayout::Precomputed { skip: 0 }),
        n if n == ndim + 2 => Ok(StackLayout::Precomputed { skip: 1 }),
        channels => Err(FlowError::ChannelCount { channels, ndim }),
    }
}

impl LabelInput {
    fn needs_encoding(&self) -> Result<bool> {
        match self {
            LabelInput::Labels(_) => Ok(true),
            LabelInput::Stacked(stack) => Ok(stack_layout(stack)? == StackLayout::Labels),
        }
    }
}

/// Builds training targets for batches of images.
#[derive(Debug, Clone)]
pub struct FlowFieldBuilder<E: DiameterEstimator = EquivalentDiameter> {
    method: FlowMethod,
    estimator: E,
    max_in_flight: usize,
}

impl FlowFieldBuilder {
    pub fn new(method: FlowMethod) -> Self {
        Self::with_estimator(method, EquivalentDiameter)
    }
}

impl Default for FlowFieldBuilder {
    fn default() -> Self {
        Self::new(FlowMethod::default())
    }
}

impl<E: DiameterEstimator> FlowFieldBuilder<E> {
    pub fn with_estimator(method: FlowMethod, estimator: E) -> Self {
        Self {
            method,
            estimator,
            max_in_flight: default_max_in_flight(),
        }
    }

    /// Caps the number of images encoded at once.
    ///
    /// # Panics
    /// Panics if `max_in_flight` is 0.
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be > 0");
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn method(&self) -> FlowMethod {
        self.method
    }

    /// One target per input, in input order.
    ///
    /// Fails on the first input whose stacked channel count fits no known
    /// layout, or on geodesic encoding of a 3D label map.
    pub fn build(&self, inputs: &[LabelInput]) -> Result<Vec<TrainingTarget>> {
        let mut to_encode = 0;
        for input in inputs {
            if input.needs_encoding()? {
                to_encode += 1;
            }
        }
        if to_encode > 0 {
            tracing::info!(
                "Computing {} flows for {} of {} label maps",
                self.method,
                to_encode,
                inputs.len()
            );
        }
        if to_encode < inputs.len() {
            tracing::info!("Flows precomputed for {} images", inputs.len() - to_encode);
        }

        try_par_map_limited(inputs, self.max_in_flight, |input| self.build_one(input))
    }

    /// Convenience for batches of plain label maps.
    pub fn build_from_labels(&self, labels: &[LabelMap]) -> Result<Vec<TrainingTarget>> {
        tracing::info!("Computing {} flows for {} label maps", self.method, labels.len());
        try_par_map_limited(labels, self.max_in_flight, |labels| self.encode(labels))
    }

    pub fn build_one(&self, input: &LabelInput) -> Result<TrainingTarget> {
        match input {
            LabelInput::Labels(labels) => self.encode(labels),
            LabelInput::Stacked(stack) => match stack_layout(stack)? {
                StackLayout::Labels => {
                    let labels = LabelMap::from_values(stack.shape().clone(), stack.channel(0))?;
                    self.encode(&labels)
                }
                StackLayout::Precomputed { skip } => passthrough(stack, skip),
            },
        }
    }

    fn encode(&self, labels: &LabelMap) -> Result<TrainingTarget> {
        let encoded = encode_flows(labels, self.method, &self.estimator)?;
        let probability = labels
            .labels()
            .iter()
            .map(|&l| if l > 0 { 1.0 } else { 0.0 })
            .collect();
        tracing::debug!(
            "Encoded {} instances on {:?}",
            labels.num_instances(),
            labels.shape().extents()
        );

        Ok(TrainingTarget {
            probability,
            flow: encoded.flow,
            diameter: match self.method {
                FlowMethod::Geodesic => encoded.diameter,
                FlowMethod::Diffusion => None,
            },
        })
    }
}

fn passthrough(stack: &ChannelStack, skip: usize) -> Result<TrainingTarget> {
    let probability = stack.channel(skip).to_vec();
    let flow_channels = (skip + 1..stack.num_channels())
        .map(|c| stack.channel(c).to_vec())
        .collect();
    Ok(TrainingTarget {
        probability,
        flow: FlowField::from_channels(stack.shape().clone(), flow_channels)?,
        diameter: None,
    })
}
