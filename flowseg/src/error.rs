use std::path::PathBuf;

use thiserror::Error;

use crate::encode::FlowMethod;

/// Errors produced by flow encoding, decoding and configuration loading.
///
/// Degenerate instances (empty or one pixel wide) are not errors; they are
/// skipped and contribute nothing to the flow field.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{method} flows are not implemented for {ndim}D input")]
    UnsupportedDimension { method: FlowMethod, ndim: usize },

    #[error("expected a 2D or 3D grid, got {ndim} axes")]
    InvalidShape { ndim: usize },

    #[error("{what} has {actual} elements, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("grid shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("particle {index} has an invalid position {position:?} for a {ndim}D grid")]
    InvalidPosition {
        index: usize,
        position: Vec<f32>,
        ndim: usize,
    },

    #[error("particle {index} at {position:?} lies outside the grid {extents:?}")]
    PositionOutOfGrid {
        index: usize,
        position: Vec<f32>,
        extents: Vec<usize>,
    },

    #[error("particle index {index} out of range for {len} particles")]
    ParticleIndex { index: usize, len: usize },

    #[error(
        "stacked array has {channels} channels; a {ndim}D grid needs 1 (labels), {} or {} (precomputed flows)",
        .ndim + 1,
        .ndim + 2
    )]
    ChannelCount { channels: usize, ndim: usize },

    #[error("Failed to read config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    ConfigExtension {
        path: PathBuf,
        source: common::FileExtensionError,
    },

    #[error("Failed to parse config: {0}")]
    ConfigFormat(#[from] common::SerdeFormatError),
}

pub type Result<T> = std::result::Result<T, FlowError>;
