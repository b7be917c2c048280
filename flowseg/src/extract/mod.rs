//! Instance extraction from converged particles.
//!
//! Particles of one instance pile up in a few histogram bins near its center.
//! [`extract_instances`] seeds an instance at every sufficiently full local
//! maximum of the position histogram, grows each seed over well populated
//! neighboring bins and labels every pixel by the footprint its particle
//! landed in. [`fill_holes`] is a separate post-pass over the label map.

mod fill_holes;
mod instances;


pub use fill_holes::fill_holes;
pub use instances::{discard_inconsistent_instances, extract_instances, FlowConsistency};
