//! Particle dynamics: Euler advection of one particle per pixel along a flow
//! field.
//!
//! Every step samples the flow at the particle's truncated integer position,
//! subtracts it from the position and clamps each axis to the grid. Particles
//! never interact, so each one integrates its whole trajectory inside its own
//! rayon task; the result equals running the steps in lockstep.

#[cfg(test)]
mod tests;

use arrayvec::ArrayVec;
use rayon::prelude::*;

use crate::error::{FlowError, Result};
use crate::flow::FlowField;
use crate::grid::{Shape, MAX_DIMS};

/// Real-valued particle position, one entry per axis.
pub type Position = ArrayVec<f32, MAX_DIMS>;

/// In 3D a pixel is advected only when its flow along the first axis exceeds
/// this magnitude.
pub const ACTIVE_THRESHOLD_3D: f32 = 1e-3;

/// One particle per grid pixel, index-aligned with the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    shape: Shape,
    positions: Vec<Position>,
}

impl ParticleSet {
    /// Every particle at its own pixel's integer coordinates.
    pub fn meshgrid(shape: Shape) -> Self {
        let positions = (0..shape.len()).map(|i| grid_position(&shape, i)).collect();
        Self { shape, positions }
    }

    /// Wraps externally produced positions.
    ///
    /// Every position needs one finite coordinate per axis. Coordinates may
    /// lie outside the grid; [`advect`] rejects such particles if asked to
    /// move them.
    pub fn from_positions(shape: Shape, positions: Vec<Position>) -> Result<Self> {
        shape.ensure_len("particle positions", positions.len())?;
        for (index, p) in positions.iter().enumerate() {
            if p.len() != shape.ndim() || !p.iter().all(|v| v.is_finite()) {
                return Err(FlowError::InvalidPosition {
                    index,
                    position: p.to_vec(),
                    ndim: shape.ndim(),
                });
            }
        }
        Ok(Self { shape, positions })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    #[inline]
    pub fn position(&self, idx: usize) -> &Position {
        &self.positions[idx]
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }

    /// Moves particle `idx` back to its own pixel.
    pub fn reset(&mut self, idx: usize) {
        self.positions[idx] = grid_position(&self.shape, idx);
    }

    /// Positions along one axis, in pixel order.
    pub fn axis(&self, axis: usize) -> Vec<f32> {
        self.positions.iter().map(|p| p[axis]).collect()
    }
}

fn grid_position(shape: &Shape, idx: usize) -> Position {
    shape.coords(idx).iter().map(|&c| c as f32).collect()
}

/// Pixels that take part in advection.
///
/// In 2D a pixel is active when either flow component is nonzero. In 3D only
/// the first axis is inspected and must exceed [`ACTIVE_THRESHOLD_3D`] in
/// magnitude.
pub fn active_pixels(flow: &FlowField) -> Vec<usize> {
    if flow.ndim() == 2 {
        let (dy, dx) = (flow.channel(0), flow.channel(1));
        (0..flow.shape().len())
            .filter(|&i| dy[i] != 0.0 || dx[i] != 0.0)
            .collect()
    } else {
        let dz = flow.channel(0);
        (0..flow.shape().len())
            .filter(|&i| dz[i].abs() > ACTIVE_THRESHOLD_3D)
            .collect()
    }
}

/// Advects a full meshgrid of particles along `flow` for `niter` steps.
///
/// Inactive pixels keep their grid coordinates. With `niter == 0` the
/// meshgrid is returned unchanged.
pub fn follow_flows(flow: &FlowField, niter: usize) -> ParticleSet {
    let mut particles = ParticleSet::meshgrid(flow.shape().clone());
    if niter == 0 {
        return particles;
    }
    let active = active_pixels(flow);
    run_trajectories(&mut particles, flow, &active, niter);
    particles
}

/// Advects the particles listed in `active` for `niter` steps; the others do
/// not move.
///
/// Every listed particle must exist and start inside the grid.
pub fn advect(
    particles: &mut ParticleSet,
    flow: &FlowField,
    active: &[usize],
    niter: usize,
) -> Result<()> {
    particles.shape.ensure_same(flow.shape())?;
    for &index in active {
        let position = particles
            .positions
            .get(index)
            .ok_or(FlowError::ParticleIndex {
                index,
                len: particles.len(),
            })?;
        let inside = position
            .iter()
            .zip(particles.shape.extents())
            .all(|(&v, &extent)| v >= 0.0 && v <= (extent - 1) as f32);
        if !inside {
            return Err(FlowError::PositionOutOfGrid {
                index,
                position: position.to_vec(),
                extents: particles.shape.extents().to_vec(),
            });
        }
    }
    run_trajectories(particles, flow, active, niter);
    Ok(())
}

fn run_trajectories(particles: &mut ParticleSet, flow: &FlowField, active: &[usize], niter: usize) {
    tracing::debug!(
        "Advecting {} of {} particles for {} steps",
        active.len(),
        particles.len(),
        niter
    );

    let shape = flow.shape();
    let positions = &particles.positions;
    let finals: Vec<Position> = active
        .par_iter()
        .map(|&idx| {
            let mut p = positions[idx].clone();
            for _ in 0..niter {
                step(&mut p, flow, shape);
            }
            p
        })
        .collect();

    for (&idx, p) in active.iter().zip(finals) {
        particles.positions[idx] = p;
    }
}

/// One Euler step with nearest-lower-pixel sampling and clamping.
#[inline]
fn step(p: &mut Position, flow: &FlowField, shape: &Shape) {
    let idx = p
        .iter()
        .zip(shape.extents())
        .fold(0, |acc, (&v, &extent)| acc * extent + v as usize);
    for (axis, v) in p.iter_mut().enumerate() {
        let upper = (shape.extent(axis) - 1) as f32;
        *v = (*v - flow.channel(axis)[idx]).clamp(0.0, upper);
    }
}
