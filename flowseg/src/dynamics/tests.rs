//! Tests for particle advection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::encode::diffusion_flows;
use crate::error::FlowError;
use crate::metrics::EquivalentDiameter;
use crate::testing;

fn constant_flow(shape: Shape, vector: &[f32]) -> FlowField {
    let channels = vector.iter().map(|&v| vec![v; shape.len()]).collect();
    FlowField::from_channels(shape, channels).unwrap()
}

#[test]
fn test_meshgrid_positions() {
    let particles = ParticleSet::meshgrid(Shape::d3(2, 3, 4));
    assert_eq!(particles.len(), 24);
    assert_eq!(particles.position(0).as_slice(), &[0.0, 0.0, 0.0]);
    assert_eq!(particles.position(23).as_slice(), &[1.0, 2.0, 3.0]);
    assert_eq!(particles.position(13).as_slice(), &[1.0, 0.0, 1.0]);
}

#[test]
fn test_zero_iterations_returns_meshgrid() {
    let flow = constant_flow(Shape::d2(5, 6), &[0.7, -0.3]);
    let particles = follow_flows(&flow, 0);
    assert_eq!(particles, ParticleSet::meshgrid(Shape::d2(5, 6)));
}

#[test]
fn test_constant_flow_moves_and_clamps() {
    // The advector subtracts the flow: -1 along X moves particles right.
    let flow = constant_flow(Shape::d2(1, 10), &[0.0, -1.0]);
    let particles = follow_flows(&flow, 3);
    for x in 0..10 {
        let p = particles.position(x);
        assert_eq!(p[0], 0.0);
        assert_eq!(p[1], (x + 3).min(9) as f32);
    }
}

#[test]
fn test_sampling_truncates_position() {
    // Pixel 0 pushes by half a pixel; pixel 1 has no flow.
    let shape = Shape::d2(1, 4);
    let flow = FlowField::from_channels(
        shape,
        vec![vec![0.0; 4], vec![-0.5, 0.0, 0.0, 0.0]],
    )
    .unwrap();
    let particles = follow_flows(&flow, 5);
    // 0 -> 0.5 (samples pixel 0 again) -> 1.0 (samples pixel 1) -> stays.
    assert_eq!(particles.position(0)[1], 1.0);
    assert_eq!(particles.position(1)[1], 1.0);
}

#[test]
fn test_inactive_pixels_stay() {
    let shape = Shape::d2(3, 3);
    let mut dy = vec![0.0; 9];
    dy[4] = -1.0;
    let flow = FlowField::from_channels(shape, vec![dy, vec![0.0; 9]]).unwrap();
    let particles = follow_flows(&flow, 10);
    assert_eq!(active_pixels(&flow), vec![4]);
    assert_eq!(particles.position(4).as_slice(), &[2.0, 1.0]);
    // Pixel 7 lies on the path but is never advected itself.
    assert_eq!(particles.position(7).as_slice(), &[2.0, 1.0]);
    assert_eq!(particles.position(0).as_slice(), &[0.0, 0.0]);
}

#[test]
fn test_3d_activity_uses_first_axis() {
    let shape = Shape::d3(3, 3, 3);
    let mut dz = vec![0.0; 27];
    dz[0] = 1e-4;
    dz[1] = -0.5;
    let flow = FlowField::from_channels(shape, vec![dz, vec![0.0; 27], vec![-1.0; 27]]).unwrap();
    assert_eq!(active_pixels(&flow), vec![1]);

    let particles = follow_flows(&flow, 2);
    // Pixel 0 has X flow but no Z flow above the threshold.
    assert_eq!(particles.position(0).as_slice(), &[0.0, 0.0, 0.0]);
    // Pixel 1 moves half a pixel along Z, then samples pixel 2, which has no
    // Z flow, while X runs into the clamp.
    assert_eq!(particles.position(1).as_slice(), &[0.5, 0.0, 2.0]);
}

#[test]
fn test_advect_restricted_set() {
    let shape = Shape::d2(4, 4);
    let flow = constant_flow(shape.clone(), &[-1.0, 0.0]);
    let mut particles = ParticleSet::meshgrid(shape);
    advect(&mut particles, &flow, &[0, 5], 2).unwrap();
    assert_eq!(particles.position(0).as_slice(), &[2.0, 0.0]);
    assert_eq!(particles.position(5).as_slice(), &[3.0, 1.0]);
    assert_eq!(particles.position(1).as_slice(), &[0.0, 1.0]);
}

#[test]
fn test_advect_shape_mismatch() {
    let flow = constant_flow(Shape::d2(4, 4), &[1.0, 0.0]);
    let mut particles = ParticleSet::meshgrid(Shape::d2(4, 5));
    assert!(matches!(
        advect(&mut particles, &flow, &[], 1),
        Err(FlowError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_reset_and_from_positions() {
    let shape = Shape::d2(2, 2);
    let p: Position = [1.5, 0.5].into_iter().collect();
    let positions = vec![p; 4];
    let mut particles = ParticleSet::from_positions(shape.clone(), positions).unwrap();
    particles.reset(3);
    assert_eq!(particles.position(3).as_slice(), &[1.0, 1.0]);
    assert_eq!(particles.axis(0), vec![1.5, 1.5, 1.5, 1.0]);
    assert!(ParticleSet::from_positions(shape, vec![]).is_err());
}

#[test]
fn test_from_positions_rejects_invalid_coordinates() {
    let shape = Shape::d2(2, 2);
    let mut positions = ParticleSet::meshgrid(shape.clone()).into_positions();
    positions[2] = [f32::NAN, 0.0].into_iter().collect();
    assert!(matches!(
        ParticleSet::from_positions(shape.clone(), positions),
        Err(FlowError::InvalidPosition { index: 2, ndim: 2, .. })
    ));

    let mut positions = ParticleSet::meshgrid(shape.clone()).into_positions();
    positions[1] = [0.0, 1.0, 0.0].into_iter().collect();
    assert!(matches!(
        ParticleSet::from_positions(shape.clone(), positions),
        Err(FlowError::InvalidPosition { index: 1, .. })
    ));

    // Outside the grid is allowed: extraction bins such positions itself.
    let mut positions = ParticleSet::meshgrid(shape.clone()).into_positions();
    positions[0] = [-5.0, 9.0].into_iter().collect();
    assert!(ParticleSet::from_positions(shape, positions).is_ok());
}

#[test]
fn test_advect_rejects_particles_off_the_grid() {
    let shape = Shape::d2(4, 4);
    let flow = constant_flow(shape.clone(), &[-1.0, 0.0]);
    let mut positions = ParticleSet::meshgrid(shape.clone()).into_positions();
    positions[0] = [3.0, 9.0].into_iter().collect();
    let mut particles = ParticleSet::from_positions(shape, positions).unwrap();
    let before = particles.clone();

    assert!(matches!(
        advect(&mut particles, &flow, &[5, 0], 1),
        Err(FlowError::PositionOutOfGrid { index: 0, .. })
    ));
    assert_eq!(particles, before);

    // The stray particle may stay where it is as long as it is not advected.
    advect(&mut particles, &flow, &[5], 1).unwrap();
    assert_eq!(particles.position(5).as_slice(), &[2.0, 1.0]);
}

#[test]
fn test_advect_rejects_unknown_particle_index() {
    let shape = Shape::d2(3, 3);
    let flow = constant_flow(shape.clone(), &[1.0, 0.0]);
    let mut particles = ParticleSet::meshgrid(shape);
    assert!(matches!(
        advect(&mut particles, &flow, &[0, 9], 2),
        Err(FlowError::ParticleIndex { index: 9, len: 9 })
    ));
    assert_eq!(particles.position(0).as_slice(), &[0.0, 0.0]);
}

#[test]
fn test_encoded_square_converges() {
    let labels = testing::squares(20, 20, &[(7, 7, 6)]);
    let mut flow = diffusion_flows(&labels, &EquivalentDiameter).flow;
    flow.negate();
    let particles = follow_flows(&flow, 200);

    for idx in 0..labels.len() {
        let p = particles.position(idx);
        if labels[idx] > 0 {
            let d = ((p[0] - 9.5).powi(2) + (p[1] - 9.5).powi(2)).sqrt();
            assert!(d < 2.0, "pixel {idx} ended at {p:?}");
        } else {
            assert_eq!(p, &grid_position(labels.shape(), idx));
        }
    }
}

#[test]
fn test_random_flow_is_deterministic() {
    let shape = Shape::d2(24, 24);
    let mut rng = StdRng::seed_from_u64(7);
    let channels = (0..2)
        .map(|_| (0..shape.len()).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect();
    let flow = FlowField::from_channels(shape, channels).unwrap();

    let a = follow_flows(&flow, 50);
    let b = follow_flows(&flow, 50);
    assert_eq!(a, b);
    for p in a.positions() {
        assert!(p.iter().all(|&v| (0.0..=23.0).contains(&v)));
    }
}
