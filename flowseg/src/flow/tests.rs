//! Tests for flow fields.

use super::*;

#[test]
fn test_from_channels_validates() {
    let shape = Shape::d2(2, 2);
    assert!(matches!(
        FlowField::from_channels(shape.clone(), vec![vec![0.0; 4]]),
        Err(FlowError::LengthMismatch {
            what: "flow channels",
            ..
        })
    ));
    assert!(matches!(
        FlowField::from_channels(shape, vec![vec![0.0; 4], vec![0.0; 3]]),
        Err(FlowError::LengthMismatch {
            what: "flow channel",
            ..
        })
    ));
}

#[test]
fn test_normalize_unit_length_and_zero_floor() {
    let shape = Shape::d2(1, 3);
    let mut flow = FlowField::from_channels(
        shape,
        vec![vec![3.0, 0.0, 1e-3], vec![4.0, 0.0, -1e-3]],
    )
    .unwrap();
    flow.normalize();

    assert!((flow.magnitude(0) - 1.0).abs() < 1e-6);
    assert!((flow.channel(0)[0] - 0.6).abs() < 1e-6);
    assert!((flow.channel(1)[0] - 0.8).abs() < 1e-6);
    assert_eq!(flow.vector(1).as_slice(), &[0.0, 0.0]);
    assert!((flow.magnitude(2) - 1.0).abs() < 1e-5);
}

#[test]
fn test_gate_and_scale() {
    let shape = Shape::d2(1, 2);
    let mut flow =
        FlowField::from_channels(shape, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]).unwrap();
    flow.gate(&[true, false]).unwrap();
    flow.scale(-0.5);
    assert_eq!(flow.channel(0), &[-0.5, 0.0]);
    assert_eq!(flow.channel(1), &[0.5, 0.0]);
    assert!(flow.gate(&[true]).is_err());
}

#[test]
fn test_training_target_layout() {
    let shape = Shape::d2(1, 2);
    let flow = FlowField::from_channels(shape, vec![vec![0.1, 0.2], vec![0.3, 0.4]]).unwrap();
    let target = TrainingTarget {
        probability: vec![1.0, 0.0],
        flow,
        diameter: None,
    };
    let channels = target.to_channels();
    assert_eq!(channels.len(), 3);
    assert_eq!(channels[0], vec![1.0, 0.0]);
    assert_eq!(channels[2], vec![0.3, 0.4]);
}

#[test]
fn test_channel_stack_validates_lengths() {
    assert!(ChannelStack::new(Shape::d2(2, 2), vec![vec![0.0; 4], vec![0.0; 2]]).is_err());
    let stack = ChannelStack::new(Shape::d2(2, 2), vec![vec![0.0; 4]; 3]).unwrap();
    assert_eq!(stack.num_channels(), 3);
}
