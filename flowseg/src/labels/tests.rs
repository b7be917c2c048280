//! Tests for label maps.

use super::*;
use crate::error::FlowError;

#[test]
fn test_new_checks_length() {
    assert!(matches!(
        LabelMap::new(Shape::d2(2, 2), vec![0; 3]),
        Err(FlowError::LengthMismatch { .. })
    ));
}

#[test]
fn test_from_values_rounds_and_clamps() {
    let values = [0.0f32, 1.2, 2.6, -3.0, f32::NAN, 4.0];
    let map = LabelMap::from_values(Shape::d2(2, 3), &values).unwrap();
    assert_eq!(map.labels(), &[0, 1, 3, 0, 0, 4]);
}

#[test]
fn test_counts_and_num_instances() {
    let map = LabelMap::new(Shape::d2(2, 3), vec![0, 2, 2, 0, 5, 0]).unwrap();
    assert_eq!(map.max_label(), 5);
    assert_eq!(map.counts(), vec![3, 0, 2, 0, 0, 1]);
    assert_eq!(map.num_instances(), 2);
    assert!(!map.is_contiguous());
}

#[test]
fn test_renumber_preserves_order() {
    let mut map = LabelMap::new(Shape::d2(2, 3), vec![0, 7, 7, 3, 0, 9]).unwrap();
    let count = map.renumber();
    assert_eq!(count, 3);
    assert_eq!(map.labels(), &[0, 2, 2, 1, 0, 3]);
    assert!(map.is_contiguous());
}

#[test]
fn test_renumber_without_background() {
    let mut map = LabelMap::new(Shape::d2(1, 4), vec![4, 4, 6, 6]).unwrap();
    assert_eq!(map.renumber(), 2);
    assert_eq!(map.labels(), &[1, 1, 2, 2]);
}

#[test]
fn test_renumber_all_background() {
    let mut map = LabelMap::empty(Shape::d2(3, 3));
    assert_eq!(map.renumber(), 0);
    assert!(map.is_contiguous());
    assert_eq!(map.num_instances(), 0);
}

#[test]
fn test_clear_labels() {
    let mut map = LabelMap::new(Shape::d2(1, 5), vec![1, 2, 3, 2, 1]).unwrap();
    map.clear_labels(&[2, 42]);
    assert_eq!(map.labels(), &[1, 0, 3, 0, 1]);
}

#[test]
fn test_plane_of_volume() {
    let shape = Shape::d3(2, 2, 2);
    let map = LabelMap::new(shape, vec![1, 0, 0, 0, 2, 2, 0, 0]).unwrap();
    let second = map.plane(0, 1);
    assert_eq!(second.shape().extents(), &[2, 2]);
    assert_eq!(second.labels(), &[2, 2, 0, 0]);
}
