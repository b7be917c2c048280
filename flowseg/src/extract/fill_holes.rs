//! Hole filling and small fragment removal.

use crate::grid::{face_offsets, Offset, Shape};
use crate::labels::LabelMap;

/// Fills background enclosed by each instance with its label, then zeroes
/// face-connected fragments of the filled instance smaller than `min_size`.
/// Pixels of other instances are never relabeled.
///
/// Instances are processed in label order over the bounding boxes they had
/// on entry. The map is renumbered afterwards; returns the instance count.
pub fn fill_holes(labels: &mut LabelMap, min_size: usize) -> usize {
    let shape = labels.shape().clone();
    let offsets = face_offsets(shape.ndim());
    let boxes = labels.find_objects();

    let mut filled_holes = 0;
    let mut removed = 0;
    for (k, bbox) in boxes.iter().enumerate() {
        let Some(bbox) = bbox else {
            continue;
        };
        let label = k as u32 + 1;
        let local = bbox.shape();
        let indices: Vec<usize> = bbox.indices(&shape).collect();

        let current: Vec<u32> = indices.iter().map(|&i| labels[i]).collect();
        let mut mask: Vec<bool> = current.iter().map(|&l| l == label).collect();
        let before = mask.iter().filter(|&&m| m).count();
        fill_enclosed(&mut mask, &local, &offsets);
        // Other instances enclosed by this one keep their pixels.
        for (m, &l) in mask.iter_mut().zip(&current) {
            *m &= l == 0 || l == label;
        }
        filled_holes += mask.iter().filter(|&&m| m).count() - before;

        let small = small_components(&mask, &local, &offsets, min_size);
        let cells = labels.labels_mut();
        for (j, &idx) in indices.iter().enumerate() {
            if small[j] {
                cells[idx] = 0;
                removed += 1;
            } else if mask[j] {
                cells[idx] = label;
            }
        }
    }

    let count = labels.renumber();
    tracing::debug!(
        "Filled {} hole pixels, removed {} small fragment pixels, {} instances left",
        filled_holes,
        removed,
        count
    );
    count
}

/// Sets every unmasked pixel not face-connected to the box border.
fn fill_enclosed(mask: &mut [bool], shape: &Shape, offsets: &[Offset]) {
    let mut outside = vec![false; mask.len()];
    let mut stack: Vec<usize> = (0..mask.len())
        .filter(|&i| !mask[i] && on_border(shape, i))
        .collect();
    for &i in &stack {
        outside[i] = true;
    }

    while let Some(i) = stack.pop() {
        let coords = shape.coords(i);
        for offset in offsets {
            if let Some(n) = shape.offset_index(&coords, offset) {
                if !mask[n] && !outside[n] {
                    outside[n] = true;
                    stack.push(n);
                }
            }
        }
    }

    for (m, &out) in mask.iter_mut().zip(&outside) {
        *m = !out;
    }
}

fn on_border(shape: &Shape, idx: usize) -> bool {
    shape
        .coords(idx)
        .iter()
        .zip(shape.extents())
        .any(|(&c, &extent)| c == 0 || c + 1 == extent)
}

/// Pixels of face-connected mask components with fewer than `min_size` pixels.
fn small_components(mask: &[bool], shape: &Shape, offsets: &[Offset], min_size: usize) -> Vec<bool> {
    let mut small = vec![false; mask.len()];
    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut component = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        component.clear();

        while let Some(i) = stack.pop() {
            component.push(i);
            let coords = shape.coords(i);
            for offset in offsets {
                if let Some(n) = shape.offset_index(&coords, offset) {
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if component.len() < min_size {
            for &i in &component {
                small[i] = true;
            }
        }
    }
    small
}
