//! Geodesic distance transform encoder.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;

use super::{nearest_pixel, normalize_pair, EncodedFlow, FlowMethod};
use crate::error::{FlowError, Result};
use crate::flow::FlowField;
use crate::grid::BoundingBox;
use crate::labels::LabelMap;
use crate::metrics::DiameterEstimator;

/// Gradient of one instance, in global flat indices.
struct InstanceFlow {
    pixels: Vec<usize>,
    dy: Vec<f64>,
    dx: Vec<f64>,
}

/// Local view of one instance inside its bounding box.
struct BoxMask {
    height: usize,
    width: usize,
    inside: Vec<bool>,
}

impl BoxMask {
    #[inline]
    fn contains(&self, y: isize, x: isize) -> bool {
        y >= 0
            && x >= 0
            && (y as usize) < self.height
            && (x as usize) < self.width
            && self.inside[y as usize * self.width + x as usize]
    }
}

/// Encodes every instance of a 2D label map as the negated gradient of its
/// geodesic distance to the instance center.
///
/// Instances one pixel wide along either axis are skipped. Returns
/// [`FlowError::UnsupportedDimension`] for 3D input.
pub fn geodesic_flows(labels: &LabelMap, estimator: &dyn DiameterEstimator) -> Result<EncodedFlow> {
    let shape = labels.shape().clone();
    if shape.ndim() != 2 {
        return Err(FlowError::UnsupportedDimension {
            method: FlowMethod::Geodesic,
            ndim: shape.ndim(),
        });
    }

    let diameter = estimator.diameter(labels);
    let boxes = labels.find_objects();
    let instances: Vec<InstanceFlow> = boxes
        .par_iter()
        .enumerate()
        .filter_map(|(i, bbox)| {
            let bbox = bbox.as_ref()?;
            geodesic_instance(labels, bbox, i as u32 + 1)
        })
        .collect();

    let mut dy = vec![0.0f64; shape.len()];
    let mut dx = vec![0.0f64; shape.len()];
    for instance in &instances {
        for (k, &idx) in instance.pixels.iter().enumerate() {
            dy[idx] = instance.dy[k];
            dx[idx] = instance.dx[k];
        }
    }
    normalize_pair(&mut dy, &mut dx);

    let channels = vec![
        dy.into_iter().map(|v| v as f32).collect(),
        dx.into_iter().map(|v| v as f32).collect(),
    ];
    Ok(EncodedFlow {
        flow: FlowField::from_parts(shape, channels),
        center_weight: None,
        diameter: Some(diameter),
    })
}

fn geodesic_instance(labels: &LabelMap, bbox: &BoundingBox, label: u32) -> Option<InstanceFlow> {
    let width = labels.shape().extent(1);
    let (y0, x0) = (bbox.start[0], bbox.start[1]);
    let (height, box_w) = (bbox.end[0] - y0, bbox.end[1] - x0);

    let mut inside = vec![false; height * box_w];
    let mut ys = Vec::new();
    let mut xs = Vec::new();
    for y in 0..height {
        for x in 0..box_w {
            if labels[(y0 + y) * width + x0 + x] == label {
                inside[y * box_w + x] = true;
                ys.push(y);
                xs.push(x);
            }
        }
    }

    // The bounding box spans every occupied row and column, so a one pixel
    // wide instance has a box one pixel wide.
    if height < 2 || box_w < 2 {
        tracing::debug!("Skipping one pixel wide instance {}", label);
        return None;
    }

    let n = ys.len() as f64;
    let cy = ys.iter().sum::<usize>() as f64 / n;
    let cx = xs.iter().sum::<usize>() as f64 / n;
    let center = nearest_pixel(&ys, &xs, cy, cx);

    let mut mask = BoxMask {
        height,
        width: box_w,
        inside,
    };
    let distance = fast_marching(&mask, ys[center] * box_w + xs[center]);

    // Pixels the front never reached (other components of the same label)
    // carry no gradient.
    for (inside, d) in mask.inside.iter_mut().zip(&distance) {
        *inside &= d.is_finite();
    }

    let (grad_y, grad_x) = masked_gradient(&mask, &distance);
    let smooth_y = masked_mean_3x3(&mask, &grad_y);
    let smooth_x = masked_mean_3x3(&mask, &grad_x);

    let mut pixels = Vec::with_capacity(ys.len());
    let mut dy = Vec::with_capacity(ys.len());
    let mut dx = Vec::with_capacity(ys.len());
    for (&y, &x) in ys.iter().zip(&xs) {
        let local = y * box_w + x;
        pixels.push((y0 + y) * width + x0 + x);
        dy.push(-smooth_y[local]);
        dx.push(-smooth_x[local]);
    }

    Some(InstanceFlow { pixels, dy, dx })
}

// ============================================================================
// Fast marching
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Trial {
    dist: f64,
    idx: usize,
}

impl PartialEq for Trial {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Trial {}

// Reversed so the max-heap pops the smallest distance first.
impl Ord for Trial {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for Trial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// First-order fast marching solution of `|grad T| = 1` inside the mask with
/// `T = 0` at `source`. Unreached and outside pixels are infinite.
fn fast_marching(mask: &BoxMask, source: usize) -> Vec<f64> {
    let (height, width) = (mask.height, mask.width);
    let mut dist = vec![f64::INFINITY; height * width];
    let mut frozen = vec![false; height * width];
    let mut heap = BinaryHeap::new();

    dist[source] = 0.0;
    heap.push(Trial {
        dist: 0.0,
        idx: source,
    });

    let frozen_value = |frozen: &[bool], dist: &[f64], y: isize, x: isize| -> f64 {
        if mask.contains(y, x) && frozen[y as usize * width + x as usize] {
            dist[y as usize * width + x as usize]
        } else {
            f64::INFINITY
        }
    };

    while let Some(Trial { dist: d, idx }) = heap.pop() {
        if frozen[idx] || d > dist[idx] {
            continue;
        }
        frozen[idx] = true;

        let (y, x) = ((idx / width) as isize, (idx % width) as isize);
        for (ny, nx) in [(y - 1, x), (y + 1, x), (y, x - 1), (y, x + 1)] {
            if !mask.contains(ny, nx) {
                continue;
            }
            let nidx = ny as usize * width + nx as usize;
            if frozen[nidx] {
                continue;
            }

            let a = frozen_value(&frozen, &dist, ny - 1, nx)
                .min(frozen_value(&frozen, &dist, ny + 1, nx));
            let b = frozen_value(&frozen, &dist, ny, nx - 1)
                .min(frozen_value(&frozen, &dist, ny, nx + 1));
            let candidate = eikonal_update(a, b);
            if candidate < dist[nidx] {
                dist[nidx] = candidate;
                heap.push(Trial {
                    dist: candidate,
                    idx: nidx,
                });
            }
        }
    }
    dist
}

/// Upwind update from the smallest known neighbor along each axis.
#[inline]
fn eikonal_update(a: f64, b: f64) -> f64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo >= 1.0 || !hi.is_finite() {
        lo + 1.0
    } else {
        (lo + hi + (2.0 - (lo - hi).powi(2)).sqrt()) / 2.0
    }
}

// ============================================================================
// Gradient and smoothing
// ============================================================================

/// Per-axis derivative of `field` at mask pixels: central differences where
/// both neighbors along the axis are in the mask, one-sided where only one is.
fn masked_gradient(mask: &BoxMask, field: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let (height, width) = (mask.height, mask.width);
    let mut grad_y = vec![0.0; height * width];
    let mut grad_x = vec![0.0; height * width];
    let at = |y: isize, x: isize| field[y as usize * width + x as usize];

    for y in 0..height as isize {
        for x in 0..width as isize {
            if !mask.contains(y, x) {
                continue;
            }
            let idx = y as usize * width + x as usize;
            grad_y[idx] = axis_difference(
                at(y, x),
                mask.contains(y - 1, x).then(|| at(y - 1, x)),
                mask.contains(y + 1, x).then(|| at(y + 1, x)),
            );
            grad_x[idx] = axis_difference(
                at(y, x),
                mask.contains(y, x - 1).then(|| at(y, x - 1)),
                mask.contains(y, x + 1).then(|| at(y, x + 1)),
            );
        }
    }
    (grad_y, grad_x)
}

#[inline]
fn axis_difference(center: f64, before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (a - b) / 2.0,
        (None, Some(a)) => a - center,
        (Some(b), None) => center - b,
        (None, None) => 0.0,
    }
}

/// 3x3 mean of `values` with pixels outside the mask counted as 0 and the
/// box border reflected, evaluated at mask pixels only.
fn masked_mean_3x3(mask: &BoxMask, values: &[f64]) -> Vec<f64> {
    let (height, width) = (mask.height, mask.width);
    let filled = |y: usize, x: usize| {
        let idx = y * width + x;
        if mask.inside[idx] {
            values[idx]
        } else {
            0.0
        }
    };

    let mut out = vec![0.0; height * width];
    for y in 0..height {
        for x in 0..width {
            if !mask.inside[y * width + x] {
                continue;
            }
            let mut sum = 0.0;
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let (ry, rx) = (reflect(y as isize + dy, height), reflect(x as isize + dx, width));
                    sum += filled(ry, rx);
                }
            }
            out[y * width + x] = sum / 9.0;
        }
    }
    out
}

/// Mirror an index one step outside `[0, len)` back onto the edge pixel.
#[inline]
fn reflect(i: isize, len: usize) -> usize {
    if i < 0 {
        (-i - 1) as usize
    } else if i as usize >= len {
        2 * len - i as usize - 1
    } else {
        i as usize
    }
}
