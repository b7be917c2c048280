//! Center-seeded diffusion encoder.

use rayon::prelude::*;

use super::{nearest_pixel, normalize_pair, EncodedFlow};
use crate::flow::FlowField;
use crate::grid::{insert_axis, BoundingBox, Shape};
use crate::labels::LabelMap;
use crate::metrics::DiameterEstimator;

/// Width of the center-weight falloff as a fraction of the instance diameter.
pub const CENTER_WEIGHT_SCALE: f64 = 0.15;

/// Axis fixed by each 3D pass and the global channels its two in-plane
/// components are added to.
const PLANE_PASSES: [(usize, [usize; 2]); 3] = [(0, [1, 2]), (1, [0, 2]), (2, [0, 1])];

/// Flows of one instance, in global flat indices.
struct InstanceFlow {
    pixels: Vec<usize>,
    dy: Vec<f64>,
    dx: Vec<f64>,
    weight: Option<Vec<f32>>,
}

/// Encodes every instance of a 2D or 3D label map by center-seeded diffusion.
///
/// The output is unit-normalized per pixel. The center-weight channel and the
/// diameter are only produced for 2D input.
pub fn diffusion_flows(labels: &LabelMap, estimator: &dyn DiameterEstimator) -> EncodedFlow {
    match labels.shape().ndim() {
        2 => diffusion_flows_2d(labels, estimator),
        _ => EncodedFlow {
            flow: diffusion_flows_3d(labels),
            center_weight: None,
            diameter: None,
        },
    }
}

fn diffusion_flows_2d(labels: &LabelMap, estimator: &dyn DiameterEstimator) -> EncodedFlow {
    let diameter = estimator.diameter(labels);
    let s2 = (CENTER_WEIGHT_SCALE * diameter as f64).powi(2);
    let (flow, weight) = diffuse_plane(labels, Some(s2));
    EncodedFlow {
        flow,
        center_weight: weight,
        diameter: Some(diameter),
    }
}

/// Normalized diffusion flows of a 2D map. The center-weight channel is
/// built only when its falloff `s2` is given.
fn diffuse_plane(labels: &LabelMap, s2: Option<f64>) -> (FlowField, Option<Vec<f32>>) {
    let shape = labels.shape().clone();

    let boxes = labels.find_objects();
    let instances: Vec<InstanceFlow> = boxes
        .par_iter()
        .enumerate()
        .filter_map(|(i, bbox)| {
            let bbox = bbox.as_ref()?;
            diffuse_instance(labels, bbox, i as u32 + 1, s2)
        })
        .collect();

    let mut dy = vec![0.0f64; shape.len()];
    let mut dx = vec![0.0f64; shape.len()];
    let mut weight = s2.map(|_| vec![0.0f32; shape.len()]);
    for instance in &instances {
        for (k, &idx) in instance.pixels.iter().enumerate() {
            dy[idx] = instance.dy[k];
            dx[idx] = instance.dx[k];
        }
        if let (Some(weight), Some(values)) = (weight.as_mut(), instance.weight.as_ref()) {
            for (&idx, &w) in instance.pixels.iter().zip(values) {
                weight[idx] = w;
            }
        }
    }
    normalize_pair(&mut dy, &mut dx);

    tracing::trace!(
        "Diffusion flows for {} instances on {:?}",
        instances.len(),
        shape.extents()
    );

    let channels = vec![
        dy.into_iter().map(|v| v as f32).collect(),
        dx.into_iter().map(|v| v as f32).collect(),
    ];
    (FlowField::from_parts(shape, channels), weight)
}

/// Runs the relaxation for one instance inside its bounding box.
///
/// The box is padded by one pixel on every side so the 3x3 update never
/// leaves the buffer; pixels outside the instance are never updated and stay 0.
fn diffuse_instance(
    labels: &LabelMap,
    bbox: &BoundingBox,
    label: u32,
    s2: Option<f64>,
) -> Option<InstanceFlow> {
    let width = labels.shape().extent(1);
    let (y0, x0) = (bbox.start[0], bbox.start[1]);
    let (box_h, box_w) = (bbox.end[0] - y0, bbox.end[1] - x0);

    // Instance pixels in padded box coordinates.
    let mut ys = Vec::new();
    let mut xs = Vec::new();
    for y in 0..box_h {
        let row = (y0 + y) * width + x0;
        for x in 0..box_w {
            if labels[row + x] == label {
                ys.push(y + 1);
                xs.push(x + 1);
            }
        }
    }
    if ys.is_empty() {
        return None;
    }

    let center = nearest_pixel(&ys, &xs, median(&ys), median(&xs));
    let (cy, cx) = (ys[center], xs[center]);

    let stride = box_w + 2;
    let pixels: Vec<usize> = ys.iter().zip(&xs).map(|(&y, &x)| y * stride + x).collect();
    let source = cy * stride + cx;
    let niter = 2 * (peak_to_peak(&ys) + peak_to_peak(&xs));

    let mut heat = vec![0.0f64; (box_h + 2) * stride];
    let mut next = vec![0.0f64; pixels.len()];
    for _ in 0..niter {
        heat[source] += 1.0;
        for (value, &p) in next.iter_mut().zip(&pixels) {
            let sum = heat[p - stride - 1]
                + heat[p - stride]
                + heat[p - stride + 1]
                + heat[p - 1]
                + heat[p]
                + heat[p + 1]
                + heat[p + stride - 1]
                + heat[p + stride]
                + heat[p + stride + 1];
            *value = sum / 9.0;
        }
        for (&value, &p) in next.iter().zip(&pixels) {
            heat[p] = value;
        }
    }

    for &p in &pixels {
        heat[p] = heat[p].ln_1p();
    }

    let dy = pixels
        .iter()
        .map(|&p| heat[p + stride] - heat[p - stride])
        .collect();
    let dx = pixels.iter().map(|&p| heat[p + 1] - heat[p - 1]).collect();

    let weight = s2.map(|s2| {
        ys.iter()
            .zip(&xs)
            .map(|(&y, &x)| {
                let d2 = (y as f64 - cy as f64).powi(2) + (x as f64 - cx as f64).powi(2);
                center_weight(d2, s2)
            })
            .collect()
    });

    let global = ys
        .iter()
        .zip(&xs)
        .map(|(&y, &x)| (y0 + y - 1) * width + (x0 + x - 1))
        .collect();

    Some(InstanceFlow {
        pixels: global,
        dy,
        dx,
        weight,
    })
}

/// `exp(-d2 / s2)`, with a zero-width falloff leaving only the center at 1.
#[inline]
fn center_weight(d2: f64, s2: f64) -> f32 {
    if s2 > 0.0 {
        (-d2 / s2).exp() as f32
    } else if d2 == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Sums 2D diffusion passes over every plane along each axis, then normalizes.
fn diffusion_flows_3d(labels: &LabelMap) -> FlowField {
    let shape = labels.shape().clone();
    let mut flow = FlowField::zeros(shape.clone());

    for (axis, targets) in PLANE_PASSES {
        let planes: Vec<(usize, FlowField)> = (0..shape.extent(axis))
            .into_par_iter()
            .map(|index| {
                let plane = labels.plane(axis, index);
                (index, diffuse_plane(&plane, None).0)
            })
            .collect();

        for (index, plane_flow) in planes {
            add_plane(&mut flow, &shape, &plane_flow, axis, index, targets);
        }
    }

    flow.normalize();
    flow
}

fn add_plane(
    flow: &mut FlowField,
    shape: &Shape,
    plane_flow: &FlowField,
    axis: usize,
    index: usize,
    targets: [usize; 2],
) {
    let plane_shape = plane_flow.shape();
    for j in 0..plane_shape.len() {
        let (a, b) = (plane_flow.channel(0)[j], plane_flow.channel(1)[j]);
        if a == 0.0 && b == 0.0 {
            continue;
        }
        let idx = shape.flat_index(&insert_axis(&plane_shape.coords(j), axis, index));
        flow.channel_mut(targets[0])[idx] += a;
        flow.channel_mut(targets[1])[idx] += b;
    }
}

fn median(values: &[usize]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let len = sorted.len();
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) as f64 / 2.0
    } else {
        sorted[len / 2] as f64
    }
}

fn peak_to_peak(values: &[usize]) -> usize {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    max - min
}
