//! Synthetic label maps shared by unit tests.

use crate::grid::Shape;
use crate::labels::LabelMap;

/// A `height x width` map with one square per `(y, x, side)` entry, labeled
/// `1, 2, ...` in order.
pub fn squares(height: usize, width: usize, squares: &[(usize, usize, usize)]) -> LabelMap {
    let mut labels = vec![0u32; height * width];
    for (k, &(y0, x0, side)) in squares.iter().enumerate() {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                labels[y * width + x] = k as u32 + 1;
            }
        }
    }
    LabelMap::new(Shape::d2(height, width), labels).unwrap()
}

/// A `size x size` map with a single disk of `radius` around the grid center.
pub fn disk(size: usize, radius: f64) -> LabelMap {
    ring(size, radius, -1.0)
}

/// Pixels with `inner < distance <= outer` from the grid center are labeled 1.
pub fn ring(size: usize, outer: f64, inner: f64) -> LabelMap {
    let center = (size as f64 - 1.0) / 2.0;
    let labels = (0..size * size)
        .map(|i| {
            let (y, x) = ((i / size) as f64, (i % size) as f64);
            let d = ((y - center).powi(2) + (x - center).powi(2)).sqrt();
            u32::from(d <= outer && d > inner)
        })
        .collect();
    LabelMap::new(Shape::d2(size, size), labels).unwrap()
}

/// A `depth x height x width` volume holding one cube per `(z, y, x, side)`.
pub fn cubes(
    depth: usize,
    height: usize,
    width: usize,
    cubes: &[(usize, usize, usize, usize)],
) -> LabelMap {
    let shape = Shape::d3(depth, height, width);
    let mut labels = vec![0u32; shape.len()];
    for (k, &(z0, y0, x0, side)) in cubes.iter().enumerate() {
        for z in z0..z0 + side {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    labels[shape.flat_index(&[z, y, x])] = k as u32 + 1;
                }
            }
        }
    }
    LabelMap::new(shape, labels).unwrap()
}
