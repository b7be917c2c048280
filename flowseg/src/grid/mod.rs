//! Dense 2D/3D grids.
//!
//! All arrays in the crate are stored row-major against a [`Shape`] whose
//! extents are ordered outermost first: `(Y, X)` or `(Z, Y, X)`.


use std::ops::{Index, IndexMut};

use arrayvec::ArrayVec;

use crate::error::{FlowError, Result};

/// Largest supported number of axes.
pub const MAX_DIMS: usize = 3;

/// Integer coordinates, one entry per axis.
pub type Coords = ArrayVec<usize, MAX_DIMS>;

/// Signed per-axis offset from a pixel.
pub type Offset = ArrayVec<isize, MAX_DIMS>;

// ============================================================================
// Shape
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    extents: ArrayVec<usize, MAX_DIMS>,
}

impl Shape {
    pub fn new(extents: &[usize]) -> Result<Self> {
        if !(2..=MAX_DIMS).contains(&extents.len()) {
            return Err(FlowError::InvalidShape {
                ndim: extents.len(),
            });
        }
        Ok(Self {
            extents: extents.iter().copied().collect(),
        })
    }

    pub fn d2(height: usize, width: usize) -> Self {
        Self {
            extents: [height, width].into_iter().collect(),
        }
    }

    pub fn d3(depth: usize, height: usize, width: usize) -> Self {
        Self {
            extents: [depth, height, width].into_iter().collect(),
        }
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.extents.len()
    }

    #[inline]
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        self.extents[axis]
    }

    /// Total number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.extents.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major strides in elements.
    pub fn strides(&self) -> Coords {
        let mut strides: Coords = self.extents.iter().map(|_| 1).collect();
        for axis in (0..self.ndim().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.extents[axis + 1];
        }
        strides
    }

    #[inline]
    pub fn flat_index(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.ndim());
        coords
            .iter()
            .zip(&self.extents)
            .fold(0, |acc, (&c, &extent)| {
                debug_assert!(c < extent);
                acc * extent + c
            })
    }

    pub fn coords(&self, mut idx: usize) -> Coords {
        debug_assert!(idx < self.len());
        let mut coords: Coords = self.extents.iter().map(|_| 0).collect();
        for axis in (0..self.ndim()).rev() {
            coords[axis] = idx % self.extents[axis];
            idx /= self.extents[axis];
        }
        coords
    }

    /// Flat index of `coords + offset`, or `None` when it leaves the grid.
    #[inline]
    pub fn offset_index(&self, coords: &[usize], offset: &[isize]) -> Option<usize> {
        let mut idx = 0;
        for ((&c, &o), &extent) in coords.iter().zip(offset).zip(&self.extents) {
            let moved = c as isize + o;
            if moved < 0 || moved >= extent as isize {
                return None;
            }
            idx = idx * extent + moved as usize;
        }
        Some(idx)
    }

    /// The same grid grown by `pad` pixels on both sides of every axis.
    pub fn padded(&self, pad: usize) -> Shape {
        Self {
            extents: self.extents.iter().map(|&e| e + 2 * pad).collect(),
        }
    }

    /// Shape of the plane obtained by fixing `axis` of a 3D grid.
    pub fn without_axis(&self, axis: usize) -> Shape {
        debug_assert_eq!(self.ndim(), 3);
        Self {
            extents: self
                .extents
                .iter()
                .enumerate()
                .filter(|&(a, _)| a != axis)
                .map(|(_, &e)| e)
                .collect(),
        }
    }

    pub fn ensure_same(&self, other: &Shape) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(FlowError::ShapeMismatch {
                expected: self.extents.to_vec(),
                actual: other.extents.to_vec(),
            })
        }
    }

    pub fn ensure_len(&self, what: &'static str, actual: usize) -> Result<()> {
        if actual == self.len() {
            Ok(())
        } else {
            Err(FlowError::LengthMismatch {
                what,
                expected: self.len(),
                actual,
            })
        }
    }
}

// ============================================================================
// Grid
// ============================================================================

/// A dense buffer over a [`Shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    shape: Shape,
    data: Vec<T>,
}

impl<T> Grid<T> {
    pub fn from_vec(shape: Shape, data: Vec<T>) -> Result<Self> {
        shape.ensure_len("grid data", data.len())?;
        Ok(Self { shape, data })
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline]
    pub fn get(&self, coords: &[usize]) -> &T {
        &self.data[self.shape.flat_index(coords)]
    }

    #[inline]
    pub fn get_mut(&mut self, coords: &[usize]) -> &mut T {
        let idx = self.shape.flat_index(coords);
        &mut self.data[idx]
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_filled(shape: Shape, value: T) -> Self {
        let data = vec![value; shape.len()];
        Self { shape, data }
    }

    /// Copies the 2D plane at `index` along `axis` out of a 3D grid.
    ///
    /// The remaining axes keep their order: fixing Z yields `(Y, X)`, fixing Y
    /// yields `(Z, X)`, fixing X yields `(Z, Y)`.
    pub fn plane(&self, axis: usize, index: usize) -> Grid<T> {
        assert_eq!(self.shape.ndim(), 3, "planes are taken from 3D grids");
        let plane_shape = self.shape.without_axis(axis);
        let data = (0..plane_shape.len())
            .map(|i| {
                let coords = insert_axis(&plane_shape.coords(i), axis, index);
                self.data[self.shape.flat_index(&coords)].clone()
            })
            .collect();
        Grid {
            shape: plane_shape,
            data,
        }
    }
}

impl<T> Index<usize> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.data[idx]
    }
}

impl<T> IndexMut<usize> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.data[idx]
    }
}

/// Re-inserts the fixed `axis` coordinate into 2D plane coordinates.
#[inline]
pub fn insert_axis(plane_coords: &[usize], axis: usize, index: usize) -> Coords {
    let mut coords: Coords = plane_coords.iter().copied().collect();
    coords.insert(axis, index);
    coords
}

// ============================================================================
// Bounding boxes
// ============================================================================

/// Axis-aligned half-open box `[start, end)` on every axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingBox {
    pub start: Coords,
    pub end: Coords,
}

impl BoundingBox {
    fn around(coords: &[usize]) -> Self {
        Self {
            start: coords.iter().copied().collect(),
            end: coords.iter().map(|&c| c + 1).collect(),
        }
    }

    fn include(&mut self, coords: &[usize]) {
        for (axis, &c) in coords.iter().enumerate() {
            self.start[axis] = self.start[axis].min(c);
            self.end[axis] = self.end[axis].max(c + 1);
        }
    }

    /// Shape of the box itself.
    pub fn shape(&self) -> Shape {
        let extents: ArrayVec<usize, MAX_DIMS> = self
            .start
            .iter()
            .zip(&self.end)
            .map(|(&s, &e)| e - s)
            .collect();
        Shape { extents }
    }

    /// Flat indices into `grid` of every pixel inside the box, in row-major order.
    pub fn indices<'a>(&'a self, grid: &'a Shape) -> impl Iterator<Item = usize> + 'a {
        let local = self.shape();
        (0..local.len()).map(move |i| {
            let coords: Coords = local
                .coords(i)
                .iter()
                .zip(&self.start)
                .map(|(&c, &s)| c + s)
                .collect();
            grid.flat_index(&coords)
        })
    }
}

/// Bounding box of every label `1..=max`, `None` for labels with no pixels.
pub fn find_objects(shape: &Shape, labels: &[u32]) -> Vec<Option<BoundingBox>> {
    debug_assert_eq!(shape.len(), labels.len());
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut boxes: Vec<Option<BoundingBox>> = vec![None; max_label];

    for (idx, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let coords = shape.coords(idx);
        let slot = label as usize - 1;
        if let Some(bbox) = boxes[slot].as_mut() {
            bbox.include(&coords);
        } else {
            boxes[slot] = Some(BoundingBox::around(&coords));
        }
    }
    boxes
}

// ============================================================================
// Neighborhoods
// ============================================================================

/// Offsets of the full 3x3 (2D) or 3x3x3 (3D) window, center included,
/// in row-major order.
pub fn window_offsets(ndim: usize) -> Vec<Offset> {
    let count = 3usize.pow(ndim as u32);
    (0..count)
        .map(|mut i| {
            let mut offset: Offset = (0..ndim).map(|_| 0).collect();
            for axis in (0..ndim).rev() {
                offset[axis] = (i % 3) as isize - 1;
                i /= 3;
            }
            offset
        })
        .collect()
}

/// Offsets of the face neighbors: 4 in 2D, 6 in 3D.
pub fn face_offsets(ndim: usize) -> Vec<Offset> {
    let mut offsets = Vec::with_capacity(2 * ndim);
    for axis in 0..ndim {
        for step in [-1isize, 1] {
            let mut offset: Offset = (0..ndim).map(|_| 0).collect();
            offset[axis] = step;
            offsets.push(offset);
        }
    }
    offsets
}
