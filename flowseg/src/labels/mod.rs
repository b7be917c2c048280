//! Instance label maps.

#[cfg(test)]
mod tests;

use num_traits::ToPrimitive;

use crate::error::Result;
use crate::grid::{find_objects, BoundingBox, Grid, Shape};

/// Integer instance labels over a grid: 0 is background, `k` is the k-th instance.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    labels: Grid<u32>,
}

impl LabelMap {
    pub fn new(shape: Shape, labels: Vec<u32>) -> Result<Self> {
        Ok(Self {
            labels: Grid::from_vec(shape, labels)?,
        })
    }

    /// All-background map.
    pub fn empty(shape: Shape) -> Self {
        Self {
            labels: Grid::new_filled(shape, 0),
        }
    }

    /// Builds a map from any numeric label values, rounding to the nearest
    /// integer. Negative and non-finite values become background.
    pub fn from_values<T: ToPrimitive>(shape: Shape, values: &[T]) -> Result<Self> {
        shape.ensure_len("label values", values.len())?;
        let labels = values
            .iter()
            .map(|v| {
                v.to_f64()
                    .filter(|v| v.is_finite() && *v > 0.0)
                    .and_then(|v| v.round().to_u32())
                    .unwrap_or(0)
            })
            .collect();
        Self::new(shape, labels)
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        self.labels.shape()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Raw labels, row-major.
    #[inline]
    pub fn labels(&self) -> &[u32] {
        self.labels.data()
    }

    #[inline]
    pub fn labels_mut(&mut self) -> &mut [u32] {
        self.labels.data_mut()
    }

    #[inline]
    pub fn into_grid(self) -> Grid<u32> {
        self.labels
    }

    pub fn max_label(&self) -> u32 {
        self.labels().iter().copied().max().unwrap_or(0)
    }

    /// Number of distinct non-background labels.
    pub fn num_instances(&self) -> usize {
        self.counts().iter().skip(1).filter(|&&c| c > 0).count()
    }

    /// Pixel count per label value, index 0 is background.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.max_label() as usize + 1];
        for &label in self.labels() {
            counts[label as usize] += 1;
        }
        counts
    }

    /// Bounding box of every label `1..=max_label`.
    pub fn find_objects(&self) -> Vec<Option<BoundingBox>> {
        find_objects(self.shape(), self.labels())
    }

    /// True when the label set is exactly `{0, 1, ..., K}` for some K.
    ///
    /// Background need not be present.
    pub fn is_contiguous(&self) -> bool {
        self.counts().iter().skip(1).all(|&c| c > 0)
    }

    /// Renumbers instances to `1..=K` keeping their relative order.
    /// Background stays 0. Returns K.
    pub fn renumber(&mut self) -> usize {
        let counts = self.counts();
        let mut mapping = vec![0u32; counts.len()];
        let mut next = 0u32;
        for (label, &count) in counts.iter().enumerate().skip(1) {
            if count > 0 {
                next += 1;
                mapping[label] = next;
            }
        }
        for label in self.labels_mut() {
            *label = mapping[*label as usize];
        }
        next as usize
    }

    /// Sets every pixel carrying one of `labels` to background.
    pub fn clear_labels(&mut self, labels: &[u32]) {
        if labels.is_empty() {
            return;
        }
        let mut remove = vec![false; self.max_label() as usize + 1];
        for &label in labels {
            if let Some(flag) = remove.get_mut(label as usize) {
                *flag = true;
            }
        }
        for label in self.labels_mut() {
            if remove[*label as usize] {
                *label = 0;
            }
        }
    }

    /// The 2D label map at `index` along `axis` of a 3D map.
    pub fn plane(&self, axis: usize, index: usize) -> LabelMap {
        LabelMap {
            labels: self.labels.plane(axis, index),
        }
    }

    /// Boolean foreground mask (`label > 0`).
    pub fn foreground(&self) -> Vec<bool> {
        self.labels().iter().map(|&l| l > 0).collect()
    }
}

impl std::ops::Index<usize> for LabelMap {
    type Output = u32;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.labels[idx]
    }
}
