//! Collaborators the flow machinery consumes: an instance-diameter estimator
//! and a flow-consistency metric, with the reference implementations used by
//! default.

use crate::flow::FlowField;
use crate::labels::LabelMap;

/// Estimates a characteristic instance diameter of a label map.
pub trait DiameterEstimator: Sync {
    fn diameter(&self, labels: &LabelMap) -> f32;
}

/// Scores how well a predicted flow field agrees with the flows re-derived
/// from candidate masks.
pub trait FlowErrorMetric: Sync {
    /// Per-instance error, entry `k - 1` belonging to label `k`, for labels
    /// `1..=labels.max_label()`.
    fn flow_error(&self, labels: &LabelMap, derived: &FlowField, predicted: &FlowField)
        -> Vec<f32>;
}

// ============================================================================
// Reference implementations
// ============================================================================

/// Median equivalent-circle diameter: the median over instances of
/// `sqrt(area)`, divided by `sqrt(pi) / 2`. Zero for maps without instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquivalentDiameter;

impl DiameterEstimator for EquivalentDiameter {
    fn diameter(&self, labels: &LabelMap) -> f32 {
        let mut roots: Vec<f64> = labels
            .counts()
            .iter()
            .skip(1)
            .filter(|&&count| count > 0)
            .map(|&count| (count as f64).sqrt())
            .collect();
        if roots.is_empty() {
            return 0.0;
        }
        roots.sort_by(f64::total_cmp);

        let len = roots.len();
        let median = if len % 2 == 0 {
            (roots[len / 2 - 1] + roots[len / 2]) / 2.0
        } else {
            roots[len / 2]
        };
        (median / (std::f64::consts::PI.sqrt() / 2.0)) as f32
    }
}

/// Mean over each instance of the squared difference between the re-derived
/// flow and the predicted flow divided by `scale`, summed over axes.
///
/// `scale` is the magnitude predicted flows carry relative to unit vectors;
/// 1.0 for flows produced by this crate's encoders.
#[derive(Debug, Clone, Copy)]
pub struct MeanSquaredFlowError {
    pub scale: f32,
}

impl MeanSquaredFlowError {
    pub fn new(scale: f32) -> Self {
        assert!(scale > 0.0, "flow scale must be positive, got {}", scale);
        Self { scale }
    }
}

impl Default for MeanSquaredFlowError {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl FlowErrorMetric for MeanSquaredFlowError {
    fn flow_error(
        &self,
        labels: &LabelMap,
        derived: &FlowField,
        predicted: &FlowField,
    ) -> Vec<f32> {
        let num_labels = labels.max_label() as usize;
        let mut sums = vec![0.0f64; num_labels];
        let mut counts = vec![0usize; num_labels];

        for (idx, &label) in labels.labels().iter().enumerate() {
            if label == 0 {
                continue;
            }
            let slot = label as usize - 1;
            let error: f64 = derived
                .channels()
                .iter()
                .zip(predicted.channels())
                .map(|(d, p)| (d[idx] as f64 - p[idx] as f64 / self.scale as f64).powi(2))
                .sum();
            sums[slot] += error;
            counts[slot] += 1;
        }

        sums.iter()
            .zip(&counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    0.0
                } else {
                    (sum / count as f64) as f32
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Shape;

    #[test]
    fn test_equivalent_diameter_of_square() {
        // One 4x4 instance: sqrt(16) / (sqrt(pi) / 2)
        let mut labels = vec![0u32; 100];
        for y in 2..6 {
            for x in 2..6 {
                labels[y * 10 + x] = 1;
            }
        }
        let map = LabelMap::new(Shape::d2(10, 10), labels).unwrap();
        let expected = 4.0 / (std::f32::consts::PI.sqrt() / 2.0);
        assert!((EquivalentDiameter.diameter(&map) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_equivalent_diameter_median_of_even_count() {
        // Areas 1 and 9 -> roots 1 and 3 -> median 2
        let mut labels = vec![0u32; 25];
        labels[0] = 1;
        for y in 2..5 {
            for x in 2..5 {
                labels[y * 5 + x] = 2;
            }
        }
        let map = LabelMap::new(Shape::d2(5, 5), labels).unwrap();
        let expected = 2.0 / (std::f32::consts::PI.sqrt() / 2.0);
        assert!((EquivalentDiameter.diameter(&map) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_equivalent_diameter_empty() {
        let map = LabelMap::empty(Shape::d2(4, 4));
        assert_eq!(EquivalentDiameter.diameter(&map), 0.0);
    }

    #[test]
    fn test_mean_squared_flow_error_per_instance() {
        let shape = Shape::d2(1, 4);
        let map = LabelMap::new(shape.clone(), vec![1, 1, 0, 3]).unwrap();
        let derived =
            FlowField::from_channels(shape.clone(), vec![vec![1.0, 1.0, 0.0, 0.0]; 2]).unwrap();
        let predicted = FlowField::from_channels(
            shape,
            vec![vec![2.0, 0.0, 5.0, 2.0], vec![2.0, 2.0, 5.0, 0.0]],
        )
        .unwrap();

        let errors = MeanSquaredFlowError::new(2.0).flow_error(&map, &derived, &predicted);
        assert_eq!(errors.len(), 3);
        // pixel 0: (1-1)^2 + (1-1)^2 = 0, pixel 1: (1-0)^2 + (1-1)^2 = 1
        assert!((errors[0] - 0.5).abs() < 1e-6);
        assert_eq!(errors[1], 0.0);
        // pixel 3: (0-1)^2 + (0-0)^2 = 1
        assert!((errors[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "flow scale must be positive")]
    fn test_mean_squared_flow_error_rejects_zero_scale() {
        MeanSquaredFlowError::new(0.0);
    }
}
