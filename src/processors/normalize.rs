//! Min-max normalization of point coordinates.
//!
//! Raw scans arrive at arbitrary scales; rescaling every axis into [0, 1]
//! makes a fixed eps threshold meaningful across inputs. The parameters are
//! derived once from the full input and applied identically to every point,
//! so point order (and therefore point ids) is unchanged.

/// Per-axis offset and scale computed from one input set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationParams {
    /// Per-axis minimum over the input.
    pub min: [f32; 3],
    /// Per-axis scale factor: 1 / (max - min), or 1 for a zero-extent axis.
    pub scale: [f32; 3],
}

impl NormalizationParams {
    /// Parameters that leave coordinates unchanged.
    pub fn identity() -> Self {
        Self {
            min: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    /// Apply the transform to a single point.
    #[inline]
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        [
            (p[0] - self.min[0]) * self.scale[0],
            (p[1] - self.min[1]) * self.scale[1],
            (p[2] - self.min[2]) * self.scale[2],
        ]
    }
}

/// Rescale coordinates so every axis with nonzero extent spans [0, 1].
///
/// An axis where all points share one value is left unscaled (offset only);
/// this keeps the transform total for degenerate inputs such as a cloud of
/// identical points. Empty input yields empty output and identity params.
///
/// Pure function of its input; two calls on the same slice produce
/// byte-identical results.
pub fn normalize(coords: &[[f32; 3]]) -> (Vec<[f32; 3]>, NormalizationParams) {
    if coords.is_empty() {
        return (Vec::new(), NormalizationParams::identity());
    }

    let mut min = coords[0];
    let mut max = coords[0];
    for p in &coords[1..] {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }

    let mut scale = [1.0f32; 3];
    for axis in 0..3 {
        let extent = max[axis] - min[axis];
        if extent > 0.0 {
            scale[axis] = 1.0 / extent;
        } else {
            log::info!("axis {} has zero extent, leaving it unscaled", axis);
        }
    }

    let params = NormalizationParams { min, scale };
    let normalized = coords.iter().map(|&p| params.apply(p)).collect();

    (normalized, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_spans_unit_cube() {
        let coords = vec![[0.0, -10.0, 100.0], [2.0, 10.0, 300.0], [1.0, 0.0, 200.0]];
        let (normed, params) = normalize(&coords);

        assert_eq!(normed[0], [0.0, 0.0, 0.0]);
        assert_eq!(normed[1], [1.0, 1.0, 1.0]);
        assert_eq!(normed[2], [0.5, 0.5, 0.5]);
        assert_eq!(params.min, [0.0, -10.0, 100.0]);
    }

    #[test]
    fn test_normalize_empty() {
        let (normed, params) = normalize(&[]);
        assert!(normed.is_empty());
        assert_eq!(params, NormalizationParams::identity());
    }

    #[test]
    fn test_normalize_degenerate_axis() {
        // All z values equal: axis must be offset but not scaled
        let coords = vec![[0.0, 0.0, 7.0], [4.0, 2.0, 7.0]];
        let (normed, params) = normalize(&coords);

        assert_eq!(params.scale[2], 1.0);
        assert_eq!(normed[0][2], 0.0);
        assert_eq!(normed[1][2], 0.0);
        assert_eq!(normed[1][0], 1.0);
    }

    #[test]
    fn test_normalize_all_points_identical() {
        let coords = vec![[3.0, 3.0, 3.0]; 5];
        let (normed, _) = normalize(&coords);

        for p in &normed {
            assert_eq!(*p, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let coords = vec![[0.3, 1.7, -2.2], [5.1, 0.0, 9.9], [2.2, 2.2, 2.2]];
        let (a, pa) = normalize(&coords);
        let (b, pb) = normalize(&coords);
        assert_eq!(a, b);
        assert_eq!(pa, pb);
    }
}
