//! Projective homographies.

use align_types::PointMatch;
use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

use crate::{Model2d, ModelError, ModelResult};

/// A 2D projective homography `p ↦ H p` in homogeneous coordinates,
/// stored as a row-major 3×3 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyModel2d {
    /// Homogeneous transform matrix.
    pub matrix: Matrix3<f64>,
}

impl Default for HomographyModel2d {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }
}

/// Similarity normalization of a point cloud for the DLT: translate the
/// centroid to the origin and scale the mean distance to `√2`.
fn normalization(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in points {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;
    let mut mean_dist = 0.0;
    for p in points {
        mean_dist += ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
    }
    mean_dist /= n;
    if mean_dist <= 0.0 || !mean_dist.is_finite() {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

impl HomographyModel2d {
    /// Create a homography from a homogeneous matrix.
    #[must_use]
    pub const fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }
}

impl Model2d for HomographyModel2d {
    fn min_matches(&self) -> usize {
        4
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let h = &self.matrix;
        let v = h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v.x / v.z, v.y / v.z)
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        let det = self.matrix.determinant();
        let Some(inv) = self.matrix.try_inverse() else {
            return Err(ModelError::NonInvertible { determinant: det });
        };
        let v = inv * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() <= f64::MIN_POSITIVE || !v.z.is_finite() {
            return Err(ModelError::NonInvertible { determinant: det });
        }
        Ok(Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Normalized weighted DLT.
    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        let needed = self.min_matches();
        let not_enough = ModelError::NotEnoughDataPoints {
            needed,
            found: matches.len(),
        };
        if matches.len() < needed {
            return Err(not_enough);
        }

        let sources: Vec<Point2<f64>> = matches.iter().map(|m| m.p1.local).collect();
        let targets: Vec<Point2<f64>> = matches.iter().map(|m| m.p2.world).collect();
        let (Some(ts), Some(tt)) = (normalization(&sources), normalization(&targets)) else {
            return Err(not_enough);
        };

        let mut rows = DMatrix::<f64>::zeros(2 * matches.len(), 9);
        for (i, m) in matches.iter().enumerate() {
            let sw = m.weight.sqrt();
            let s = ts * Vector3::new(m.p1.local.x, m.p1.local.y, 1.0);
            let t = tt * Vector3::new(m.p2.world.x, m.p2.world.y, 1.0);
            let (x, y) = (s.x, s.y);
            let (u, v) = (t.x, t.y);
            let r0 = [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v];
            let r1 = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u];
            for c in 0..9 {
                rows[(2 * i, c)] = sw * r0[c];
                rows[(2 * i + 1, c)] = sw * r1[c];
            }
        }

        // Null vector of the design matrix via the smallest eigenpair of AᵀA.
        let ata = rows.transpose() * &rows;
        let eigen = ata.symmetric_eigen();
        let mut smallest = 0;
        for i in 1..eigen.eigenvalues.len() {
            if eigen.eigenvalues[i] < eigen.eigenvalues[smallest] {
                smallest = i;
            }
        }
        let h = eigen.eigenvectors.column(smallest);
        let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let Some(tt_inv) = tt.try_inverse() else {
            return Err(not_enough);
        };
        let mut matrix = tt_inv * normalized * ts;
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(not_enough);
        }
        // Canonicalize so the lower-right entry is 1 where possible.
        let h22 = matrix[(2, 2)];
        if h22.abs() > 1e-12 {
            matrix /= h22;
        }
        self.matrix = matrix;
        Ok(())
    }

    fn to_array(&self) -> Vec<f64> {
        let h = &self.matrix;
        vec![
            h[(0, 0)],
            h[(0, 1)],
            h[(0, 2)],
            h[(1, 0)],
            h[(1, 1)],
            h[(1, 2)],
            h[(2, 0)],
            h[(2, 1)],
            h[(2, 2)],
        ]
    }

    fn set_from_array(&mut self, values: &[f64]) -> ModelResult<()> {
        if values.len() != 9 {
            return Err(ModelError::BadParameterCount {
                expected: 9,
                found: values.len(),
            });
        }
        self.matrix = Matrix3::new(
            values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
            values[8],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_types::Point;
    use approx::assert_relative_eq;

    fn match_at(p: Point2<f64>, q: Point2<f64>) -> PointMatch {
        PointMatch::new(Point::new(p), Point::new(q), 1.0)
    }

    #[test]
    fn fit_recovers_projective_warp() {
        let truth = HomographyModel2d::from_matrix(Matrix3::new(
            1.1, 0.05, 3.0, -0.02, 0.95, -1.0, 1e-4, -2e-4, 1.0,
        ));
        let matches: Vec<PointMatch> = [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(0.0, 100.0),
            Point2::new(100.0, 100.0),
            Point2::new(40.0, 60.0),
        ]
        .iter()
        .map(|&p| match_at(p, truth.apply(p)))
        .collect();

        let mut m = HomographyModel2d::default();
        m.fit(&matches).unwrap();
        for &p in &[Point2::new(17.0, 23.0), Point2::new(80.0, 51.0)] {
            let a = m.apply(p);
            let b = truth.apply(p);
            assert_relative_eq!(a.x, b.x, epsilon = 1e-6);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-6);
        }
    }

    #[test]
    fn four_matches_are_required() {
        let matches = vec![
            match_at(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)),
            match_at(Point2::new(1.0, 0.0), Point2::new(1.0, 0.0)),
            match_at(Point2::new(0.0, 1.0), Point2::new(0.0, 1.0)),
        ];
        let mut m = HomographyModel2d::default();
        assert!(matches!(
            m.fit(&matches),
            Err(ModelError::NotEnoughDataPoints { needed: 4, found: 3 })
        ));
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let matches = vec![match_at(Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)); 5];
        let mut m = HomographyModel2d::default();
        assert!(matches!(
            m.fit(&matches),
            Err(ModelError::NotEnoughDataPoints { .. })
        ));
    }

    #[test]
    fn identity_fit_is_identity() {
        let matches: Vec<PointMatch> = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 10.0),
        ]
        .iter()
        .map(|&p| match_at(p, p))
        .collect();
        let mut m = HomographyModel2d::default();
        m.fit(&matches).unwrap();
        let p = Point2::new(3.5, 7.5);
        let q = m.apply(p);
        assert_relative_eq!(q.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn singular_matrix_is_not_invertible() {
        let m = HomographyModel2d::from_matrix(Matrix3::new(
            1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ));
        assert!(matches!(
            m.apply_inverse(Point2::new(1.0, 1.0)),
            Err(ModelError::NonInvertible { .. })
        ));
    }

    #[test]
    fn array_round_trip() {
        let m = HomographyModel2d::from_matrix(Matrix3::new(
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0,
        ));
        let mut n = HomographyModel2d::default();
        n.set_from_array(&m.to_array()).unwrap();
        assert_eq!(m, n);
    }
}
