//! Rigid (rotation + translation) transforms.

use align_types::PointMatch;
use nalgebra::{Point2, Vector2};

use crate::model::weighted_centroids;
use crate::{AffineModel2d, Model2d, ModelError, ModelResult};

/// A 2D rigid transform `p ↦ R(θ) p + t`, stored as `(cos θ, sin θ, t)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidModel2d {
    /// Cosine of the rotation angle.
    pub cos: f64,
    /// Sine of the rotation angle.
    pub sin: f64,
    /// Translation vector.
    pub translation: Vector2<f64>,
}

impl Default for RigidModel2d {
    fn default() -> Self {
        Self {
            cos: 1.0,
            sin: 0.0,
            translation: Vector2::zeros(),
        }
    }
}

impl RigidModel2d {
    /// Create a rigid transform from a rotation angle (radians) and a
    /// translation.
    #[must_use]
    pub fn from_angle(theta: f64, tx: f64, ty: f64) -> Self {
        Self {
            cos: theta.cos(),
            sin: theta.sin(),
            translation: Vector2::new(tx, ty),
        }
    }

    /// The rotation angle in radians.
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// The equivalent affine model.
    #[must_use]
    pub fn to_affine(&self) -> AffineModel2d {
        AffineModel2d::new(
            self.cos,
            self.sin,
            -self.sin,
            self.cos,
            self.translation.x,
            self.translation.y,
        )
    }

    fn rotate(&self, v: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.cos * v.x - self.sin * v.y,
            self.sin * v.x + self.cos * v.y,
        )
    }
}

impl Model2d for RigidModel2d {
    fn min_matches(&self) -> usize {
        2
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(self.rotate(p.coords) + self.translation)
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        // R is orthogonal, so the inverse rotation is the transpose.
        let d = p.coords - self.translation;
        Ok(Point2::new(
            self.cos * d.x + self.sin * d.y,
            -self.sin * d.x + self.cos * d.y,
        ))
    }

    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        let needed = self.min_matches();
        let (pc, qc, _) = weighted_centroids(matches, needed)?;

        let mut cos = 0.0;
        let mut sin = 0.0;
        for m in matches {
            let p = m.p1.local - pc;
            let q = m.p2.world - qc;
            cos += m.weight * (p.x * q.x + p.y * q.y);
            sin += m.weight * (p.x * q.y - p.y * q.x);
        }
        let norm = (cos * cos + sin * sin).sqrt();
        if norm <= 0.0 || !norm.is_finite() {
            return Err(ModelError::NotEnoughDataPoints {
                needed,
                found: matches.len(),
            });
        }
        self.cos = cos / norm;
        self.sin = sin / norm;
        self.translation = qc.coords - self.rotate(pc.coords);
        Ok(())
    }

    fn to_array(&self) -> Vec<f64> {
        vec![
            self.cos,
            self.sin,
            -self.sin,
            self.cos,
            self.translation.x,
            self.translation.y,
        ]
    }

    fn set_from_array(&mut self, values: &[f64]) -> ModelResult<()> {
        if values.len() != 6 {
            return Err(ModelError::BadParameterCount {
                expected: 6,
                found: values.len(),
            });
        }
        // Re-normalize the rotation column in case the array drifted.
        let norm = (values[0] * values[0] + values[1] * values[1]).sqrt();
        if norm <= 0.0 || !norm.is_finite() {
            return Err(ModelError::BadParameterCount {
                expected: 6,
                found: values.len(),
            });
        }
        self.cos = values[0] / norm;
        self.sin = values[1] / norm;
        self.translation = Vector2::new(values[4], values[5]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_types::Point;
    use approx::assert_relative_eq;

    fn transformed_matches(theta: f64, tx: f64, ty: f64) -> Vec<PointMatch> {
        let truth = RigidModel2d::from_angle(theta, tx, ty);
        [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
            Point2::new(7.0, 3.0),
        ]
        .iter()
        .map(|&p| {
            PointMatch::new(
                Point::new(p),
                Point::new(truth.apply(p)),
                1.0,
            )
        })
        .collect()
    }

    #[test]
    fn fit_recovers_rotation_and_translation() {
        let matches = transformed_matches(0.3, 5.0, -2.0);
        let mut m = RigidModel2d::default();
        m.fit(&matches).unwrap();
        assert_relative_eq!(m.angle(), 0.3, epsilon = 1e-9);
        assert_relative_eq!(m.translation.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(m.translation.y, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn coincident_points_are_degenerate() {
        let p = Point::new(Point2::new(1.0, 1.0));
        let matches = vec![PointMatch::new(p, p, 1.0); 3];
        let mut m = RigidModel2d::default();
        assert!(matches!(
            m.fit(&matches),
            Err(ModelError::NotEnoughDataPoints { .. })
        ));
    }

    #[test]
    fn inverse_undoes_apply() {
        let m = RigidModel2d::from_angle(1.1, 4.0, 2.0);
        let p = Point2::new(3.0, -8.0);
        let q = m.apply(p);
        let back = m.apply_inverse(q).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn array_round_trip() {
        let m = RigidModel2d::from_angle(-0.7, 1.0, 2.0);
        let mut n = RigidModel2d::default();
        n.set_from_array(&m.to_array()).unwrap();
        assert_relative_eq!(m.angle(), n.angle(), epsilon = 1e-12);
    }

    #[test]
    fn weighted_fit_prefers_heavy_matches() {
        // Two heavy matches define a pure translation; one light outlier.
        let mut matches = vec![
            PointMatch::new(
                Point::new(Point2::new(0.0, 0.0)),
                Point::new(Point2::new(1.0, 0.0)),
                100.0,
            ),
            PointMatch::new(
                Point::new(Point2::new(10.0, 0.0)),
                Point::new(Point2::new(11.0, 0.0)),
                100.0,
            ),
            PointMatch::new(
                Point::new(Point2::new(5.0, 5.0)),
                Point::new(Point2::new(5.5, 7.5)),
                0.01,
            ),
        ];
        matches[2].p2.world = Point2::new(5.5, 7.5);
        let mut m = RigidModel2d::default();
        m.fit(&matches).unwrap();
        assert!(m.angle().abs() < 0.01);
        assert_relative_eq!(m.translation.x, 1.0, epsilon = 0.05);
    }
}
