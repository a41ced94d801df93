//! Full affine transforms.

use align_types::PointMatch;
use nalgebra::{Point2, Vector2};

use crate::model::weighted_centroids;
use crate::{Model2d, ModelError, ModelResult};

/// A 2D affine transform
/// `p ↦ [m00 m01; m10 m11] p + (tx, ty)`.
///
/// The canonical array order `[m00, m10, m01, m11, tx, ty]` lists the
/// linear part column by column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineModel2d {
    /// Row 0, column 0 of the linear part.
    pub m00: f64,
    /// Row 1, column 0 of the linear part.
    pub m10: f64,
    /// Row 0, column 1 of the linear part.
    pub m01: f64,
    /// Row 1, column 1 of the linear part.
    pub m11: f64,
    /// Translation vector.
    pub translation: Vector2<f64>,
}

impl Default for AffineModel2d {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }
}

impl AffineModel2d {
    /// Create an affine transform from its six canonical parameters.
    #[must_use]
    pub const fn new(m00: f64, m10: f64, m01: f64, m11: f64, tx: f64, ty: f64) -> Self {
        Self {
            m00,
            m10,
            m01,
            m11,
            translation: Vector2::new(tx, ty),
        }
    }

    /// Determinant of the linear part.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    /// `self ∘ other`: the transform that applies `other` first, then
    /// `self`.
    #[must_use]
    pub fn concatenate(&self, other: &Self) -> Self {
        let t = self.apply(Point2::from(other.translation));
        Self {
            m00: self.m00 * other.m00 + self.m01 * other.m10,
            m10: self.m10 * other.m00 + self.m11 * other.m10,
            m01: self.m00 * other.m01 + self.m01 * other.m11,
            m11: self.m10 * other.m01 + self.m11 * other.m11,
            translation: t.coords,
        }
    }

    /// `other ∘ self`: the transform that applies `self` first, then
    /// `other`.
    #[must_use]
    pub fn pre_concatenate(&self, other: &Self) -> Self {
        other.concatenate(self)
    }

    /// The inverse affine transform.
    ///
    /// # Errors
    ///
    /// [`ModelError::NonInvertible`] when the linear part is singular.
    pub fn inverse(&self) -> ModelResult<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() <= f64::MIN_POSITIVE {
            return Err(ModelError::NonInvertible { determinant: det });
        }
        let i00 = self.m11 / det;
        let i01 = -self.m01 / det;
        let i10 = -self.m10 / det;
        let i11 = self.m00 / det;
        let tx = -(i00 * self.translation.x + i01 * self.translation.y);
        let ty = -(i10 * self.translation.x + i11 * self.translation.y);
        Ok(Self::new(i00, i10, i01, i11, tx, ty))
    }
}

impl Model2d for AffineModel2d {
    fn min_matches(&self) -> usize {
        3
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.m00 * p.x + self.m01 * p.y + self.translation.x,
            self.m10 * p.x + self.m11 * p.y + self.translation.y,
        )
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        Ok(self.inverse()?.apply(p))
    }

    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        let needed = self.min_matches();
        let (pc, qc, _) = weighted_centroids(matches, needed)?;

        // Weighted normal equations on centered coordinates.
        let mut a11 = 0.0;
        let mut a12 = 0.0;
        let mut a22 = 0.0;
        let mut bx1 = 0.0;
        let mut bx2 = 0.0;
        let mut by1 = 0.0;
        let mut by2 = 0.0;
        for m in matches {
            let p = m.p1.local - pc;
            let q = m.p2.world - qc;
            a11 += m.weight * p.x * p.x;
            a12 += m.weight * p.x * p.y;
            a22 += m.weight * p.y * p.y;
            bx1 += m.weight * p.x * q.x;
            bx2 += m.weight * p.y * q.x;
            by1 += m.weight * p.x * q.y;
            by2 += m.weight * p.y * q.y;
        }
        let det = a11 * a22 - a12 * a12;
        if !det.is_finite() || det <= a11 * a22 * 1e-12 {
            return Err(ModelError::NotEnoughDataPoints {
                needed,
                found: matches.len(),
            });
        }
        self.m00 = (a22 * bx1 - a12 * bx2) / det;
        self.m01 = (a11 * bx2 - a12 * bx1) / det;
        self.m10 = (a22 * by1 - a12 * by2) / det;
        self.m11 = (a11 * by2 - a12 * by1) / det;
        self.translation = Vector2::new(
            qc.x - self.m00 * pc.x - self.m01 * pc.y,
            qc.y - self.m10 * pc.x - self.m11 * pc.y,
        );
        Ok(())
    }

    fn to_array(&self) -> Vec<f64> {
        vec![
            self.m00,
            self.m10,
            self.m01,
            self.m11,
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
        self.m00 = values[0];
        self.m10 = values[1];
        self.m01 = values[2];
        self.m11 = values[3];
        self.translation = Vector2::new(values[4], values[5]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_types::Point;
    use approx::assert_relative_eq;

    fn sample_matches(truth: &AffineModel2d) -> Vec<PointMatch> {
        [
            Point2::new(0.0, 0.0),
            Point2::new(8.0, 1.0),
            Point2::new(2.0, 9.0),
            Point2::new(-5.0, 4.0),
        ]
        .iter()
        .map(|&p| PointMatch::new(Point::new(p), Point::new(truth.apply(p)), 1.0))
        .collect()
    }

    #[test]
    fn fit_recovers_shear_and_scale() {
        let truth = AffineModel2d::new(1.2, 0.1, -0.3, 0.9, 10.0, -4.0);
        let mut m = AffineModel2d::default();
        m.fit(&sample_matches(&truth)).unwrap();
        for (a, b) in m.to_array().iter().zip(truth.to_array().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn collinear_sources_are_singular() {
        let matches: Vec<PointMatch> = (0..5)
            .map(|i| {
                let p = Point2::new(f64::from(i), 2.0 * f64::from(i));
                PointMatch::new(Point::new(p), Point::new(p), 1.0)
            })
            .collect();
        let mut m = AffineModel2d::default();
        assert!(matches!(
            m.fit(&matches),
            Err(ModelError::NotEnoughDataPoints { .. })
        ));
    }

    #[test]
    fn singular_linear_part_is_not_invertible() {
        let m = AffineModel2d::new(1.0, 2.0, 2.0, 4.0, 0.0, 0.0);
        assert!(matches!(
            m.apply_inverse(Point2::origin()),
            Err(ModelError::NonInvertible { .. })
        ));
    }

    #[test]
    fn inverse_undoes_apply() {
        let m = AffineModel2d::new(2.0, 0.5, -1.0, 1.5, 3.0, 4.0);
        let p = Point2::new(6.0, -2.0);
        let q = m.apply(p);
        let back = m.apply_inverse(q).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn concatenate_applies_right_operand_first() {
        let scale = AffineModel2d::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = AffineModel2d::new(1.0, 0.0, 0.0, 1.0, 1.0, 0.0);
        // scale ∘ shift: p ↦ 2 (p + (1, 0))
        let c = scale.concatenate(&shift);
        assert_eq!(c.apply(Point2::origin()), Point2::new(2.0, 0.0));
        // shift ∘ scale via pre_concatenate: p ↦ 2 p + (1, 0)
        let pc = scale.pre_concatenate(&shift);
        assert_eq!(pc.apply(Point2::origin()), Point2::new(1.0, 0.0));
    }

    #[test]
    fn cost_is_mean_transfer_error() {
        let m = AffineModel2d::default();
        let matches = vec![PointMatch::new(
            Point::new(Point2::origin()),
            Point::with_world(Point2::origin(), Point2::new(3.0, 4.0)),
            1.0,
        )];
        assert_relative_eq!(m.cost(&matches), 5.0, epsilon = 1e-12);
    }
}
