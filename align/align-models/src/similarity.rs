//! Similarity (rotation + uniform scale + translation) transforms.

use align_types::PointMatch;
use nalgebra::{Point2, Vector2};

use crate::model::weighted_centroids;
use crate::{AffineModel2d, Model2d, ModelError, ModelResult};

/// A 2D similarity transform `p ↦ s R(θ) p + t`, stored as the scaled
/// rotation column `(a, b) = (s cos θ, s sin θ)` plus a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityModel2d {
    /// `s · cos θ`.
    pub scos: f64,
    /// `s · sin θ`.
    pub ssin: f64,
    /// Translation vector.
    pub translation: Vector2<f64>,
}

impl Default for SimilarityModel2d {
    fn default() -> Self {
        Self {
            scos: 1.0,
            ssin: 0.0,
            translation: Vector2::zeros(),
        }
    }
}

impl SimilarityModel2d {
    /// Create a similarity from its scaled rotation column and translation.
    #[must_use]
    pub const fn new(scos: f64, ssin: f64, tx: f64, ty: f64) -> Self {
        Self {
            scos,
            ssin,
            translation: Vector2::new(tx, ty),
        }
    }

    /// The uniform scale factor.
    #[must_use]
    pub fn scale(&self) -> f64 {
        (self.scos * self.scos + self.ssin * self.ssin).sqrt()
    }

    /// The equivalent affine model.
    #[must_use]
    pub fn to_affine(&self) -> AffineModel2d {
        AffineModel2d::new(
            self.scos,
            self.ssin,
            -self.ssin,
            self.scos,
            self.translation.x,
            self.translation.y,
        )
    }

    fn linear(&self, v: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.scos * v.x - self.ssin * v.y,
            self.ssin * v.x + self.scos * v.y,
        )
    }
}

impl Model2d for SimilarityModel2d {
    fn min_matches(&self) -> usize {
        2
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(self.linear(p.coords) + self.translation)
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        let det = self.scos * self.scos + self.ssin * self.ssin;
        if det <= f64::MIN_POSITIVE || !det.is_finite() {
            return Err(ModelError::NonInvertible { determinant: det });
        }
        let d = p.coords - self.translation;
        Ok(Point2::new(
            (self.scos * d.x + self.ssin * d.y) / det,
            (-self.ssin * d.x + self.scos * d.y) / det,
        ))
    }

    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        let needed = self.min_matches();
        let (pc, qc, _) = weighted_centroids(matches, needed)?;

        let mut xx = 0.0;
        let mut dot = 0.0;
        let mut cross = 0.0;
        for m in matches {
            let p = m.p1.local - pc;
            let q = m.p2.world - qc;
            xx += m.weight * (p.x * p.x + p.y * p.y);
            dot += m.weight * (p.x * q.x + p.y * q.y);
            cross += m.weight * (p.x * q.y - p.y * q.x);
        }
        if xx <= 0.0 || !xx.is_finite() {
            return Err(ModelError::NotEnoughDataPoints {
                needed,
                found: matches.len(),
            });
        }
        self.scos = dot / xx;
        self.ssin = cross / xx;
        self.translation = qc.coords - self.linear(pc.coords);
        Ok(())
    }

    fn to_array(&self) -> Vec<f64> {
        vec![
            self.scos,
            self.ssin,
            -self.ssin,
            self.scos,
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
        self.scos = values[0];
        self.ssin = values[1];
        self.translation = Vector2::new(values[4], values[5]);
        Ok(())
    }
}
