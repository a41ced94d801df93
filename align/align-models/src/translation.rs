//! Pure translation.

use align_types::PointMatch;
use nalgebra::{Point2, Vector2};

use crate::model::weighted_centroids;
use crate::{AffineModel2d, Model2d, ModelError, ModelResult};

/// A 2D translation `p ↦ p + t`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TranslationModel2d {
    /// Translation vector.
    pub translation: Vector2<f64>,
}

impl TranslationModel2d {
    /// Create a translation by `(tx, ty)`.
    #[must_use]
    pub const fn new(tx: f64, ty: f64) -> Self {
        Self {
            translation: Vector2::new(tx, ty),
        }
    }

    /// The equivalent affine model.
    #[must_use]
    pub fn to_affine(&self) -> AffineModel2d {
        AffineModel2d::new(
            1.0,
            0.0,
            0.0,
            1.0,
            self.translation.x,
            self.translation.y,
        )
    }
}

impl Model2d for TranslationModel2d {
    fn min_matches(&self) -> usize {
        1
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        p + self.translation
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        Ok(p - self.translation)
    }

    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        let (pc, qc, _) = weighted_centroids(matches, self.min_matches())?;
        self.translation = qc - pc;
        Ok(())
    }

    fn to_array(&self) -> Vec<f64> {
        vec![
            1.0,
            0.0,
            0.0,
            1.0,
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
        self.translation = Vector2::new(values[4], values[5]);
        Ok(())
    }
}
