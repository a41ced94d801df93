//! The model trait and the tagged-variant model family.

use align_types::{pairwise_mean, PointMatch};
use nalgebra::Point2;

use crate::{
    AffineModel2d, HomographyModel2d, ModelError, ModelResult, RigidModel2d, SimilarityModel2d,
    TranslationModel2d,
};

/// A parametric 2D coordinate transform that can be estimated from weighted
/// point matches.
///
/// Fits map each match's `p1` local position onto its `p2` world position,
/// minimizing the weighted squared transfer error.
pub trait Model2d {
    /// Minimum number of point matches required by [`Model2d::fit`].
    fn min_matches(&self) -> usize;

    /// Apply the transform to a point.
    fn apply(&self, p: Point2<f64>) -> Point2<f64>;

    /// Apply the inverse transform to a point.
    ///
    /// # Errors
    ///
    /// [`ModelError::NonInvertible`] when the linear part is singular.
    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>>;

    /// Estimate the model parameters from weighted point matches.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotEnoughDataPoints`] when fewer than
    /// [`Model2d::min_matches`] matches are given, when all weights vanish,
    /// or when the normal equations are singular.
    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()>;

    /// The canonical flat parameter vector: 6 values
    /// `[m00, m10, m01, m11, tx, ty]` for the affine family, 9 row-major
    /// values for the homography.
    fn to_array(&self) -> Vec<f64>;

    /// Restore the model from its canonical flat parameter vector.
    ///
    /// # Errors
    ///
    /// [`ModelError::BadParameterCount`] on a length mismatch.
    fn set_from_array(&mut self, values: &[f64]) -> ModelResult<()>;

    /// Mean world-space transfer error of the matches under this model.
    fn cost(&self, matches: &[PointMatch]) -> f64 {
        if matches.is_empty() {
            return 0.0;
        }
        let distances: Vec<f64> = matches
            .iter()
            .map(|m| (self.apply(m.p1.local) - m.p2.world).norm())
            .collect();
        pairwise_mean(&distances)
    }
}

/// Discriminator for the supported model family.
///
/// The numeric values match the `--modelIndex` CLI convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Pure translation (1 match).
    Translation,
    /// Rotation + translation (2 matches).
    Rigid,
    /// Rotation + uniform scale + translation (2 matches).
    Similarity,
    /// Full affine (3 matches).
    Affine,
    /// Projective homography (4 matches).
    Homography,
}

impl ModelKind {
    /// Map a CLI model index (0..=4) onto a kind.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Translation),
            1 => Some(Self::Rigid),
            2 => Some(Self::Similarity),
            3 => Some(Self::Affine),
            4 => Some(Self::Homography),
            _ => None,
        }
    }
}

/// A model of any supported kind, dispatching [`Model2d`] to the concrete
/// parameterization.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    /// Translation model.
    Translation(TranslationModel2d),
    /// Rigid model.
    Rigid(RigidModel2d),
    /// Similarity model.
    Similarity(SimilarityModel2d),
    /// Affine model.
    Affine(AffineModel2d),
    /// Homography model.
    Homography(HomographyModel2d),
}

impl Model {
    /// Create an identity model of the given kind.
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Translation => Self::Translation(TranslationModel2d::default()),
            ModelKind::Rigid => Self::Rigid(RigidModel2d::default()),
            ModelKind::Similarity => Self::Similarity(SimilarityModel2d::default()),
            ModelKind::Affine => Self::Affine(AffineModel2d::default()),
            ModelKind::Homography => Self::Homography(HomographyModel2d::default()),
        }
    }

    /// The kind of this model.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Translation(_) => ModelKind::Translation,
            Self::Rigid(_) => ModelKind::Rigid,
            Self::Similarity(_) => ModelKind::Similarity,
            Self::Affine(_) => ModelKind::Affine,
            Self::Homography(_) => ModelKind::Homography,
        }
    }

    /// Reset the model to the identity of its kind.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind());
    }

    /// The equivalent affine model, when the model is in the affine family.
    #[must_use]
    pub fn to_affine(&self) -> Option<AffineModel2d> {
        match self {
            Self::Translation(m) => Some(m.to_affine()),
            Self::Rigid(m) => Some(m.to_affine()),
            Self::Similarity(m) => Some(m.to_affine()),
            Self::Affine(m) => Some(*m),
            Self::Homography(_) => None,
        }
    }

    fn inner(&self) -> &dyn Model2d {
        match self {
            Self::Translation(m) => m,
            Self::Rigid(m) => m,
            Self::Similarity(m) => m,
            Self::Affine(m) => m,
            Self::Homography(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model2d {
        match self {
            Self::Translation(m) => m,
            Self::Rigid(m) => m,
            Self::Similarity(m) => m,
            Self::Affine(m) => m,
            Self::Homography(m) => m,
        }
    }
}

impl Model2d for Model {
    fn min_matches(&self) -> usize {
        self.inner().min_matches()
    }

    fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        self.inner().apply(p)
    }

    fn apply_inverse(&self, p: Point2<f64>) -> ModelResult<Point2<f64>> {
        self.inner().apply_inverse(p)
    }

    fn fit(&mut self, matches: &[PointMatch]) -> ModelResult<()> {
        self.inner_mut().fit(matches)
    }

    fn to_array(&self) -> Vec<f64> {
        self.inner().to_array()
    }

    fn set_from_array(&mut self, values: &[f64]) -> ModelResult<()> {
        self.inner_mut().set_from_array(values)
    }
}

/// Weighted centroids of the source (`p1.local`) and target (`p2.world`)
/// sides, plus the total weight.
pub(crate) fn weighted_centroids(
    matches: &[PointMatch],
    needed: usize,
) -> ModelResult<(Point2<f64>, Point2<f64>, f64)> {
    if matches.len() < needed {
        return Err(ModelError::NotEnoughDataPoints {
            needed,
            found: matches.len(),
        });
    }
    let mut sw = 0.0;
    let mut sp = Point2::origin().coords;
    let mut sq = Point2::origin().coords;
    for m in matches {
        sw += m.weight;
        sp += m.weight * m.p1.local.coords;
        sq += m.weight * m.p2.world.coords;
    }
    if sw <= 0.0 {
        return Err(ModelError::NotEnoughDataPoints {
            needed,
            found: 0,
        });
    }
    Ok((Point2::from(sp / sw), Point2::from(sq / sw), sw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_types::Point;

    #[test]
    fn kind_round_trips_through_index() {
        for i in 0..5 {
            let kind = ModelKind::from_index(i).unwrap();
            assert_eq!(Model::new(kind).kind(), kind);
        }
        assert!(ModelKind::from_index(5).is_none());
    }

    #[test]
    fn zero_total_weight_is_rejected() {
        let m = PointMatch::new(
            Point::new(Point2::new(1.0, 2.0)),
            Point::new(Point2::new(3.0, 4.0)),
            0.0,
        );
        let err = weighted_centroids(&[m, m], 1).unwrap_err();
        assert!(matches!(err, ModelError::NotEnoughDataPoints { .. }));
    }

    #[test]
    fn reset_restores_identity() {
        let mut m = Model::new(ModelKind::Rigid);
        m.set_from_array(&[0.0, 1.0, -1.0, 0.0, 5.0, 6.0]).unwrap();
        m.reset();
        let p = Point2::new(2.0, 3.0);
        assert_eq!(m.apply(p), p);
    }
}
