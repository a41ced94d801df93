//! Parsed transform chains.
//!
//! The `className` of a [`TransformSpec`] is a discriminator only; the
//! parameters live in `dataString`. Affine-family strings carry their
//! natural parameter counts (2, 3, 4, 6 or 9 floats); the MLS transform
//! has its own compact format.

use align_mls::MovingLeastSquares;
use align_models::{
    AffineModel2d, HomographyModel2d, Model2d, RigidModel2d, SimilarityModel2d,
    TranslationModel2d,
};
use nalgebra::Point2;

use crate::{SpecError, SpecResult, TransformSpec};

/// Class name emitted for appended MLS descriptors.
pub const MLS_CLASS_NAME: &str = "RestrictedMovingLeastSquaresTransform";

/// One parsed member of a tile's transform chain.
#[derive(Debug, Clone)]
pub enum TileTransform {
    /// Translation.
    Translation(TranslationModel2d),
    /// Rigid motion.
    Rigid(RigidModel2d),
    /// Similarity.
    Similarity(SimilarityModel2d),
    /// Affine.
    Affine(AffineModel2d),
    /// Homography.
    Homography(HomographyModel2d),
    /// Restricted moving-least-squares deformation.
    MovingLeastSquares(MovingLeastSquares),
}

fn parse_floats(spec: &TransformSpec, expected: usize) -> SpecResult<Vec<f64>> {
    let values: Result<Vec<f64>, _> = spec
        .data_string
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect();
    let values = values.map_err(|e| SpecError::BadTransform {
        class_name: spec.class_name.clone(),
        message: e.to_string(),
    })?;
    if values.len() != expected {
        return Err(SpecError::BadTransform {
            class_name: spec.class_name.clone(),
            message: format!("expected {expected} parameters, found {}", values.len()),
        });
    }
    Ok(values)
}

impl TileTransform {
    /// Parse a transform descriptor.
    ///
    /// # Errors
    ///
    /// [`SpecError::BadTransform`] for unknown class names or malformed
    /// parameter strings.
    pub fn from_spec(spec: &TransformSpec) -> SpecResult<Self> {
        let name = spec.class_name.as_str();
        if name.contains("MovingLeastSquares") {
            return MovingLeastSquares::from_data_string(&spec.data_string)
                .map(Self::MovingLeastSquares)
                .map_err(|e| SpecError::BadTransform {
                    class_name: spec.class_name.clone(),
                    message: e.to_string(),
                });
        }
        if name.contains("Translation") {
            let v = parse_floats(spec, 2)?;
            return Ok(Self::Translation(TranslationModel2d::new(v[0], v[1])));
        }
        if name.contains("Rigid") {
            let v = parse_floats(spec, 3)?;
            return Ok(Self::Rigid(RigidModel2d::from_angle(v[0], v[1], v[2])));
        }
        if name.contains("Similarity") {
            let v = parse_floats(spec, 4)?;
            return Ok(Self::Similarity(SimilarityModel2d::new(
                v[0], v[1], v[2], v[3],
            )));
        }
        if name.contains("Affine") {
            let v = parse_floats(spec, 6)?;
            return Ok(Self::Affine(AffineModel2d::new(
                v[0], v[1], v[2], v[3], v[4], v[5],
            )));
        }
        if name.contains("Homography") {
            let v = parse_floats(spec, 9)?;
            let mut h = HomographyModel2d::default();
            h.set_from_array(&v).map_err(|e| SpecError::BadTransform {
                class_name: spec.class_name.clone(),
                message: e.to_string(),
            })?;
            return Ok(Self::Homography(h));
        }
        Err(SpecError::BadTransform {
            class_name: spec.class_name.clone(),
            message: "unknown transform class".to_string(),
        })
    }

    /// Apply the transform to a point.
    #[must_use]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        match self {
            Self::Translation(m) => m.apply(p),
            Self::Rigid(m) => m.apply(p),
            Self::Similarity(m) => m.apply(p),
            Self::Affine(m) => m.apply(p),
            Self::Homography(m) => m.apply(p),
            Self::MovingLeastSquares(m) => m.apply(p),
        }
    }

    /// Apply the inverse transform to a point.
    ///
    /// # Errors
    ///
    /// [`SpecError::NonInvertible`] for singular members and for the MLS
    /// deformation, which has no closed-form inverse.
    pub fn apply_inverse(&self, p: Point2<f64>) -> SpecResult<Point2<f64>> {
        let non_invertible = |_| SpecError::NonInvertible { x: p.x, y: p.y };
        match self {
            Self::Translation(m) => m.apply_inverse(p).map_err(non_invertible),
            Self::Rigid(m) => m.apply_inverse(p).map_err(non_invertible),
            Self::Similarity(m) => m.apply_inverse(p).map_err(non_invertible),
            Self::Affine(m) => m.apply_inverse(p).map_err(non_invertible),
            Self::Homography(m) => m.apply_inverse(p).map_err(non_invertible),
            Self::MovingLeastSquares(_) => Err(SpecError::NonInvertible { x: p.x, y: p.y }),
        }
    }
}

/// A tile's full transform chain, applied first-to-last.
#[derive(Debug, Clone, Default)]
pub struct TransformList(pub Vec<TileTransform>);

impl TransformList {
    /// Parse a chain of descriptors.
    ///
    /// # Errors
    ///
    /// Propagates [`TileTransform::from_spec`] failures.
    pub fn from_specs(specs: &[TransformSpec]) -> SpecResult<Self> {
        specs
            .iter()
            .map(TileTransform::from_spec)
            .collect::<SpecResult<Vec<_>>>()
            .map(Self)
    }

    /// Apply the whole chain to a point.
    #[must_use]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        self.0.iter().fold(p, |p, t| t.apply(p))
    }

    /// Apply the whole chain's inverse to a point.
    ///
    /// # Errors
    ///
    /// [`SpecError::NonInvertible`] when any member cannot be inverted.
    pub fn apply_inverse(&self, p: Point2<f64>) -> SpecResult<Point2<f64>> {
        self.0
            .iter()
            .rev()
            .try_fold(p, |p, t| t.apply_inverse(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec(class_name: &str, data: &str) -> TransformSpec {
        TransformSpec {
            class_name: class_name.to_string(),
            data_string: data.to_string(),
        }
    }

    #[test]
    fn affine_chain_applies_in_order() {
        let chain = TransformList::from_specs(&[
            spec("mpicbg.trakem2.transform.TranslationModel2D", "1 0"),
            spec("mpicbg.trakem2.transform.AffineModel2D", "2 0 0 2 0 0"),
        ])
        .unwrap();
        // Translate then scale.
        assert_eq!(chain.apply(Point2::origin()), Point2::new(2.0, 0.0));
    }

    #[test]
    fn chain_inverse_reverses_order() {
        let chain = TransformList::from_specs(&[
            spec("TranslationModel2D", "5 -3"),
            spec("RigidModel2D", "0.5 1 2"),
        ])
        .unwrap();
        let p = Point2::new(7.0, 11.0);
        let q = chain.apply(p);
        let back = chain.apply_inverse(q).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn unknown_class_is_rejected() {
        let err = TileTransform::from_spec(&spec("SomethingElse", "1 2 3")).unwrap_err();
        assert!(matches!(err, SpecError::BadTransform { .. }));
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let err = TileTransform::from_spec(&spec("AffineModel2D", "1 2 3")).unwrap_err();
        assert!(matches!(err, SpecError::BadTransform { .. }));
    }

    #[test]
    fn singular_affine_inverse_fails() {
        let t = TileTransform::from_spec(&spec("AffineModel2D", "0 0 0 0 1 1")).unwrap();
        assert!(matches!(
            t.apply_inverse(Point2::origin()),
            Err(SpecError::NonInvertible { .. })
        ));
    }

    #[test]
    fn mls_descriptor_round_trips_through_chain() {
        use align_mls::ControlPoint;
        let controls: Vec<ControlPoint> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .iter()
            .map(|&(x, y)| ControlPoint {
                source: Point2::new(x, y),
                target: Point2::new(x + 1.0, y),
                weight: 1.0,
            })
            .collect();
        let mls = MovingLeastSquares::new(controls, 2.0).unwrap();
        let t = TileTransform::from_spec(&spec(MLS_CLASS_NAME, &mls.to_data_string())).unwrap();
        let q = t.apply(Point2::new(5.0, 5.0));
        assert_relative_eq!(q.x, 6.0, epsilon = 1e-6);
        assert_relative_eq!(q.y, 5.0, epsilon = 1e-6);
    }
}
