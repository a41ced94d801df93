//! Average-scale sampling of transform chains.

use align_models::{Model2d, SimilarityModel2d};
use align_types::{Point, PointMatch};
use nalgebra::Point2;
use tracing::warn;

use crate::TransformList;

/// Sample the average scaling of a transform chain by pushing a grid of
/// points (spaced `dx` over `width × height`) through the chain and
/// fitting a similarity model to the samples.
///
/// Falls back to a scale factor of 1 when the samples cannot constrain a
/// similarity fit.
#[must_use]
pub fn sample_average_scale(chain: &TransformList, width: f64, height: f64, dx: f64) -> f64 {
    let mut samples = Vec::new();
    let mut y = 0.0;
    while y < height {
        let mut x = 0.0;
        while x < width {
            let p = Point2::new(x, y);
            samples.push(PointMatch::new(
                Point::new(p),
                Point::with_world(p, chain.apply(p)),
                1.0,
            ));
            x += dx;
        }
        y += dx;
    }

    let mut model = SimilarityModel2d::default();
    if let Err(e) = model.fit(&samples) {
        warn!(error = %e, "failed to fit scale samples, returning scale factor of 1");
        return 1.0;
    }
    model.scale()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TileTransform, TransformSpec};
    use approx::assert_relative_eq;

    fn chain_of(class_name: &str, data: &str) -> TransformList {
        TransformList(vec![TileTransform::from_spec(&TransformSpec {
            class_name: class_name.to_string(),
            data_string: data.to_string(),
        })
        .unwrap()])
    }

    #[test]
    fn identity_chain_has_unit_scale() {
        let chain = TransformList::default();
        assert_relative_eq!(
            sample_average_scale(&chain, 100.0, 100.0, 10.0),
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn doubling_affine_has_scale_two() {
        let chain = chain_of("AffineModel2D", "2 0 0 2 5 5");
        assert_relative_eq!(
            sample_average_scale(&chain, 100.0, 100.0, 10.0),
            2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn degenerate_sampling_falls_back_to_one() {
        // A single sample cannot constrain the fit.
        let chain = TransformList::default();
        assert_relative_eq!(
            sample_average_scale(&chain, 1.0, 1.0, 10.0),
            1.0,
            epsilon = 1e-12
        );
    }
}
