//! Restricted moving-least-squares coordinate transform.
//!
//! A [`MovingLeastSquares`] transform interpolates a deformation from a set
//! of weighted control-point matches: for every evaluation point a local
//! affine is fit with weights falling off as `1 / d^(2α)` and applied to
//! the point. A transform can be *restricted* to a tile's bounding box,
//! discarding control points that cannot influence it, which keeps the
//! per-tile descriptors compact for large meshes.
//!
//! Serialization is a compact whitespace-separated data string carrying
//! `α`, the influence radius, the restriction box, and the weighted
//! control list; see [`MovingLeastSquares::to_data_string`].
//!
//! # Example
//!
//! ```
//! use align_mls::{ControlPoint, MovingLeastSquares};
//! use nalgebra::Point2;
//!
//! let controls: Vec<ControlPoint> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]
//!     .iter()
//!     .map(|&(x, y)| ControlPoint {
//!         source: Point2::new(x, y),
//!         target: Point2::new(x + 5.0, y),
//!         weight: 1.0,
//!     })
//!     .collect();
//!
//! let mls = MovingLeastSquares::new(controls, 2.0).unwrap();
//! let p = mls.apply(Point2::new(4.0, 4.0));
//! assert!((p.x - 9.0).abs() < 1e-6);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod error;

pub use error::{MlsError, MlsResult};

use align_models::{AffineModel2d, Model2d};
use align_types::{Point, PointMatch};
use nalgebra::{Point2, Vector2};

/// A weighted source → target control-point match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Pre-deformation position.
    pub source: Point2<f64>,
    /// Post-deformation position.
    pub target: Point2<f64>,
    /// Non-negative confidence weight.
    pub weight: f64,
}

/// An unrestricted bounding box.
pub const UNRESTRICTED: [f64; 4] = [
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
];

/// A moving-least-squares transform over a set of control points,
/// optionally restricted to a bounding box.
///
/// Boxes use the `[min_x, max_x, min_y, max_y]` convention of tile specs.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingLeastSquares {
    alpha: f64,
    radius: f64,
    bbox: [f64; 4],
    controls: Vec<ControlPoint>,
}

impl MovingLeastSquares {
    /// Minimum control points for the local affine.
    const MIN_CONTROLS: usize = 3;

    /// Build an unrestricted transform from control points.
    ///
    /// The influence radius defaults to twice the median nearest-neighbor
    /// distance of the control sources.
    ///
    /// # Errors
    ///
    /// [`MlsError::NotEnoughDataPoints`] for fewer than 3 controls.
    pub fn new(controls: Vec<ControlPoint>, alpha: f64) -> MlsResult<Self> {
        if controls.len() < Self::MIN_CONTROLS {
            return Err(MlsError::NotEnoughDataPoints {
                needed: Self::MIN_CONTROLS,
                found: controls.len(),
            });
        }
        let radius = Self::default_radius(&controls);
        Ok(Self {
            alpha,
            radius,
            bbox: UNRESTRICTED,
            controls,
        })
    }

    /// Twice the median nearest-neighbor distance among the control
    /// sources.
    #[must_use]
    pub fn default_radius(controls: &[ControlPoint]) -> f64 {
        if controls.len() < 2 {
            return 0.0;
        }
        let mut nearest = Vec::with_capacity(controls.len());
        for (i, c) in controls.iter().enumerate() {
            let mut best = f64::INFINITY;
            for (j, o) in controls.iter().enumerate() {
                if i != j {
                    best = best.min((c.source - o.source).norm_squared());
                }
            }
            nearest.push(best.sqrt());
        }
        nearest.sort_by(f64::total_cmp);
        2.0 * nearest[nearest.len() / 2]
    }

    /// The weight falloff exponent `α`.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// The influence radius used to inflate restriction boxes.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The restriction box `[min_x, max_x, min_y, max_y]`.
    #[must_use]
    pub fn bbox(&self) -> [f64; 4] {
        self.bbox
    }

    /// The control points.
    #[must_use]
    pub fn controls(&self) -> &[ControlPoint] {
        &self.controls
    }

    /// Restrict the transform to `bbox`, keeping only control points
    /// within the box inflated by the influence radius.
    ///
    /// When fewer than 3 controls survive, the 3 controls nearest to the
    /// box center are kept instead so evaluation inside the box still has
    /// an affine to fall back on.
    #[must_use]
    pub fn restrict_to(&self, bbox: [f64; 4]) -> Self {
        let [min_x, max_x, min_y, max_y] = bbox;
        let r = self.radius;
        let mut kept: Vec<ControlPoint> = self
            .controls
            .iter()
            .filter(|c| {
                c.source.x >= min_x - r
                    && c.source.x <= max_x + r
                    && c.source.y >= min_y - r
                    && c.source.y <= max_y + r
            })
            .copied()
            .collect();
        if kept.len() < Self::MIN_CONTROLS {
            let center = Point2::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
            let mut by_distance: Vec<ControlPoint> = self.controls.clone();
            by_distance.sort_by(|a, b| {
                f64::total_cmp(
                    &(a.source - center).norm_squared(),
                    &(b.source - center).norm_squared(),
                )
            });
            by_distance.truncate(Self::MIN_CONTROLS);
            kept = by_distance;
        }
        Self {
            alpha: self.alpha,
            radius: self.radius,
            bbox,
            controls: kept,
        }
    }

    /// Evaluate the transform at `p`.
    ///
    /// A point coinciding exactly with a control source maps to that
    /// control's target. Where the weighted affine fit degenerates, the
    /// weighted mean displacement is applied instead.
    #[must_use]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let mut matches = Vec::with_capacity(self.controls.len());
        for c in &self.controls {
            let d2 = (p - c.source).norm_squared();
            if d2 == 0.0 {
                return c.target;
            }
            let w = c.weight / d2.powf(self.alpha);
            matches.push(PointMatch::new(
                Point::new(c.source),
                Point::with_world(c.source, c.target),
                w,
            ));
        }

        let mut affine = AffineModel2d::default();
        if affine.fit(&matches).is_ok() {
            return affine.apply(p);
        }

        // Degenerate local geometry: translate by the weighted mean
        // displacement.
        let mut sw = 0.0;
        let mut disp = Vector2::zeros();
        for m in &matches {
            sw += m.weight;
            disp += m.weight * (m.p2.world - m.p1.local);
        }
        if sw > 0.0 {
            p + disp / sw
        } else {
            p
        }
    }

    /// Serialize to the compact data string
    /// `"α radius min_x max_x min_y max_y n (sx sy tx ty w)×n"`.
    #[must_use]
    pub fn to_data_string(&self) -> String {
        use std::fmt::Write as _;
        let mut s = String::new();
        let _ = write!(
            s,
            "{} {} {} {} {} {} {}",
            self.alpha,
            self.radius,
            self.bbox[0],
            self.bbox[1],
            self.bbox[2],
            self.bbox[3],
            self.controls.len()
        );
        for c in &self.controls {
            let _ = write!(
                s,
                " {} {} {} {} {}",
                c.source.x, c.source.y, c.target.x, c.target.y, c.weight
            );
        }
        s
    }

    /// Parse a transform serialized by
    /// [`MovingLeastSquares::to_data_string`].
    ///
    /// # Errors
    ///
    /// [`MlsError::BadDataString`] on malformed input and
    /// [`MlsError::NotEnoughDataPoints`] when the control list is shorter
    /// than 3.
    pub fn from_data_string(data: &str) -> MlsResult<Self> {
        let bad = |message: &str| MlsError::BadDataString {
            message: message.to_string(),
        };
        let mut tokens = data.split_whitespace().map(str::parse::<f64>);
        let mut next = |name: &'static str| -> MlsResult<f64> {
            tokens
                .next()
                .ok_or_else(|| bad(&format!("missing {name}")))?
                .map_err(|_| bad(&format!("unparsable {name}")))
        };

        let alpha = next("alpha")?;
        let radius = next("radius")?;
        let bbox = [next("min_x")?, next("max_x")?, next("min_y")?, next("max_y")?];
        let count = next("control count")?;
        if !(count.is_finite() && count >= 0.0 && count.fract() == 0.0) {
            return Err(bad("control count is not a non-negative integer"));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = count as usize;
        let mut controls = Vec::with_capacity(count);
        for _ in 0..count {
            let sx = next("source x")?;
            let sy = next("source y")?;
            let tx = next("target x")?;
            let ty = next("target y")?;
            let weight = next("weight")?;
            controls.push(ControlPoint {
                source: Point2::new(sx, sy),
                target: Point2::new(tx, ty),
                weight,
            });
        }
        if controls.len() < Self::MIN_CONTROLS {
            return Err(MlsError::NotEnoughDataPoints {
                needed: Self::MIN_CONTROLS,
                found: controls.len(),
            });
        }
        Ok(Self {
            alpha,
            radius,
            bbox,
            controls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_controls(offset: Vector2<f64>) -> Vec<ControlPoint> {
        let mut out = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                let p = Point2::new(f64::from(i) * 10.0, f64::from(j) * 10.0);
                out.push(ControlPoint {
                    source: p,
                    target: p + offset,
                    weight: 1.0,
                });
            }
        }
        out
    }

    #[test]
    fn too_few_controls_is_an_error() {
        let controls = grid_controls(Vector2::zeros())
            .into_iter()
            .take(2)
            .collect();
        assert!(matches!(
            MovingLeastSquares::new(controls, 2.0),
            Err(MlsError::NotEnoughDataPoints { needed: 3, found: 2 })
        ));
    }

    #[test]
    fn default_radius_is_twice_median_spacing() {
        let controls = grid_controls(Vector2::zeros());
        assert_relative_eq!(
            MovingLeastSquares::default_radius(&controls),
            20.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn exact_hit_returns_the_control_target() {
        let mls =
            MovingLeastSquares::new(grid_controls(Vector2::new(1.0, 2.0)), 2.0).unwrap();
        let p = mls.apply(Point2::new(20.0, 30.0));
        assert_eq!(p, Point2::new(21.0, 32.0));
    }

    #[test]
    fn uniform_translation_is_reproduced_everywhere() {
        let mls =
            MovingLeastSquares::new(grid_controls(Vector2::new(-4.0, 7.0)), 2.0).unwrap();
        for p in [
            Point2::new(3.3, 4.4),
            Point2::new(25.1, 17.9),
            Point2::new(45.0, 45.0),
        ] {
            let q = mls.apply(p);
            assert_relative_eq!(q.x, p.x - 4.0, epsilon = 1e-6);
            assert_relative_eq!(q.y, p.y + 7.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn restriction_drops_distant_controls() {
        let mls = MovingLeastSquares::new(grid_controls(Vector2::zeros()), 2.0).unwrap();
        let restricted = mls.restrict_to([0.0, 10.0, 0.0, 10.0]);
        // Box inflated by radius 20 keeps sources with x, y ≤ 30.
        assert!(restricted.controls().len() < mls.controls().len());
        assert!(restricted
            .controls()
            .iter()
            .all(|c| c.source.x <= 30.0 && c.source.y <= 30.0));
        // Evaluation inside the box is unchanged for the identity field.
        let q = restricted.apply(Point2::new(5.0, 5.0));
        assert_relative_eq!(q.x, 5.0, epsilon = 1e-6);
        assert_relative_eq!(q.y, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn far_box_falls_back_to_nearest_three() {
        let mls = MovingLeastSquares::new(grid_controls(Vector2::zeros()), 2.0).unwrap();
        let restricted = mls.restrict_to([1000.0, 1010.0, 1000.0, 1010.0]);
        assert_eq!(restricted.controls().len(), 3);
    }

    #[test]
    fn data_string_round_trips() {
        let mls = MovingLeastSquares::new(grid_controls(Vector2::new(0.3, -0.7)), 2.0)
            .unwrap()
            .restrict_to([0.0, 40.0, 0.0, 40.0]);
        let parsed = MovingLeastSquares::from_data_string(&mls.to_data_string()).unwrap();
        assert_eq!(mls, parsed);
        for p in [Point2::new(1.0, 2.0), Point2::new(33.0, 21.0)] {
            let a = mls.apply(p);
            let b = parsed.apply(p);
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn malformed_data_string_is_rejected() {
        assert!(matches!(
            MovingLeastSquares::from_data_string("2.0 1.0"),
            Err(MlsError::BadDataString { .. })
        ));
        assert!(matches!(
            MovingLeastSquares::from_data_string("2.0 1.0 0 1 0 1 x"),
            Err(MlsError::BadDataString { .. })
        ));
    }

    #[test]
    fn collinear_controls_fall_back_to_translation() {
        let controls: Vec<ControlPoint> = (0..4)
            .map(|i| {
                let p = Point2::new(f64::from(i) * 5.0, 0.0);
                ControlPoint {
                    source: p,
                    target: p + Vector2::new(2.0, 0.0),
                    weight: 1.0,
                }
            })
            .collect();
        let mls = MovingLeastSquares::new(controls, 2.0).unwrap();
        let q = mls.apply(Point2::new(7.0, 3.0));
        assert_relative_eq!(q.x, 9.0, epsilon = 1e-9);
        assert_relative_eq!(q.y, 3.0, epsilon = 1e-9);
    }
}
