//! Local/world coordinate pairs and weighted point correspondences.

use nalgebra::Point2;

/// A pair of 2D coordinates: a fixed *local* position and a movable *world*
/// position.
///
/// A point is "applied" through a transform by overwriting its world
/// coordinates from its local ones; the local coordinates never change after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Local (pre-transform) position.
    pub local: Point2<f64>,
    /// World (post-transform) position.
    pub world: Point2<f64>,
}

impl Point {
    /// Create a point at rest: world coordinates equal local coordinates.
    #[must_use]
    pub const fn new(local: Point2<f64>) -> Self {
        Self {
            local,
            world: local,
        }
    }

    /// Create a point whose world position has already drifted away from its
    /// local position.
    #[must_use]
    pub const fn with_world(local: Point2<f64>, world: Point2<f64>) -> Self {
        Self { local, world }
    }

    /// Overwrite the world position from the local position through `f`.
    pub fn apply_with<F>(&mut self, f: F)
    where
        F: FnOnce(Point2<f64>) -> Point2<f64>,
    {
        self.world = f(self.local);
    }

    /// Squared distance between the world positions of two points.
    #[must_use]
    pub fn squared_world_distance(&self, other: &Self) -> f64 {
        (self.world - other.world).norm_squared()
    }
}

/// A weighted correspondence between two points in two coordinate frames.
///
/// The weight is clamped to be non-negative on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMatch {
    /// Point in the first frame.
    pub p1: Point,
    /// Point in the second frame.
    pub p2: Point,
    /// Non-negative confidence weight.
    pub weight: f64,
}

impl PointMatch {
    /// Create a match; negative weights are clamped to zero.
    #[must_use]
    pub fn new(p1: Point, p2: Point, weight: f64) -> Self {
        Self {
            p1,
            p2,
            weight: weight.max(0.0),
        }
    }

    /// The match with its two sides swapped.
    #[must_use]
    pub const fn flipped(&self) -> Self {
        Self {
            p1: self.p2,
            p2: self.p1,
            weight: self.weight,
        }
    }

    /// Current world-space transfer distance between the two sides.
    #[must_use]
    pub fn distance(&self) -> f64 {
        (self.p1.world - self.p2.world).norm()
    }
}

/// Unit in the last place of `x`: the gap to the next representable `f64`
/// above `|x|`.
#[must_use]
pub fn ulp(x: f64) -> f64 {
    let ax = x.abs();
    if !ax.is_finite() {
        return f64::INFINITY;
    }
    f64::from_bits(ax.to_bits() + 1) - ax
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_at_rest_has_equal_coordinates() {
        let p = Point::new(Point2::new(3.0, 4.0));
        assert_eq!(p.local, p.world);
    }

    #[test]
    fn apply_with_overwrites_world_from_local() {
        let mut p = Point::with_world(Point2::new(1.0, 2.0), Point2::new(9.0, 9.0));
        p.apply_with(|l| Point2::new(l.x + 1.0, l.y + 1.0));
        assert_eq!(p.world, Point2::new(2.0, 3.0));
        assert_eq!(p.local, Point2::new(1.0, 2.0));
    }

    #[test]
    fn negative_weight_is_clamped() {
        let p = Point::new(Point2::origin());
        let m = PointMatch::new(p, p, -0.5);
        assert_eq!(m.weight, 0.0);
    }

    #[test]
    fn flipped_swaps_sides() {
        let a = Point::new(Point2::new(1.0, 0.0));
        let b = Point::new(Point2::new(0.0, 1.0));
        let m = PointMatch::new(a, b, 2.0);
        let f = m.flipped();
        assert_eq!(f.p1, b);
        assert_eq!(f.p2, a);
        assert_eq!(f.weight, 2.0);
    }

    #[test]
    fn distance_is_world_space() {
        let a = Point::with_world(Point2::origin(), Point2::new(0.0, 0.0));
        let b = Point::with_world(Point2::origin(), Point2::new(3.0, 4.0));
        let m = PointMatch::new(a, b, 1.0);
        assert!((m.distance() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ulp_is_tiny_and_positive() {
        assert!(ulp(1.0) > 0.0);
        assert!(ulp(1.0) < 1e-15);
        assert_eq!(ulp(2.0), 2.0 * ulp(1.0));
    }
}
