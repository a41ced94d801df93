//! Wire types for tile-spec and correspondence JSON files.

use align_types::{Point, PointMatch};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One coordinate transform of a tile's transform chain, discriminated by
/// class name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSpec {
    /// Discriminator naming the transform kind.
    pub class_name: String,
    /// The transform's serialized parameters.
    pub data_string: String,
}

/// One image tile of a layer, with its transform chain into world space.
///
/// Fields this pipeline does not interpret round-trip untouched through
/// `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSpec {
    /// Stable tile identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_id: Option<String>,
    /// Layer (z-section) index; `-1` means absent and is a hard error for
    /// alignment inputs.
    #[serde(default = "default_layer")]
    pub layer: i64,
    /// World bounding box `[min_x, max_x, min_y, max_y]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Ordered transform chain from local pixels to world.
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    /// Source image width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Source image height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Optional fractional section coordinate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Mipmap pyramid description, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mipmap_levels: Option<Value>,
    /// Unrecognized fields, preserved for round-tripping.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_layer() -> i64 {
    -1
}

impl TileSpec {
    /// Whether the tile carries a usable layer index.
    #[must_use]
    pub const fn has_layer(&self) -> bool {
        self.layer != -1
    }
}

/// A point as serialized in correspondence files: local and world
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSpec {
    /// Local position.
    pub l: [f64; 2],
    /// World position.
    pub w: [f64; 2],
}

impl From<PointSpec> for Point {
    fn from(p: PointSpec) -> Self {
        Self::with_world(
            Point2::new(p.l[0], p.l[1]),
            Point2::new(p.w[0], p.w[1]),
        )
    }
}

impl From<Point> for PointSpec {
    fn from(p: Point) -> Self {
        Self {
            l: [p.local.x, p.local.y],
            w: [p.world.x, p.world.y],
        }
    }
}

/// A weighted pair of corresponding points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPairSpec {
    /// Point in the first layer's frame.
    pub p1: PointSpec,
    /// Point in the second layer's frame.
    pub p2: PointSpec,
    /// Match weight.
    #[serde(default = "default_weight")]
    pub w: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl From<PointPairSpec> for PointMatch {
    fn from(p: PointPairSpec) -> Self {
        Self::new(p.p1.into(), p.p2.into(), p.w)
    }
}

/// Point-match correspondences between two tile-spec files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrespondenceSpec {
    /// Tile-spec file of the first layer.
    pub url1: String,
    /// Tile-spec file of the second layer.
    pub url2: String,
    /// The matches; `p1` lives in the first layer's frame.
    #[serde(default)]
    pub correspondence_point_pairs: Vec<PointPairSpec>,
    /// Whether the two layers should also be joined in the rigid
    /// pre-alignment graph. Matches always drive mesh deformation.
    #[serde(default)]
    pub should_connect: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_spec_preserves_unknown_fields() {
        let json = r#"{
            "tileId": "t0",
            "layer": 3,
            "bbox": [0.0, 100.0, 0.0, 80.0],
            "transforms": [
                {"className": "TranslationModel2D", "dataString": "1 2"}
            ],
            "width": 100.0,
            "height": 80.0,
            "maskUrl": "file:///mask.png"
        }"#;
        let ts: TileSpec = serde_json::from_str(json).unwrap();
        assert_eq!(ts.tile_id.as_deref(), Some("t0"));
        assert_eq!(ts.layer, 3);
        assert!(ts.has_layer());
        assert_eq!(ts.extra.get("maskUrl").unwrap(), "file:///mask.png");

        let out = serde_json::to_value(&ts).unwrap();
        assert_eq!(out["maskUrl"], "file:///mask.png");
        assert_eq!(out["transforms"][0]["className"], "TranslationModel2D");
    }

    #[test]
    fn missing_layer_defaults_to_sentinel() {
        let ts: TileSpec = serde_json::from_str(r#"{"transforms": []}"#).unwrap();
        assert_eq!(ts.layer, -1);
        assert!(!ts.has_layer());
    }

    #[test]
    fn correspondence_defaults() {
        let json = r#"{
            "url1": "a.json",
            "url2": "b.json",
            "correspondencePointPairs": [
                {"p1": {"l": [1, 2], "w": [1, 2]}, "p2": {"l": [3, 4], "w": [3, 4]}}
            ]
        }"#;
        let cs: CorrespondenceSpec = serde_json::from_str(json).unwrap();
        assert!(!cs.should_connect);
        let m: PointMatch = cs.correspondence_point_pairs[0].into();
        assert_eq!(m.weight, 1.0);
        assert_eq!(m.p1.local, Point2::new(1.0, 2.0));
        assert_eq!(m.p2.world, Point2::new(3.0, 4.0));
    }

    #[test]
    fn point_spec_round_trips() {
        let p = Point::with_world(Point2::new(1.5, 2.5), Point2::new(3.5, 4.5));
        let spec: PointSpec = p.into();
        let back: Point = spec.into();
        assert_eq!(p, back);
    }
}
