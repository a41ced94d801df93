//! World ↔ local coordinate lookup across a layer's tiles.

use nalgebra::Point2;
use tracing::{info, warn};

use crate::{SpecError, SpecResult, TileSpec, TransformList};

/// Coordinate data resolved for one tile.
#[derive(Debug, Clone)]
pub struct TileCoordinates {
    /// The tile the coordinates belong to.
    pub tile_id: Option<String>,
    /// Whether this tile is the visible one at the position (the last
    /// tile in render order wins in overlaps).
    pub visible: bool,
    /// Local coordinates, for world → local lookups.
    pub local: Option<[f64; 2]>,
    /// World coordinates, for local → world lookups.
    pub world: Option<[f64; 2]>,
}

/// Resolve the local coordinates of world position `(x, y)` in every tile
/// that can invert it.
///
/// Tiles whose transform chain is not invertible at the point are skipped
/// with a warning; the last surviving tile is marked visible.
///
/// # Errors
///
/// [`SpecError::NonInvertible`] when no tile survives, and
/// [`SpecError::BadTransform`] when a chain cannot be parsed at all.
pub fn world_to_local(tiles: &[TileSpec], x: f64, y: f64) -> SpecResult<Vec<TileCoordinates>> {
    let mut resolved = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    for tile in tiles {
        let chain = TransformList::from_specs(&tile.transforms)?;
        match chain.apply_inverse(Point2::new(x, y)) {
            Ok(local) => resolved.push(TileCoordinates {
                tile_id: tile.tile_id.clone(),
                visible: false,
                local: Some([local.x, local.y]),
                world: Some([x, y]),
            }),
            Err(SpecError::NonInvertible { .. }) => {
                skipped.push(tile.tile_id.clone().unwrap_or_default());
            }
            Err(e) => return Err(e),
        }
    }

    if resolved.is_empty() {
        return Err(SpecError::NonInvertible { x, y });
    }
    if let Some(last) = resolved.last_mut() {
        last.visible = true;
    }
    if !skipped.is_empty() {
        info!(
            x,
            y,
            skipped = ?skipped,
            "skipped inverse transform for non-invertible tiles"
        );
    }
    Ok(resolved)
}

/// Resolve the world coordinates of local position `(x, y)` in one tile.
///
/// # Errors
///
/// [`SpecError::BadTransform`] when the chain cannot be parsed.
pub fn local_to_world(tile: &TileSpec, x: f64, y: f64) -> SpecResult<TileCoordinates> {
    let chain = TransformList::from_specs(&tile.transforms)?;
    let world = chain.apply(Point2::new(x, y));
    if !(world.x.is_finite() && world.y.is_finite()) {
        warn!(tile = ?tile.tile_id, x, y, "local position maps to a non-finite world point");
    }
    Ok(TileCoordinates {
        tile_id: tile.tile_id.clone(),
        visible: false,
        local: Some([x, y]),
        world: Some([world.x, world.y]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformSpec;

    fn tile(id: &str, transforms: &[(&str, &str)]) -> TileSpec {
        serde_json::from_value(serde_json::json!({
            "tileId": id,
            "layer": 0,
            "transforms": transforms
                .iter()
                .map(|(c, d)| serde_json::json!({"className": c, "dataString": d}))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn overlapping_tiles_resolve_with_last_visible() {
        let tiles = vec![
            tile("a", &[("TranslationModel2D", "10 0")]),
            tile("b", &[("TranslationModel2D", "0 10")]),
        ];
        let coords = world_to_local(&tiles, 100.0, 100.0).unwrap();
        assert_eq!(coords.len(), 2);
        assert!(!coords[0].visible);
        assert!(coords[1].visible);
        assert_eq!(coords[0].local, Some([90.0, 100.0]));
        assert_eq!(coords[1].local, Some([100.0, 90.0]));
    }

    #[test]
    fn non_invertible_tile_is_skipped() {
        let tiles = vec![
            tile("flat", &[("AffineModel2D", "0 0 0 0 0 0")]),
            tile("ok", &[("TranslationModel2D", "1 1")]),
        ];
        let coords = world_to_local(&tiles, 100.0, 100.0).unwrap();
        assert_eq!(coords.len(), 1);
        assert_eq!(coords[0].tile_id.as_deref(), Some("ok"));
        assert!(coords[0].visible);
    }

    #[test]
    fn no_survivor_is_an_error() {
        let tiles = vec![tile("flat", &[("AffineModel2D", "0 0 0 0 0 0")])];
        let err = world_to_local(&tiles, 5.0, 5.0).unwrap_err();
        assert!(matches!(err, SpecError::NonInvertible { .. }));
    }

    #[test]
    fn local_to_world_applies_chain() {
        let t = tile("a", &[("TranslationModel2D", "2 3")]);
        let c = local_to_world(&t, 1.0, 1.0).unwrap();
        assert_eq!(c.world, Some([3.0, 4.0]));
    }
}
