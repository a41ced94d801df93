//! Alignment parameters.

use align_models::ModelKind;

use crate::{ElasticError, ElasticResult};

/// Tuning parameters of an elastic alignment run.
///
/// Defaults mirror the historical production settings; the solve operates
/// in layer-scaled units, so `max_stretch` and `max_epsilon` are given in
/// full-resolution pixels and scaled internally.
#[derive(Debug, Clone, Copy)]
pub struct AlignParams {
    /// Width of the entire image across all layers, in pixels.
    pub image_width: f64,
    /// Height of the entire image across all layers, in pixels.
    pub image_height: f64,
    /// Model family used for per-layer pre-alignment.
    pub model: ModelKind,
    /// Global down-sampling factor for mesh geometry.
    pub layer_scale: f64,
    /// Spring-mesh lattice columns.
    pub mesh_resolution: usize,
    /// Spring-mesh stiffness.
    pub stiffness: f64,
    /// Spring-mesh damping per iteration.
    pub damp: f64,
    /// Spring stretch clip, in full-resolution pixels.
    pub max_stretch: f64,
    /// Convergence threshold, in full-resolution pixels.
    pub max_epsilon: f64,
    /// Iteration cap for both optimization stages.
    pub max_iterations: usize,
    /// Plateau-detection window width.
    pub max_plateau_width: usize,
    /// Use the historical fixed-count relaxation loop.
    pub use_legacy_optimizer: bool,
    /// How many neighboring layers to wire springs to.
    pub max_layer_distance: i64,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            image_width: 0.0,
            image_height: 0.0,
            model: ModelKind::Rigid,
            layer_scale: 0.1,
            mesh_resolution: 32,
            stiffness: 0.1,
            damp: 0.9,
            max_stretch: 2000.0,
            max_epsilon: 200.0,
            max_iterations: 1000,
            max_plateau_width: 200,
            use_legacy_optimizer: false,
            max_layer_distance: 1,
        }
    }
}

impl AlignParams {
    /// Parameters for a stack of `image_width × image_height` layers.
    #[must_use]
    pub fn sized(image_width: f64, image_height: f64) -> Self {
        Self {
            image_width,
            image_height,
            ..Self::default()
        }
    }

    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    ///
    /// [`ElasticError::InvalidParameter`] for out-of-range values.
    pub fn validate(&self) -> ElasticResult<()> {
        let check = |ok: bool, name: &'static str, value: f64| {
            if ok {
                Ok(())
            } else {
                Err(ElasticError::InvalidParameter { name, value })
            }
        };
        check(self.image_width > 0.0, "image_width", self.image_width)?;
        check(self.image_height > 0.0, "image_height", self.image_height)?;
        check(
            self.layer_scale > 0.0 && self.layer_scale <= 1.0,
            "layer_scale",
            self.layer_scale,
        )?;
        check(
            self.damp > 0.0 && self.damp <= 1.0,
            "damp",
            self.damp,
        )?;
        #[allow(clippy::cast_precision_loss)]
        check(
            self.mesh_resolution >= 2,
            "mesh_resolution",
            self.mesh_resolution as f64,
        )?;
        #[allow(clippy::cast_precision_loss)]
        check(
            self.max_layer_distance >= 1,
            "max_layer_distance",
            self.max_layer_distance as f64,
        )?;
        Ok(())
    }

    /// Mesh width in scaled units.
    #[must_use]
    pub fn mesh_width(&self) -> f64 {
        (self.image_width * self.layer_scale).ceil()
    }

    /// Mesh height in scaled units.
    #[must_use]
    pub fn mesh_height(&self) -> f64 {
        (self.image_height * self.layer_scale).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_with_dimensions() {
        assert!(AlignParams::default().validate().is_err());
        assert!(AlignParams::sized(4096.0, 4096.0).validate().is_ok());
    }

    #[test]
    fn mesh_dimensions_are_ceiled() {
        let p = AlignParams::sized(1001.0, 999.0);
        assert_eq!(p.mesh_width(), 101.0);
        assert_eq!(p.mesh_height(), 100.0);
    }

    #[test]
    fn bad_scale_is_rejected() {
        let mut p = AlignParams::sized(100.0, 100.0);
        p.layer_scale = 0.0;
        assert!(matches!(
            p.validate(),
            Err(ElasticError::InvalidParameter { name: "layer_scale", .. })
        ));
    }
}
