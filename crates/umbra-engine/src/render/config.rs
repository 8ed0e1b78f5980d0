use thiserror::Error;

use crate::scene::{LIGHT_CAMERA, MAIN_CAMERA};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("shadow map size {0} is not a power of two")]
    ShadowSizeNotPowerOfTwo(u32),

    #[error("shadow map size {size} exceeds the device texture limit {limit}")]
    ShadowSizeTooLarge { size: u32, limit: u32 },

    #[error("bloom radius {0} is outside 1..=7")]
    BlurRadius(u32),

    #[error("{name} must be positive and finite (got {value})")]
    NotPositive { name: &'static str, value: f32 },
}

/// Largest blur radius the post shader's weight table holds.
pub const MAX_BLUR_RADIUS: u32 = 7;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ToneMapOperator {
    Reinhard,
    #[default]
    Aces,
}

impl ToneMapOperator {
    pub(crate) fn shader_index(self) -> u32 {
        match self {
            ToneMapOperator::Reinhard => 0,
            ToneMapOperator::Aces => 1,
        }
    }
}

/// Which image the tone-map pass sends to the swap surface.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DebugView {
    /// Tone-mapped HDR + bloom.
    #[default]
    Final,
    Albedo,
    Normal,
    Depth,
    Bloom,
}

impl DebugView {
    pub(crate) fn shader_index(self) -> u32 {
        match self {
            DebugView::Final => 0,
            DebugView::Albedo => 1,
            DebugView::Normal => 2,
            DebugView::Depth => 3,
            DebugView::Bloom => 4,
        }
    }

    /// Cycles through the views; used by the demo's debug key.
    pub fn next(self) -> Self {
        match self {
            DebugView::Final => DebugView::Albedo,
            DebugView::Albedo => DebugView::Normal,
            DebugView::Normal => DebugView::Depth,
            DebugView::Depth => DebugView::Bloom,
            DebugView::Bloom => DebugView::Final,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShadowConfig {
    /// Square shadow map edge in texels; fixed at init, power of two.
    pub map_size: u32,
    /// Width and height of the light's orthographic box, world units.
    pub extent: f32,
    /// Distance from the anchor back along the light direction to the light eye.
    pub height: f32,
    pub depth_bias: i32,
    pub slope_bias: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BloomConfig {
    pub enabled: bool,
    /// Luminance above which pixels feed the bloom.
    pub threshold: f32,
    /// Gaussian falloff (sigma, in texels) of the separable blur.
    pub falloff: f32,
    /// Taps on each side of the center.
    pub radius: u32,
    /// Multiplier applied when compositing the blur onto the HDR image.
    pub strength: f32,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ToneMapConfig {
    pub operator: ToneMapOperator,
    pub exposure: f32,
}

/// Names the passes look cameras up by.
#[derive(Debug, Clone, PartialEq)]
pub struct PassCameras {
    pub geometry: String,
    pub shadow: String,
    pub lighting: String,
}

impl Default for PassCameras {
    fn default() -> Self {
        Self {
            geometry: MAIN_CAMERA.into(),
            shadow: LIGHT_CAMERA.into(),
            lighting: MAIN_CAMERA.into(),
        }
    }
}

/// Renderer settings fixed at init.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub shadow: ShadowConfig,
    pub bloom: BloomConfig,
    pub tone_map: ToneMapConfig,
    pub cameras: PassCameras,
    pub debug_view: DebugView,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            shadow: ShadowConfig {
                map_size: 2048,
                extent: 40.0,
                height: 60.0,
                depth_bias: 2,
                slope_bias: 2.0,
            },
            bloom: BloomConfig {
                enabled: true,
                threshold: 1.0,
                falloff: 2.5,
                radius: 6,
                strength: 0.6,
            },
            tone_map: ToneMapConfig {
                operator: ToneMapOperator::Aces,
                exposure: 1.0,
            },
            cameras: PassCameras::default(),
            debug_view: DebugView::Final,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self, max_texture_size: u32) -> Result<(), ConfigError> {
        let size = self.shadow.map_size;
        if !size.is_power_of_two() {
            return Err(ConfigError::ShadowSizeNotPowerOfTwo(size));
        }
        if size > max_texture_size {
            return Err(ConfigError::ShadowSizeTooLarge {
                size,
                limit: max_texture_size,
            });
        }
        if !(1..=MAX_BLUR_RADIUS).contains(&self.bloom.radius) {
            return Err(ConfigError::BlurRadius(self.bloom.radius));
        }
        for (name, value) in [
            ("shadow extent", self.shadow.extent),
            ("shadow height", self.shadow.height),
            ("bloom falloff", self.bloom.falloff),
            ("exposure", self.tone_map.exposure),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(RendererConfig::default().validate(8192), Ok(()));
    }

    #[test]
    fn shadow_map_must_be_power_of_two() {
        let mut c = RendererConfig::default();
        c.shadow.map_size = 1000;
        assert_eq!(c.validate(8192), Err(ConfigError::ShadowSizeNotPowerOfTwo(1000)));
        c.shadow.map_size = 16384;
        assert!(matches!(c.validate(8192), Err(ConfigError::ShadowSizeTooLarge { .. })));
    }

    #[test]
    fn blur_radius_is_bounded() {
        let mut c = RendererConfig::default();
        c.bloom.radius = 0;
        assert_eq!(c.validate(8192), Err(ConfigError::BlurRadius(0)));
        c.bloom.radius = MAX_BLUR_RADIUS + 1;
        assert!(c.validate(8192).is_err());
    }

    #[test]
    fn non_positive_exposure_is_rejected() {
        let mut c = RendererConfig::default();
        c.tone_map.exposure = 0.0;
        assert!(matches!(c.validate(8192), Err(ConfigError::NotPositive { name: "exposure", .. })));
    }

    #[test]
    fn debug_view_cycle_returns_to_final() {
        let mut v = DebugView::Final;
        for _ in 0..5 {
            v = v.next();
        }
        assert_eq!(v, DebugView::Final);
    }
}
