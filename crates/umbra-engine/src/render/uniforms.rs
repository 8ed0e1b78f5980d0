//! Constant blocks as laid out in the WGSL shaders.
//!
//! Only `mat4x4<f32>` and `vec4` members, so the Rust and WGSL layouts agree
//! without padding fields.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::scene::{CameraSnapshot, Environment};

use super::config::{BloomConfig, DebugView, ToneMapConfig, MAX_BLUR_RADIUS};

/// Camera block shared by the geometry and shadow passes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// near, far, 0, 0
    pub near_far: [f32; 4],
}

impl FrameUniform {
    pub fn from_camera(camera: &CameraSnapshot) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: camera.view.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            near_far: [camera.near, camera.far, 0.0, 0.0],
        }
    }
}

/// Per-subset block of the geometry and shadow passes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct DrawUniform {
    pub base_color: [f32; 4],
    /// skinned flag, bones per instance, 0, 0
    pub skin: [u32; 4],
}

impl DrawUniform {
    pub fn new(base_color: [f32; 4], bones_per_instance: u32) -> Self {
        Self {
            base_color,
            skin: [(bones_per_instance > 0) as u32, bones_per_instance, 0, 0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct LightingUniform {
    pub inv_view: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    /// Unit direction the light travels.
    pub light_dir: [f32; 4],
    /// Color premultiplied by intensity.
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
    pub fog_color: [f32; 4],
    /// start, end, 0, 0
    pub fog_range: [f32; 4],
    pub caustics_color: [f32; 4],
    /// intensity, scale, speed, time
    pub caustics: [f32; 4],
    /// width, height, 1/width, 1/height
    pub screen: [f32; 4],
    /// shadow map texel size, shadowing enabled, 0, 0
    pub shadow: [f32; 4],
}

impl LightingUniform {
    pub fn new(
        camera: &CameraSnapshot,
        light_view_proj: Option<Mat4>,
        shadow_map_size: u32,
        env: &Environment,
        size: (u32, u32),
    ) -> Self {
        let dir: Vec3 = env.light.direction();
        let light = env.light.color.scaled(env.light.intensity);
        let (w, h) = (size.0.max(1) as f32, size.1.max(1) as f32);
        let c = &env.caustics;
        Self {
            inv_view: camera.view.inverse().to_cols_array_2d(),
            inv_proj: camera.projection.inverse().to_cols_array_2d(),
            light_view_proj: light_view_proj.unwrap_or(Mat4::IDENTITY).to_cols_array_2d(),
            view: camera.view.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            light_dir: dir.extend(0.0).to_array(),
            light_color: light.to_array(),
            ambient: env.ambient.to_array(),
            fog_color: env.fog.color.to_array(),
            fog_range: [env.fog.start, env.fog.end, 0.0, 0.0],
            caustics_color: c.color.to_array(),
            caustics: [c.intensity, c.scale, c.speed, c.time],
            screen: [w, h, 1.0 / w, 1.0 / h],
            shadow: [
                1.0 / shadow_map_size.max(1) as f32,
                light_view_proj.is_some() as u32 as f32,
                0.0,
                0.0,
            ],
        }
    }
}

/// Number of blur weights the post block carries (center plus radius taps).
pub const BLUR_WEIGHTS: usize = MAX_BLUR_RADIUS as usize + 1;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct PostUniform {
    /// source texel width, height, blur step x, blur step y
    pub texel: [f32; 4],
    /// threshold, bloom strength, exposure, 0
    pub params: [f32; 4],
    /// tone-map operator, debug view, blur radius, 0
    pub modes: [u32; 4],
    pub weights: [[f32; 4]; 2],
}

impl PostUniform {
    pub fn new(
        source_size: (u32, u32),
        step: [f32; 2],
        bloom: &BloomConfig,
        tone_map: &ToneMapConfig,
        debug_view: DebugView,
    ) -> Self {
        let w = blur_weights(bloom.falloff, bloom.radius);
        Self {
            texel: [
                1.0 / source_size.0.max(1) as f32,
                1.0 / source_size.1.max(1) as f32,
                step[0],
                step[1],
            ],
            params: [bloom.threshold, bloom.strength, tone_map.exposure, 0.0],
            modes: [
                tone_map.operator.shader_index(),
                debug_view.shader_index(),
                bloom.radius.min(MAX_BLUR_RADIUS),
                0,
            ],
            weights: [[w[0], w[1], w[2], w[3]], [w[4], w[5], w[6], w[7]]],
        }
    }
}

/// Normalized one-sided Gaussian weights: `w[0]` is the center tap and the
/// kernel `w[r] .. w[1] w[0] w[1] .. w[r]` sums to one. Taps past `radius`
/// are zero.
pub fn blur_weights(falloff: f32, radius: u32) -> [f32; BLUR_WEIGHTS] {
    let radius = radius.min(MAX_BLUR_RADIUS) as usize;
    let sigma = falloff.max(f32::EPSILON);
    let mut w = [0.0f32; BLUR_WEIGHTS];
    for (i, tap) in w.iter_mut().enumerate().take(radius + 1) {
        let x = i as f32;
        *tap = (-(x * x) / (2.0 * sigma * sigma)).exp();
    }
    let sum = w[0] + 2.0 * w[1..].iter().sum::<f32>();
    for tap in &mut w {
        *tap /= sum;
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Projection;

    #[test]
    fn blocks_are_vec4_multiples() {
        for size in [
            size_of::<FrameUniform>(),
            size_of::<DrawUniform>(),
            size_of::<LightingUniform>(),
            size_of::<PostUniform>(),
        ] {
            assert_eq!(size % 16, 0, "{size}");
        }
    }

    #[test]
    fn blur_kernel_sums_to_one() {
        for radius in 1..=MAX_BLUR_RADIUS {
            let w = blur_weights(2.5, radius);
            let total = w[0] + 2.0 * w[1..].iter().sum::<f32>();
            assert!((total - 1.0).abs() < 1e-5, "radius {radius}: {total}");
        }
    }

    #[test]
    fn blur_weights_fall_off_and_stop_at_radius() {
        let w = blur_weights(2.0, 3);
        assert!(w[0] > w[1] && w[1] > w[2] && w[2] > w[3]);
        assert_eq!(&w[4..], &[0.0; 4]);
    }

    #[test]
    fn draw_uniform_flags_skinning() {
        assert_eq!(DrawUniform::new([1.0; 4], 0).skin, [0, 0, 0, 0]);
        assert_eq!(DrawUniform::new([1.0; 4], 40).skin, [1, 40, 0, 0]);
    }

    #[test]
    fn lighting_without_light_camera_disables_shadowing() {
        let cam = CameraSnapshot::new(
            Mat4::IDENTITY,
            Projection::Perspective {
                fov_y: 1.0,
                aspect: 1.0,
                near: 0.1,
                far: 10.0,
            },
        );
        let u = LightingUniform::new(&cam, None, 2048, &Environment::default(), (800, 600));
        assert_eq!(u.shadow[1], 0.0);
        assert_eq!(u.screen[0], 800.0);
        let lit = LightingUniform::new(&cam, Some(Mat4::IDENTITY), 2048, &Environment::default(), (800, 600));
        assert_eq!(lit.shadow[1], 1.0);
    }
}
