use std::sync::Arc;

use glam::Vec3;

use crate::binding::{
    BindingLayout, BindingLayoutDesc, BindingTable, BlendMode, CullMode, DepthState,
    PipelineDesc, PipelineError, PipelineState, RasterState, SlotRole, StaticSamplers,
    VertexInput,
};
use crate::device::DEPTH_FORMAT;
use crate::render::config::ShadowConfig;
use crate::render::ctx::RenderCtx;
use crate::render::error::FrameError;
use crate::render::plan::PassKind;
use crate::render::targets::FrameTargets;
use crate::render::uniforms::{DrawUniform, FrameUniform};
use crate::scene::{CameraSnapshot, Projection};
use crate::target::begin_pass;

use super::common::{clear_targets, draw_meshes, DrawStats, MeshDraw, MeshDrawInputs, MESH_WGSL};

const SHADOW_WGSL: &str = include_str!("shaders/shadow.wgsl");

/// Light camera anchored at the viewer and looking along the light.
///
/// The eye sits `height` units back along the light direction from the main
/// camera's position; the orthographic box is `extent` wide and reaches
/// `2 * height` deep, so geometry a full height past the anchor still casts.
pub fn light_camera(main: &CameraSnapshot, light_dir: Vec3, config: &ShadowConfig) -> CameraSnapshot {
    let dir = light_dir.try_normalize().unwrap_or(Vec3::NEG_Y);
    let anchor = main.position;
    let eye = anchor - dir * config.height;
    let up = if dir.dot(Vec3::Y).abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    CameraSnapshot::look_at(
        eye,
        anchor,
        up,
        Projection::Orthographic {
            width: config.extent,
            height: config.extent,
            near: 0.1,
            far: config.height * 2.0,
        },
    )
}

/// Depth-only redraw of every shadow caster from the light camera.
pub struct ShadowPass {
    pipeline: PipelineState,
}

impl ShadowPass {
    pub fn layout_desc() -> BindingLayoutDesc {
        BindingLayoutDesc::new("umbra shadow layout")
            .constants(SlotRole::FrameConstants, 1)
            .constants(SlotRole::DrawConstants, 1)
            .storage(SlotRole::Bones, 1)
    }

    pub fn new(
        device: &wgpu::Device,
        samplers: &StaticSamplers,
        config: &ShadowConfig,
    ) -> Result<Self, PipelineError> {
        let layout = Arc::new(BindingLayout::new(device, &Self::layout_desc(), samplers)?);
        let shader = format!("{MESH_WGSL}{SHADOW_WGSL}");
        let pipeline = PipelineState::create(
            device,
            layout,
            &PipelineDesc {
                label: "umbra shadow",
                shader: &shader,
                vs_entry: "vs_shadow",
                fs_entry: None,
                vertex: VertexInput::Mesh,
                raster: RasterState {
                    cull: CullMode::Back,
                    depth_bias: config.depth_bias,
                    slope_scale_bias: config.slope_bias,
                },
                blend: BlendMode::Opaque,
                depth: Some(DepthState::LESS_WRITE),
                topology: wgpu::PrimitiveTopology::TriangleList,
                color_formats: &[],
                depth_format: Some(DEPTH_FORMAT),
            },
        )?;
        Ok(Self { pipeline })
    }

    /// Draws the `casters` range of every batch. With no casters the map is
    /// only cleared.
    pub fn record(
        &self,
        ctx: &mut RenderCtx<'_>,
        targets: &FrameTargets,
        light: &CameraSnapshot,
        inputs: &MeshDrawInputs<'_>,
        stats: &mut DrawStats,
    ) -> Result<(), FrameError> {
        let frame = ctx.push_constants(&FrameUniform::from_camera(light))?;

        let mut draws = Vec::new();
        for batch in inputs.batches.iter().filter(|b| !b.casters.is_empty()) {
            let Some(mesh) = inputs.meshes.get(batch.mesh) else {
                continue;
            };
            let (bone_view, bones_per_instance) = inputs.skin(batch, mesh);
            let bones = ctx.shader_views([bone_view])?;
            let draw = ctx.push_constants(&DrawUniform::new(
                [1.0; 4],
                bones_per_instance,
            ))?;
            let mut table = BindingTable::new(self.pipeline.layout());
            table
                .set(SlotRole::FrameConstants, frame)?
                .set(SlotRole::DrawConstants, draw)?
                .set(SlotRole::Bones, bones)?;
            let bindings = table.resolve(ctx.device, &ctx.heaps.shader_visible)?;

            // Depth ignores materials; every subset shares the batch's bindings.
            for subset in 0..mesh.subsets().len() {
                draws.push(MeshDraw {
                    mesh: batch.mesh,
                    subset,
                    instances: batch.casters.clone(),
                    bindings: bindings.clone(),
                });
            }
        }

        let dsv = ctx.depth_slot(&targets.shadow)?;
        let mut rpass = begin_pass(
            ctx.encoder,
            PassKind::Shadow.label(),
            ctx.heaps,
            &[],
            Some((dsv, Some(1.0))),
        )?;
        rpass.set_pipeline(self.pipeline.raw());
        draw_meshes(&mut rpass, inputs.meshes, &draws, stats)
    }

    pub fn clear(&self, ctx: &mut RenderCtx<'_>, targets: &FrameTargets) -> Result<(), FrameError> {
        clear_targets(ctx, PassKind::Shadow.label(), &[&targets.shadow])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::config::RendererConfig;
    use glam::{vec3, Mat4};

    fn main_camera(eye: Vec3) -> CameraSnapshot {
        CameraSnapshot::look_at(
            eye,
            eye + Vec3::NEG_Z,
            Vec3::Y,
            Projection::Perspective {
                fov_y: 1.0,
                aspect: 1.0,
                near: 0.1,
                far: 100.0,
            },
        )
    }

    #[test]
    fn light_eye_sits_back_along_the_light() {
        let config = RendererConfig::default().shadow;
        let main = main_camera(vec3(3.0, 2.0, 1.0));
        let light = light_camera(&main, vec3(0.0, -2.0, -1.0), &config);
        let dir = vec3(0.0, -2.0, -1.0).normalize();
        let expected = main.position - dir * config.height;
        assert!(light.position.abs_diff_eq(expected, 1e-2));
    }

    #[test]
    fn anchor_projects_to_the_map_center() {
        let config = RendererConfig::default().shadow;
        let main = main_camera(vec3(5.0, 1.0, -4.0));
        let light = light_camera(&main, vec3(-0.4, -1.0, -0.3), &config);
        let ndc = light.view_projection().project_point3(main.position);
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn straight_down_light_still_has_a_valid_basis() {
        let config = RendererConfig::default().shadow;
        let main = main_camera(Vec3::ZERO);
        let light = light_camera(&main, Vec3::NEG_Y, &config);
        assert!(light.view.is_finite());
        assert_ne!(light.view, Mat4::IDENTITY);
    }

    #[test]
    fn degenerate_direction_falls_back_to_down() {
        let config = RendererConfig::default().shadow;
        let main = main_camera(Vec3::ZERO);
        let light = light_camera(&main, Vec3::ZERO, &config);
        assert!(light.position.abs_diff_eq(vec3(0.0, config.height, 0.0), 1e-2));
    }

    #[test]
    fn layout_has_no_textures_and_no_samplers() {
        let spec = ShadowPass::layout_desc().validate(4).unwrap();
        assert_eq!(spec.ranges().len(), 3);
        assert!(spec.samplers().is_none());
    }
}
