use std::sync::Arc;

use crate::binding::{
    BindingLayout, BindingLayoutDesc, BindingTable, BlendMode, DepthState, PipelineDesc,
    PipelineError, PipelineState, RasterState, ShaderView, SlotRole, StaticSamplers,
    TextureSample, VertexInput,
};
use crate::device::DEPTH_FORMAT;
use crate::render::ctx::RenderCtx;
use crate::render::error::FrameError;
use crate::render::plan::PassKind;
use crate::render::targets::{FrameTargets, GBUFFER_FORMATS};
use crate::render::uniforms::{DrawUniform, FrameUniform};
use crate::scene::{CameraSnapshot, MaterialStore};
use crate::target::{begin_pass, ColorOutput, TargetId};

use super::common::{
    clear_targets, cleared, draw_meshes, DrawStats, MeshDraw, MeshDrawInputs, MESH_WGSL,
};

const GBUFFER_WGSL: &str = include_str!("shaders/gbuffer.wgsl");

/// Writes albedo, encoded normal and linear view depth for every visible
/// instance.
pub struct GBufferPass {
    pipeline: PipelineState,
}

impl GBufferPass {
    pub fn layout_desc() -> BindingLayoutDesc {
        BindingLayoutDesc::new("umbra gbuffer layout")
            .constants(SlotRole::FrameConstants, 1)
            .constants(SlotRole::DrawConstants, 1)
            .storage(SlotRole::Bones, 1)
            .textures(SlotRole::Material, &[TextureSample::Float])
    }

    pub fn new(device: &wgpu::Device, samplers: &StaticSamplers) -> Result<Self, PipelineError> {
        let layout = Arc::new(BindingLayout::new(device, &Self::layout_desc(), samplers)?);
        let shader = format!("{MESH_WGSL}{GBUFFER_WGSL}");
        let pipeline = PipelineState::create(
            device,
            layout,
            &PipelineDesc {
                label: "umbra gbuffer",
                shader: &shader,
                vs_entry: "vs_gbuffer",
                fs_entry: Some("fs_gbuffer"),
                vertex: VertexInput::Mesh,
                raster: RasterState::default(),
                blend: BlendMode::Opaque,
                depth: Some(DepthState::LESS_WRITE),
                topology: wgpu::PrimitiveTopology::TriangleList,
                color_formats: &GBUFFER_FORMATS,
                depth_format: Some(DEPTH_FORMAT),
            },
        )?;
        Ok(Self { pipeline })
    }

    /// Draws the `visible` range of every batch, one draw per mesh subset.
    pub fn record(
        &self,
        ctx: &mut RenderCtx<'_>,
        targets: &FrameTargets,
        camera: &CameraSnapshot,
        inputs: &MeshDrawInputs<'_>,
        materials: &mut MaterialStore,
        stats: &mut DrawStats,
    ) -> Result<(), FrameError> {
        let frame = ctx.push_constants(&FrameUniform::from_camera(camera))?;

        let mut draws = Vec::new();
        for batch in inputs.batches.iter().filter(|b| !b.visible.is_empty()) {
            let Some(mesh) = inputs.meshes.get(batch.mesh) else {
                continue;
            };
            let (bone_view, bones_per_instance) = inputs.skin(batch, mesh);
            let bones = ctx.shader_views([bone_view])?;
            for (subset, s) in mesh.subsets().iter().enumerate() {
                let material = materials.resolve(s.material);
                let draw = ctx.push_constants(&DrawUniform::new(
                    material.base_color.to_array(),
                    bones_per_instance,
                ))?;
                let albedo = ctx.shader_views([ShaderView::Texture(material.albedo)])?;

                let mut table = BindingTable::new(self.pipeline.layout());
                table
                    .set(SlotRole::FrameConstants, frame)?
                    .set(SlotRole::DrawConstants, draw)?
                    .set(SlotRole::Bones, bones)?
                    .set(SlotRole::Material, albedo)?;
                draws.push(MeshDraw {
                    mesh: batch.mesh,
                    subset,
                    instances: batch.visible.clone(),
                    bindings: table.resolve(ctx.device, &ctx.heaps.shader_visible)?,
                });
            }
        }

        let albedo = cleared(ctx, &targets.albedo)?;
        let normal = cleared(ctx, &targets.normal)?;
        let depth = ctx.attachments(&targets.linear_depth)?;
        let (Some(linear), Some(dsv)) = (depth.color, depth.depth) else {
            return Err(FrameError::MissingAttachment(TargetId::LinearDepth, "color or depth"));
        };
        let linear = ColorOutput {
            slot: linear,
            clear: Some(targets.linear_depth.clear_color()),
        };

        let mut rpass = begin_pass(
            ctx.encoder,
            PassKind::GBuffer.label(),
            ctx.heaps,
            &[albedo, normal, linear],
            Some((dsv, Some(1.0))),
        )?;
        rpass.set_pipeline(self.pipeline.raw());
        draw_meshes(&mut rpass, inputs.meshes, &draws, stats)
    }

    pub fn clear(&self, ctx: &mut RenderCtx<'_>, targets: &FrameTargets) -> Result<(), FrameError> {
        clear_targets(
            ctx,
            PassKind::GBuffer.label(),
            &[&targets.albedo, &targets.normal, &targets.linear_depth],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::RangeKind;

    #[test]
    fn layout_fits_four_groups_with_samplers_on_material() {
        let spec = GBufferPass::layout_desc().validate(4).unwrap();
        let kinds: Vec<RangeKind> = spec.ranges().iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [RangeKind::Constants, RangeKind::Constants, RangeKind::Storage, RangeKind::Textures]
        );
        let samplers = spec.samplers().unwrap();
        assert_eq!((samplers.group, samplers.first_binding), (3, 1));
    }
}
