use std::sync::Arc;

use crate::binding::{
    BindingLayout, BindingLayoutDesc, BindingTable, PipelineDesc, PipelineError, PipelineState,
    SlotRole, StaticSamplers, TextureSample,
};
use crate::render::ctx::RenderCtx;
use crate::render::error::FrameError;
use crate::render::plan::PassKind;
use crate::render::targets::{FrameTargets, HDR_FORMAT};
use crate::render::uniforms::LightingUniform;
use crate::target::begin_pass;

use super::common::{clear_targets, cleared, DrawStats, FULLSCREEN_VERTICES, FULLSCREEN_WGSL};

const LIGHTING_WGSL: &str = include_str!("shaders/lighting.wgsl");

/// Resolves the geometry buffer into the HDR target with one full-screen quad.
pub struct LightingPass {
    pipeline: PipelineState,
}

impl LightingPass {
    pub fn layout_desc() -> BindingLayoutDesc {
        BindingLayoutDesc::new("umbra lighting layout")
            .constants(SlotRole::FrameConstants, 1)
            .textures(
                SlotRole::GBuffer,
                &[
                    TextureSample::Float,
                    TextureSample::Float,
                    TextureSample::UnfilterableFloat,
                ],
            )
            .textures(SlotRole::ShadowMap, &[TextureSample::Depth])
    }

    pub fn new(device: &wgpu::Device, samplers: &StaticSamplers) -> Result<Self, PipelineError> {
        let layout = Arc::new(BindingLayout::new(device, &Self::layout_desc(), samplers)?);
        let shader = format!("{FULLSCREEN_WGSL}{LIGHTING_WGSL}");
        let pipeline = PipelineState::create(
            device,
            layout,
            &PipelineDesc::fullscreen("umbra lighting", &shader, "fs_lighting", &[HDR_FORMAT]),
        )?;
        Ok(Self { pipeline })
    }

    pub fn record(
        &self,
        ctx: &mut RenderCtx<'_>,
        targets: &FrameTargets,
        constants: &LightingUniform,
        stats: &mut DrawStats,
    ) -> Result<(), FrameError> {
        let constants = ctx.push_constants(constants)?;
        let gbuffer = ctx.target_views(&[&targets.albedo, &targets.normal, &targets.linear_depth])?;
        let shadow = ctx.target_views(&[&targets.shadow])?;

        let mut table = BindingTable::new(self.pipeline.layout());
        table
            .set(SlotRole::FrameConstants, constants)?
            .set(SlotRole::GBuffer, gbuffer)?
            .set(SlotRole::ShadowMap, shadow)?;
        let bindings = table.resolve(ctx.device, &ctx.heaps.shader_visible)?;

        let hdr = cleared(ctx, &targets.hdr)?;
        let mut rpass = begin_pass(ctx.encoder, PassKind::Lighting.label(), ctx.heaps, &[hdr], None)?;
        rpass.set_pipeline(self.pipeline.raw());
        bindings.apply(&mut rpass);
        rpass.draw(FULLSCREEN_VERTICES, 0..1);
        stats.count(1);
        Ok(())
    }

    pub fn clear(&self, ctx: &mut RenderCtx<'_>, targets: &FrameTargets) -> Result<(), FrameError> {
        clear_targets(ctx, PassKind::Lighting.label(), &[&targets.hdr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_sampler_lands_after_gbuffer_views() {
        let spec = LightingPass::layout_desc().validate(4).unwrap();
        let p = spec.samplers().unwrap();
        assert_eq!((p.group, p.first_binding), (1, 3));
        assert_eq!(spec.group_of(SlotRole::ShadowMap), Ok(2));
    }
}
