//! Bloom and tone mapping.
//!
//! Extract → blur H → blur V ping-pong between the half-resolution `Bright`
//! and `Blur` targets; composite adds the blurred bloom onto the HDR image and
//! the tone-map pass writes the result (or a debug view) to the swap surface.

use std::sync::Arc;

use crate::binding::{
    BindingLayout, BindingLayoutDesc, BindingTable, PipelineDesc, PipelineError, PipelineState,
    SlotRole, StaticSamplers, TextureSample,
};
use crate::device::HeapSlot;
use crate::render::config::{DebugView, RendererConfig};
use crate::render::ctx::RenderCtx;
use crate::render::error::FrameError;
use crate::render::plan::PassKind;
use crate::render::targets::{FrameTargets, HDR_FORMAT};
use crate::render::uniforms::PostUniform;
use crate::target::{begin_pass, ColorOutput, RenderTarget};

use super::common::{clear_targets, cleared, DrawStats, FULLSCREEN_VERTICES, FULLSCREEN_WGSL};

const POST_WGSL: &str = include_str!("shaders/post.wgsl");
const BLOOM_WGSL: &str = include_str!("shaders/bloom.wgsl");
const COMPOSITE_WGSL: &str = include_str!("shaders/composite.wgsl");
const TONEMAP_WGSL: &str = include_str!("shaders/tonemap.wgsl");

fn source_layout(label: &'static str, samples: &[TextureSample]) -> BindingLayoutDesc {
    BindingLayoutDesc::new(label)
        .constants(SlotRole::PostConstants, 1)
        .textures(SlotRole::PostSource, samples)
}

pub struct PostPasses {
    extract: PipelineState,
    blur: PipelineState,
    composite: PipelineState,
    tone_map: PipelineState,
}

impl PostPasses {
    pub fn new(
        device: &wgpu::Device,
        samplers: &StaticSamplers,
        swap_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let bloom_layout = Arc::new(BindingLayout::new(
            device,
            &source_layout("umbra bloom layout", &[TextureSample::Float]),
            samplers,
        )?);
        let composite_layout = Arc::new(BindingLayout::new(
            device,
            &source_layout(
                "umbra composite layout",
                &[TextureSample::Float, TextureSample::Float],
            ),
            samplers,
        )?);
        let tone_map_layout = Arc::new(BindingLayout::new(
            device,
            &source_layout(
                "umbra tone map layout",
                &[TextureSample::Float, TextureSample::UnfilterableFloat],
            ),
            samplers,
        )?);

        let bloom = format!("{POST_WGSL}{FULLSCREEN_WGSL}{BLOOM_WGSL}");
        let composite = format!("{POST_WGSL}{FULLSCREEN_WGSL}{COMPOSITE_WGSL}");
        let tone_map = format!("{POST_WGSL}{FULLSCREEN_WGSL}{TONEMAP_WGSL}");
        let hdr = [HDR_FORMAT];
        let swap = [swap_format];

        Ok(Self {
            extract: PipelineState::create(
                device,
                bloom_layout.clone(),
                &PipelineDesc::fullscreen("umbra bloom extract", &bloom, "fs_extract", &hdr),
            )?,
            blur: PipelineState::create(
                device,
                bloom_layout,
                &PipelineDesc::fullscreen("umbra bloom blur", &bloom, "fs_blur", &hdr),
            )?,
            composite: PipelineState::create(
                device,
                composite_layout,
                &PipelineDesc::fullscreen("umbra bloom composite", &composite, "fs_composite", &hdr),
            )?,
            tone_map: PipelineState::create(
                device,
                tone_map_layout,
                &PipelineDesc::fullscreen("umbra tone map", &tone_map, "fs_tonemap", &swap),
            )?,
        })
    }

    /// Records one post stage. `swap_rtv` is the swap image's slot in the
    /// render-target heap; only the tone-map stage writes it.
    pub fn record(
        &self,
        kind: PassKind,
        ctx: &mut RenderCtx<'_>,
        targets: &FrameTargets,
        config: &RendererConfig,
        swap_rtv: HeapSlot,
        stats: &mut DrawStats,
    ) -> Result<(), FrameError> {
        let post = |source: &RenderTarget, step: [f32; 2]| {
            PostUniform::new(
                source.size(),
                step,
                &config.bloom,
                &config.tone_map,
                config.debug_view,
            )
        };
        let texel = |t: &RenderTarget| {
            let (w, h) = t.size();
            (1.0 / w.max(1) as f32, 1.0 / h.max(1) as f32)
        };

        let (pipeline, constants, sources, output): (_, _, Vec<&RenderTarget>, _) = match kind {
            PassKind::BloomExtract => (
                &self.extract,
                post(&targets.hdr, [0.0, 0.0]),
                vec![&targets.hdr],
                cleared(ctx, &targets.bright)?,
            ),
            PassKind::BlurHorizontal => (
                &self.blur,
                post(&targets.bright, [texel(&targets.bright).0, 0.0]),
                vec![&targets.bright],
                cleared(ctx, &targets.blur)?,
            ),
            PassKind::BlurVertical => (
                &self.blur,
                post(&targets.blur, [0.0, texel(&targets.blur).1]),
                vec![&targets.blur],
                cleared(ctx, &targets.bright)?,
            ),
            PassKind::BloomComposite => (
                &self.composite,
                post(&targets.hdr, [0.0, 0.0]),
                vec![&targets.hdr, &targets.bright],
                cleared(ctx, &targets.composite)?,
            ),
            PassKind::ToneMap => (
                &self.tone_map,
                post(&targets.composite, [0.0, 0.0]),
                vec![tone_map_source(targets, config.debug_view), &targets.linear_depth],
                ColorOutput {
                    slot: swap_rtv,
                    clear: None,
                },
            ),
            PassKind::GBuffer | PassKind::Shadow | PassKind::Lighting => return Ok(()),
        };

        let constants = ctx.push_constants(&constants)?;
        let views = ctx.target_views(&sources)?;
        let mut table = BindingTable::new(pipeline.layout());
        table
            .set(SlotRole::PostConstants, constants)?
            .set(SlotRole::PostSource, views)?;
        let bindings = table.resolve(ctx.device, &ctx.heaps.shader_visible)?;

        let mut rpass = begin_pass(ctx.encoder, kind.label(), ctx.heaps, &[output], None)?;
        rpass.set_pipeline(pipeline.raw());
        bindings.apply(&mut rpass);
        rpass.draw(FULLSCREEN_VERTICES, 0..1);
        stats.count(1);
        Ok(())
    }

    /// Clears the output of a skipped post stage so later stages read black.
    pub fn clear(&self, kind: PassKind, ctx: &mut RenderCtx<'_>, targets: &FrameTargets) -> Result<(), FrameError> {
        let output = match kind {
            PassKind::BloomExtract | PassKind::BlurVertical => &targets.bright,
            PassKind::BlurHorizontal => &targets.blur,
            PassKind::BloomComposite => &targets.composite,
            _ => return Ok(()),
        };
        clear_targets(ctx, kind.label(), &[output])
    }
}

fn tone_map_source(targets: &FrameTargets, view: DebugView) -> &RenderTarget {
    match view {
        DebugView::Final | DebugView::Depth => &targets.composite,
        DebugView::Albedo => &targets.albedo,
        DebugView::Normal => &targets.normal,
        DebugView::Bloom => &targets.bright,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_layouts_place_samplers_after_sources() {
        for (samples, first) in [
            (&[TextureSample::Float][..], 1),
            (&[TextureSample::Float, TextureSample::Float][..], 2),
            (&[TextureSample::Float, TextureSample::UnfilterableFloat][..], 2),
        ] {
            let spec = source_layout("t", samples).validate(4).unwrap();
            let p = spec.samplers().unwrap();
            assert_eq!((p.group, p.first_binding), (1, first));
        }
    }
}
