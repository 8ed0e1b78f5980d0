//! Pieces shared by the passes.

use std::ops::Range;

use crate::binding::{BufferSpan, ResolvedBindings, ShaderView};
use crate::mesh::{Mesh, MeshId, MeshStore};
use crate::render::ctx::RenderCtx;
use crate::render::error::FrameError;
use crate::scene::MeshBatch;
use crate::target::{begin_pass, ColorOutput, RenderTarget};

// ── shader sources ────────────────────────────────────────────────────────

pub(super) const MESH_WGSL: &str = include_str!("shaders/mesh.wgsl");
pub(super) const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");

/// Vertices of the full-screen quad drawn from `vertex_index`.
pub(super) const FULLSCREEN_VERTICES: Range<u32> = 0..6;

// ── stats ─────────────────────────────────────────────────────────────────

/// Work recorded during one frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DrawStats {
    pub draw_calls: u32,
    pub instances: u32,
}

impl DrawStats {
    pub(super) fn count(&mut self, instances: u32) {
        self.draw_calls += 1;
        self.instances += instances;
    }
}

// ── mesh draws ────────────────────────────────────────────────────────────

/// Batches already uploaded to their meshes' instance and bone buffers.
pub struct MeshDrawInputs<'s> {
    pub batches: &'s [MeshBatch],
    pub meshes: &'s MeshStore,
    /// Bound in place of a bone palette for unskinned draws.
    pub identity_bones: &'s BufferSpan,
}

impl MeshDrawInputs<'_> {
    /// Bone view and bones-per-instance for the batch's draws. A batch whose
    /// mesh has no bone buffer draws unskinned from the identity palette.
    pub(super) fn skin(&self, batch: &MeshBatch, mesh: &Mesh) -> (ShaderView, u32) {
        let palette = batch
            .is_skinned()
            .then(|| mesh.bone_buffer().and_then(|b| b.span()))
            .flatten();
        match palette {
            Some(span) => (ShaderView::Storage(span), batch.palette.bones_per_instance()),
            None => (ShaderView::Storage(self.identity_bones.clone()), 0),
        }
    }
}

/// One instanced subset draw with its bindings resolved ahead of the pass.
pub(super) struct MeshDraw {
    pub mesh: MeshId,
    pub subset: usize,
    pub instances: Range<u32>,
    pub bindings: ResolvedBindings,
}

pub(super) fn draw_meshes(
    rpass: &mut wgpu::RenderPass<'_>,
    meshes: &MeshStore,
    draws: &[MeshDraw],
    stats: &mut DrawStats,
) -> Result<(), FrameError> {
    for d in draws {
        let Some(mesh) = meshes.get(d.mesh) else {
            continue;
        };
        d.bindings.apply(rpass);
        mesh.bind(rpass);
        mesh.draw_subset_instanced(rpass, d.subset, d.instances.clone())?;
        stats.count(d.instances.len() as u32);
    }
    Ok(())
}

// ── clears ────────────────────────────────────────────────────────────────

/// Clears every image of `targets` to its clear value without drawing.
pub(super) fn clear_targets(
    ctx: &mut RenderCtx<'_>,
    label: &str,
    targets: &[&RenderTarget],
) -> Result<(), FrameError> {
    let mut colors = Vec::new();
    let mut depth = None;
    for t in targets {
        let slots = ctx.attachments(t)?;
        if let Some(slot) = slots.color {
            colors.push(ColorOutput {
                slot,
                clear: Some(t.clear_color()),
            });
        }
        if let Some(slot) = slots.depth {
            depth = Some((slot, Some(1.0)));
        }
    }
    let _rpass = begin_pass(ctx.encoder, label, ctx.heaps, &colors, depth)?;
    Ok(())
}

/// Color output that clears `target` to its own clear value.
pub(super) fn cleared(ctx: &mut RenderCtx<'_>, target: &RenderTarget) -> Result<ColorOutput, FrameError> {
    Ok(ColorOutput {
        slot: ctx.color_slot(target)?,
        clear: Some(target.clear_color()),
    })
}
