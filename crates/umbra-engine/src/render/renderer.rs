use anyhow::{Context, Result};
use glam::{Mat4, Vec2};

use crate::binding::{BufferSpan, StaticSamplers};
use crate::device::{Gpu, HeapSlot, HeapUsage, SurfaceErrorAction};
use crate::logging::WarnOnce;
use crate::mesh::{identity_bone_buffer, Mesh, MeshData, MeshError, MeshId, MeshStore, SkinningError};
use crate::paint::Color;
use crate::scene::{
    CameraRegistry, Environment, Material, MaterialId, MaterialStore, MeshBatch,
    Projection, RenderFlags, SceneSubmission,
};
use crate::target::TargetError;

use super::config::{DebugView, RendererConfig};
use super::ctx::RenderCtx;
use super::error::FrameError;
use super::passes::{light_camera, DrawStats, GBufferPass, LightingPass, MeshDrawInputs, PostPasses, ShadowPass};
use super::plan::{FramePlan, LightCameraSource, PassKind, PassStatus, SkipReason};
use super::targets::FrameTargets;
use super::uniforms::LightingUniform;

/// What one presented frame did.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    /// Completion counter value the CPU waited for.
    pub fence: u64,
    pub passes: Vec<(PassKind, PassStatus)>,
    pub light_camera: LightCameraSource,
    pub stats: DrawStats,
    pub heap_usage: HeapUsage,
    pub transitions: usize,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Presented(FrameReport),
    /// No swap image this frame; the action says whether to keep going.
    Skipped(SurfaceErrorAction),
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum FrameWarning {
    Skipped(PassKind, SkipReason),
    UnknownMesh(MeshId),
    NotSkinned(MeshId),
}

/// Deferred renderer: owns the frame targets, the passes and the scene-facing
/// stores, and drives one frame per `render_frame`.
pub struct Renderer {
    config: RendererConfig,
    targets: FrameTargets,
    gbuffer: GBufferPass,
    shadow: ShadowPass,
    lighting: LightingPass,
    post: PostPasses,

    meshes: MeshStore,
    materials: MaterialStore,
    cameras: CameraRegistry,
    submission: SceneSubmission,
    environment: Environment,
    identity_bones: BufferSpan,

    warned: WarnOnce<FrameWarning>,
    frame: u64,
}

impl Renderer {
    /// Builds every target and pipeline. Any failure here is fatal.
    pub fn new(gpu: &Gpu<'_>, config: RendererConfig) -> Result<Self> {
        let device = gpu.device();
        config
            .validate(device.limits().max_texture_dimension_2d)
            .context("invalid renderer configuration")?;

        let (width, height) = gpu.size();
        let targets = FrameTargets::new(device, width, height, config.shadow.map_size)
            .context("failed to create frame targets")?;

        let samplers = StaticSamplers::new(device);
        let gbuffer = GBufferPass::new(device, &samplers).context("gbuffer pipeline")?;
        let shadow = ShadowPass::new(device, &samplers, &config.shadow).context("shadow pipeline")?;
        let lighting = LightingPass::new(device, &samplers).context("lighting pipeline")?;
        let post = PostPasses::new(device, &samplers, gpu.surface_format()).context("post pipelines")?;

        let identity = identity_bone_buffer(device);

        log::info!(
            "renderer ready: {width}x{height}, shadow map {}, bloom {}, tone map {:?}",
            config.shadow.map_size,
            if config.bloom.enabled { "on" } else { "off" },
            config.tone_map.operator
        );

        Ok(Self {
            targets,
            gbuffer,
            shadow,
            lighting,
            post,
            meshes: MeshStore::new(),
            materials: MaterialStore::new(device, gpu.queue()),
            cameras: CameraRegistry::new(),
            submission: SceneSubmission::new(),
            environment: Environment::default(),
            identity_bones: BufferSpan::whole(&identity),
            warned: WarnOnce::new(),
            frame: 0,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn debug_view(&self) -> DebugView {
        self.config.debug_view
    }

    pub fn set_debug_view(&mut self, view: DebugView) {
        if view != self.config.debug_view {
            log::info!("debug view: {view:?}");
            self.config.debug_view = view;
        }
    }

    pub fn set_bloom_enabled(&mut self, enabled: bool) {
        if enabled != self.config.bloom.enabled {
            log::info!("bloom {}", if enabled { "on" } else { "off" });
            self.config.bloom.enabled = enabled;
        }
    }

    // ── scene-facing ──────────────────────────────────────────────────────

    pub fn add_mesh(&mut self, device: &wgpu::Device, data: MeshData) -> Result<MeshId, MeshError> {
        Ok(self.meshes.insert(Mesh::create(device, data)?))
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn submit_instance(
        &mut self,
        mesh: MeshId,
        world: Mat4,
        tint: Color,
        tiling: Vec2,
        offset: Vec2,
        flags: RenderFlags,
    ) -> Result<(), SkinningError> {
        self.submission
            .submit_instance(mesh, world, tint, tiling, offset, flags)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_skinned_instance(
        &mut self,
        mesh: MeshId,
        world: Mat4,
        tint: Color,
        tiling: Vec2,
        offset: Vec2,
        flags: RenderFlags,
        bones: &[Mat4],
    ) -> Result<(), SkinningError> {
        self.submission
            .submit_skinned_instance(mesh, world, tint, tiling, offset, flags, bones)
    }

    pub fn register_camera(&mut self, name: impl Into<String>, view: Mat4, projection: Projection) {
        self.cameras.register(name, view, projection);
    }

    /// Lighting parameters for the coming frames.
    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Follows a swap-chain resize. The shadow map keeps its size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), TargetError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.targets.resize(device, width, height)
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Records, submits and presents one frame from the instances and cameras
    /// submitted since the previous one.
    ///
    /// Submissions and cameras are consumed whatever the outcome. On error the
    /// frame is discarded and the device is ready for the next one.
    pub fn render_frame(&mut self, gpu: &mut Gpu<'_>) -> Result<FrameOutcome, FrameError> {
        let result = self.render_frame_inner(gpu);
        self.cameras.clear();
        self.submission.clear();
        result
    }

    fn render_frame_inner(&mut self, gpu: &mut Gpu<'_>) -> Result<FrameOutcome, FrameError> {
        gpu.reset_heaps();
        let mut frame = match gpu.prepare(Color::BLACK) {
            Ok(f) => f,
            Err(e) => {
                let action = gpu.handle_surface_error(e);
                log::debug!("frame skipped: {action:?}");
                return Ok(FrameOutcome::Skipped(action));
            }
        };

        let size = gpu.size();
        let plan = FramePlan::build(self.submission.summary(), &self.cameras, &self.config);
        let recorded = {
            let swap_rtv = frame.swap_rtv;
            let mut ctx = RenderCtx::new(gpu.parts(), &mut frame.encoder);
            self.record(&mut ctx, &plan, swap_rtv, size)
        };
        let stats = match recorded {
            Ok(stats) => stats,
            Err(e) => {
                log::error!("frame {} aborted: {e}", self.frame);
                gpu.discard(frame);
                return Err(e);
            }
        };

        let heap_usage = gpu.heap_usage();
        let info = gpu.present(frame)?;
        self.frame += 1;

        let report = FrameReport {
            frame: self.frame,
            fence: info.fence,
            passes: plan.passes().iter().map(|p| (p.kind, p.status.clone())).collect(),
            light_camera: plan.light_camera(),
            stats,
            heap_usage,
            transitions: info.barriers.transitions.len(),
        };
        log::debug!(
            "frame {}: {} draws, {} instances, heaps rtv {} dsv {} srv {} cb {}B",
            report.frame,
            stats.draw_calls,
            stats.instances,
            heap_usage.render_target,
            heap_usage.depth_stencil,
            heap_usage.shader_visible,
            heap_usage.constant_bytes
        );
        Ok(FrameOutcome::Presented(report))
    }

    fn record(
        &mut self,
        ctx: &mut RenderCtx<'_>,
        plan: &FramePlan,
        swap_rtv: HeapSlot,
        size: (u32, u32),
    ) -> Result<DrawStats, FrameError> {
        let names = &self.config.cameras;
        let main = self.cameras.get(&names.geometry).copied();
        let light = match plan.light_camera() {
            LightCameraSource::Registered => self.cameras.get(&names.shadow).copied(),
            LightCameraSource::Derived => main.map(|m| {
                light_camera(&m, self.environment.light.direction(), &self.config.shadow)
            }),
            LightCameraSource::Unavailable => None,
        };
        if let (LightCameraSource::Derived, Some(light)) = (plan.light_camera(), light) {
            let name = names.shadow.clone();
            self.cameras.register_snapshot(name, light);
        }
        let lighting_camera = self.cameras.get(&names.lighting).copied();

        let frustum = main.map(|c| c.frustum());
        let meshes = &self.meshes;
        let batches = self
            .submission
            .build_batches(frustum.as_ref(), |id| meshes.get(id).map(Mesh::bounds))?;
        upload_batches(ctx, &mut self.meshes, &batches, &mut self.warned)?;

        let inputs = MeshDrawInputs {
            batches: &batches,
            meshes: &self.meshes,
            identity_bones: &self.identity_bones,
        };
        let mut stats = DrawStats::default();

        for pass in plan.passes() {
            ctx.barriers.begin_pass(pass.io)?;
            match &pass.status {
                PassStatus::Run => match pass.kind {
                    PassKind::GBuffer => match main.as_ref() {
                        Some(camera) => self.gbuffer.record(
                            ctx,
                            &self.targets,
                            camera,
                            &inputs,
                            &mut self.materials,
                            &mut stats,
                        )?,
                        None => self.gbuffer.clear(ctx, &self.targets)?,
                    },
                    PassKind::Shadow => match light.as_ref() {
                        Some(light) => {
                            self.shadow
                                .record(ctx, &self.targets, light, &inputs, &mut stats)?
                        }
                        None => self.shadow.clear(ctx, &self.targets)?,
                    },
                    PassKind::Lighting => match lighting_camera.as_ref() {
                        Some(camera) => {
                            let shadowed = plan.status(PassKind::Shadow).is_some_and(PassStatus::runs);
                            let constants = LightingUniform::new(
                                camera,
                                light.filter(|_| shadowed).map(|l| l.view_projection()),
                                self.config.shadow.map_size,
                                &self.environment,
                                size,
                            );
                            self.lighting
                                .record(ctx, &self.targets, &constants, &mut stats)?
                        }
                        None => self.lighting.clear(ctx, &self.targets)?,
                    },
                    post => self.post.record(
                        post,
                        ctx,
                        &self.targets,
                        &self.config,
                        swap_rtv,
                        &mut stats,
                    )?,
                },
                PassStatus::Skipped(reason) => {
                    if let SkipReason::MissingCamera(name) = reason {
                        self.warned
                            .error(FrameWarning::Skipped(pass.kind, reason.clone()), || {
                                format!(
                                    "{} skipped: camera '{name}' is not registered",
                                    pass.kind.label()
                                )
                            });
                    }
                    self.clear_pass(pass.kind, ctx)?;
                }
            }
            ctx.barriers.end_pass(pass.io)?;
        }
        Ok(stats)
    }

    fn clear_pass(&self, kind: PassKind, ctx: &mut RenderCtx<'_>) -> Result<(), FrameError> {
        match kind {
            PassKind::GBuffer => self.gbuffer.clear(ctx, &self.targets),
            PassKind::Shadow => self.shadow.clear(ctx, &self.targets),
            PassKind::Lighting => self.lighting.clear(ctx, &self.targets),
            _ => self.post.clear(kind, ctx, &self.targets),
        }
    }
}

/// Copies every batch's instances (and bones) into its mesh's buffers before
/// any pass draws.
fn upload_batches(
    ctx: &RenderCtx<'_>,
    meshes: &mut MeshStore,
    batches: &[MeshBatch],
    warned: &mut WarnOnce<FrameWarning>,
) -> Result<(), FrameError> {
    for batch in batches {
        let Some(mesh) = meshes.get_mut(batch.mesh) else {
            warned.warn(FrameWarning::UnknownMesh(batch.mesh), || {
                format!("instances submitted for unknown mesh {:?}; ignored", batch.mesh)
            });
            continue;
        };
        mesh.update_instance_buffer(ctx.device, ctx.queue, &batch.records);
        match BoneUpload::for_batch(batch, mesh.is_skinned()) {
            BoneUpload::None => {}
            BoneUpload::Palette => mesh.upload_bone_matrices(ctx.device, ctx.queue, &batch.palette)?,
            BoneUpload::DrawUnskinned => {
                warned.warn(FrameWarning::NotSkinned(batch.mesh), || {
                    format!("mesh '{}' has no bone buffer; skinned instances draw unskinned", mesh.label())
                });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum BoneUpload {
    None,
    Palette,
    /// Bones were submitted for a mesh created without a bone buffer.
    DrawUnskinned,
}

impl BoneUpload {
    fn for_batch(batch: &MeshBatch, mesh_skinned: bool) -> Self {
        match (batch.is_skinned(), mesh_skinned) {
            (false, _) => BoneUpload::None,
            (true, true) => BoneUpload::Palette,
            (true, false) => BoneUpload::DrawUnskinned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(bones: &[Mat4]) -> MeshBatch {
        let mut s = SceneSubmission::new();
        s.submit_skinned_instance(MeshId(0), Mat4::IDENTITY, Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, bones)
            .unwrap();
        s.build_batches(None, |_| None).unwrap().remove(0)
    }

    #[test]
    fn skinned_batch_on_boneless_mesh_draws_unskinned() {
        let b = batch(&[Mat4::IDENTITY; 3]);
        assert_eq!(BoneUpload::for_batch(&b, false), BoneUpload::DrawUnskinned);
        assert_eq!(BoneUpload::for_batch(&b, true), BoneUpload::Palette);
    }

    #[test]
    fn plain_batch_uploads_no_bones() {
        let b = batch(&[]);
        assert_eq!(BoneUpload::for_batch(&b, true), BoneUpload::None);
        assert_eq!(BoneUpload::for_batch(&b, false), BoneUpload::None);
    }
}
