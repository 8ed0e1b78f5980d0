//! Per-frame pass schedule.
//!
//! The order is fixed. Planning only decides, from the registered cameras and
//! the configuration, whether each pass draws or is skipped. A skipped pass
//! still clears its outputs so every later read sees defined contents.

use crate::scene::{CameraRegistry, SubmissionSummary};
use crate::target::{PassIo, TargetId};

use super::config::{DebugView, RendererConfig};

use TargetId::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PassKind {
    GBuffer,
    Shadow,
    Lighting,
    BloomExtract,
    BlurHorizontal,
    BlurVertical,
    BloomComposite,
    ToneMap,
}

impl PassKind {
    pub const ORDER: [PassKind; 8] = [
        PassKind::GBuffer,
        PassKind::Shadow,
        PassKind::Lighting,
        PassKind::BloomExtract,
        PassKind::BlurHorizontal,
        PassKind::BlurVertical,
        PassKind::BloomComposite,
        PassKind::ToneMap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PassKind::GBuffer => "umbra gbuffer pass",
            PassKind::Shadow => "umbra shadow pass",
            PassKind::Lighting => "umbra lighting pass",
            PassKind::BloomExtract => "umbra bloom extract",
            PassKind::BlurHorizontal => "umbra blur horizontal",
            PassKind::BlurVertical => "umbra blur vertical",
            PassKind::BloomComposite => "umbra bloom composite",
            PassKind::ToneMap => "umbra tone map",
        }
    }

    /// Surfaces the pass samples and the surfaces it renders into.
    pub fn io(self, debug_view: DebugView) -> PassIo<'static> {
        let (reads, writes): (&'static [TargetId], &'static [TargetId]) = match self {
            PassKind::GBuffer => (&[], &[Albedo, Normal, LinearDepth]),
            PassKind::Shadow => (&[], &[Shadow]),
            PassKind::Lighting => (&[Albedo, Normal, LinearDepth, Shadow], &[Hdr]),
            PassKind::BloomExtract => (&[Hdr], &[Bright]),
            PassKind::BlurHorizontal => (&[Bright], &[Blur]),
            PassKind::BlurVertical => (&[Blur], &[Bright]),
            PassKind::BloomComposite => (&[Hdr, Bright], &[Composite]),
            PassKind::ToneMap => (tone_map_source(debug_view), &[Swap]),
        };
        PassIo { reads, writes }
    }
}

/// The tone-map pass always binds linear depth next to its color source; the
/// depth debug view shows it instead of the color.
fn tone_map_source(view: DebugView) -> &'static [TargetId] {
    match view {
        DebugView::Final | DebugView::Depth => &[Composite, LinearDepth],
        DebugView::Albedo => &[Albedo, LinearDepth],
        DebugView::Normal => &[Normal, LinearDepth],
        DebugView::Bloom => &[Bright, LinearDepth],
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SkipReason {
    MissingCamera(String),
    BloomDisabled,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PassStatus {
    Run,
    Skipped(SkipReason),
}

impl PassStatus {
    #[inline]
    pub fn runs(&self) -> bool {
        matches!(self, PassStatus::Run)
    }
}

/// Where the shadow pass gets its light camera from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LightCameraSource {
    Registered,
    /// Built from the geometry camera and the light direction.
    Derived,
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct PlannedPass {
    pub kind: PassKind,
    pub status: PassStatus,
    pub io: PassIo<'static>,
}

#[derive(Debug, Clone)]
pub struct FramePlan {
    passes: Vec<PlannedPass>,
    light_camera: LightCameraSource,
    shadow_casters: u32,
}

impl FramePlan {
    pub fn build(
        summary: SubmissionSummary,
        cameras: &CameraRegistry,
        config: &RendererConfig,
    ) -> Self {
        let names = &config.cameras;
        let need = |name: &str| {
            if cameras.contains(name) {
                PassStatus::Run
            } else {
                PassStatus::Skipped(SkipReason::MissingCamera(name.to_owned()))
            }
        };

        let light_camera = if cameras.contains(&names.shadow) {
            LightCameraSource::Registered
        } else if cameras.contains(&names.geometry) {
            LightCameraSource::Derived
        } else {
            LightCameraSource::Unavailable
        };

        let passes = PassKind::ORDER
            .iter()
            .map(|&kind| {
                let status = match kind {
                    PassKind::GBuffer => need(&names.geometry),
                    PassKind::Shadow if light_camera == LightCameraSource::Unavailable => {
                        PassStatus::Skipped(SkipReason::MissingCamera(names.shadow.clone()))
                    }
                    PassKind::Shadow => PassStatus::Run,
                    PassKind::Lighting => need(&names.lighting),
                    PassKind::BloomExtract | PassKind::BlurHorizontal | PassKind::BlurVertical
                        if !config.bloom.enabled =>
                    {
                        PassStatus::Skipped(SkipReason::BloomDisabled)
                    }
                    _ => PassStatus::Run,
                };
                PlannedPass {
                    kind,
                    status,
                    io: kind.io(config.debug_view),
                }
            })
            .collect();

        Self {
            passes,
            light_camera,
            shadow_casters: summary.shadow_casters,
        }
    }

    #[inline]
    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    pub fn status(&self, kind: PassKind) -> Option<&PassStatus> {
        self.passes.iter().find(|p| p.kind == kind).map(|p| &p.status)
    }

    #[inline]
    pub fn light_camera(&self) -> LightCameraSource {
        self.light_camera
    }

    /// The shadow pass runs but draws nothing when no instance casts shadows.
    #[inline]
    pub fn shadow_casters(&self) -> u32 {
        self.shadow_casters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Projection, LIGHT_CAMERA, MAIN_CAMERA};
    use crate::target::{BarrierLog, BarrierTracker, ResourceState};
    use glam::Mat4;

    fn register(r: &mut CameraRegistry, name: &str) {
        r.register(
            name,
            Mat4::IDENTITY,
            Projection::Perspective {
                fov_y: 1.0,
                aspect: 1.0,
                near: 0.1,
                far: 10.0,
            },
        );
    }

    fn main_only() -> CameraRegistry {
        let mut r = CameraRegistry::new();
        register(&mut r, MAIN_CAMERA);
        r
    }

    /// Applies the plan's transitions the way the frame driver does.
    fn run_barriers(plan: &FramePlan) -> BarrierLog {
        let mut b = BarrierTracker::new();
        b.acquire_swap().unwrap();
        for p in plan.passes() {
            b.begin_pass(p.io).unwrap();
            b.end_pass(p.io).unwrap();
        }
        b.present_swap().unwrap();
        b.finish_frame().unwrap()
    }

    // ── scheduling ────────────────────────────────────────────────────────

    #[test]
    fn order_is_fixed() {
        let plan = FramePlan::build(Default::default(), &main_only(), &RendererConfig::default());
        let kinds: Vec<PassKind> = plan.passes().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, PassKind::ORDER.to_vec());
    }

    #[test]
    fn empty_frame_runs_every_pass() {
        let plan = FramePlan::build(Default::default(), &main_only(), &RendererConfig::default());
        assert!(plan.passes().iter().all(|p| p.status.runs()));
        assert_eq!(plan.shadow_casters(), 0);
    }

    #[test]
    fn missing_lighting_camera_skips_only_lighting() {
        let mut config = RendererConfig::default();
        config.cameras.lighting = "Missing".into();
        let plan = FramePlan::build(Default::default(), &main_only(), &config);

        assert_eq!(
            plan.status(PassKind::Lighting),
            Some(&PassStatus::Skipped(SkipReason::MissingCamera("Missing".into())))
        );
        assert_eq!(plan.status(PassKind::GBuffer), Some(&PassStatus::Run));
        assert_eq!(plan.status(PassKind::Shadow), Some(&PassStatus::Run));
        assert_eq!(plan.status(PassKind::ToneMap), Some(&PassStatus::Run));
    }

    #[test]
    fn light_camera_is_derived_from_main_camera() {
        let plan = FramePlan::build(Default::default(), &main_only(), &RendererConfig::default());
        assert_eq!(plan.light_camera(), LightCameraSource::Derived);

        let mut both = main_only();
        register(&mut both, LIGHT_CAMERA);
        let plan = FramePlan::build(Default::default(), &both, &RendererConfig::default());
        assert_eq!(plan.light_camera(), LightCameraSource::Registered);
    }

    #[test]
    fn no_cameras_skips_camera_passes_but_keeps_post() {
        let plan = FramePlan::build(Default::default(), &CameraRegistry::new(), &RendererConfig::default());
        assert!(!plan.status(PassKind::GBuffer).unwrap().runs());
        assert!(!plan.status(PassKind::Shadow).unwrap().runs());
        assert!(!plan.status(PassKind::Lighting).unwrap().runs());
        assert!(plan.status(PassKind::BloomComposite).unwrap().runs());
        assert_eq!(plan.light_camera(), LightCameraSource::Unavailable);
    }

    #[test]
    fn disabled_bloom_skips_extract_and_blur() {
        let mut config = RendererConfig::default();
        config.bloom.enabled = false;
        let plan = FramePlan::build(Default::default(), &main_only(), &config);
        for kind in [PassKind::BloomExtract, PassKind::BlurHorizontal, PassKind::BlurVertical] {
            assert_eq!(plan.status(kind), Some(&PassStatus::Skipped(SkipReason::BloomDisabled)));
        }
        assert!(plan.status(PassKind::BloomComposite).unwrap().runs());
    }

    // ── barrier discipline ────────────────────────────────────────────────

    #[test]
    fn every_debug_view_yields_a_balanced_frame() {
        for view in [
            DebugView::Final,
            DebugView::Albedo,
            DebugView::Normal,
            DebugView::Depth,
            DebugView::Bloom,
        ] {
            let config = RendererConfig {
                debug_view: view,
                ..Default::default()
            };
            let plan = FramePlan::build(Default::default(), &main_only(), &config);
            run_barriers(&plan);
        }
    }

    #[test]
    fn lighting_starts_after_all_gbuffer_reads_are_recorded() {
        let plan = FramePlan::build(Default::default(), &main_only(), &RendererConfig::default());
        let log = run_barriers(&plan);
        let lighting_write = log.position(Hdr, ResourceState::RenderTarget).unwrap();
        for input in [Albedo, Normal, LinearDepth, Shadow] {
            let ready = log.position(input, ResourceState::ShaderRead).unwrap();
            assert!(ready < lighting_write, "{input:?} not readable before lighting");
        }
    }

    #[test]
    fn blur_ping_pong_writes_bright_twice() {
        let plan = FramePlan::build(Default::default(), &main_only(), &RendererConfig::default());
        let log = run_barriers(&plan);
        assert_eq!(log.count(Bright, ResourceState::RenderTarget), 2);
        assert_eq!(log.count(Bright, ResourceState::ShaderRead), 2);
    }
}
