use std::collections::BTreeMap;
use std::ops::{BitOr, Range};

use glam::{Mat4, Vec2};

use crate::mesh::{BonePalette, BoundingSphere, InstanceRecord, MeshId, SkinningError};
use crate::paint::Color;

use super::frustum::Frustum;

/// Per-instance render flags.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct RenderFlags(u32);

impl RenderFlags {
    pub const NONE: RenderFlags = RenderFlags(0);
    pub const CAST_SHADOWS: RenderFlags = RenderFlags(1);

    #[inline]
    pub fn contains(self, other: RenderFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RenderFlags {
    type Output = RenderFlags;

    fn bitor(self, rhs: RenderFlags) -> RenderFlags {
        RenderFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
struct Submitted {
    mesh: MeshId,
    record: InstanceRecord,
    flags: RenderFlags,
    /// Range into `SceneSubmission::bones`.
    bones: Range<usize>,
}

/// Drawables submitted by the scene for the current frame.
#[derive(Debug, Default)]
pub struct SceneSubmission {
    instances: Vec<Submitted>,
    bones: Vec<Mat4>,
    /// Bones per instance fixed by the first submission of each mesh; zero
    /// for plain instances.
    bones_per_mesh: BTreeMap<MeshId, u32>,
}

/// Counts the frame planner needs.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SubmissionSummary {
    pub instances: u32,
    pub shadow_casters: u32,
    pub meshes: u32,
}

/// Every surviving instance of one mesh, ready for upload.
///
/// Instances are ordered `[casters outside the view][casters in view][others
/// in view]`, so the shadow pass draws `casters` and the geometry pass draws
/// `visible`, both as contiguous instance ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBatch {
    pub mesh: MeshId,
    pub records: Vec<InstanceRecord>,
    pub casters: Range<u32>,
    pub visible: Range<u32>,
    /// Same instance order as `records`. Zero bones per instance for
    /// unskinned meshes.
    pub palette: BonePalette,
}

impl MeshBatch {
    #[inline]
    pub fn is_skinned(&self) -> bool {
        self.palette.bones_per_instance() > 0
    }
}

impl SceneSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submits an unskinned instance. Fails when the mesh already has skinned
    /// instances this frame.
    pub fn submit_instance(
        &mut self,
        mesh: MeshId,
        world: Mat4,
        tint: Color,
        tiling: Vec2,
        offset: Vec2,
        flags: RenderFlags,
    ) -> Result<(), SkinningError> {
        self.push(mesh, InstanceRecord::new(world, tint, tiling, offset), flags, &[])
    }

    /// Submits a skinned instance with its final bone matrices. Every instance
    /// of one mesh in a frame must carry the same bone count, so a mesh cannot
    /// mix plain and skinned instances. An empty `bones` slice is a plain
    /// instance.
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
        self.push(mesh, InstanceRecord::new(world, tint, tiling, offset), flags, bones)
    }

    fn push(
        &mut self,
        mesh: MeshId,
        record: InstanceRecord,
        flags: RenderFlags,
        bones: &[Mat4],
    ) -> Result<(), SkinningError> {
        let found = bones.len() as u32;
        let expected = *self.bones_per_mesh.entry(mesh).or_insert(found);
        if expected != found {
            return Err(SkinningError::BoneCountMismatch { expected, found });
        }
        let at = self.bones.len();
        self.bones.extend_from_slice(bones);
        self.instances.push(Submitted {
            mesh,
            record,
            flags,
            bones: at..self.bones.len(),
        });
        Ok(())
    }

    pub fn summary(&self) -> SubmissionSummary {
        let mut meshes: Vec<MeshId> = self.instances.iter().map(|s| s.mesh).collect();
        meshes.sort_unstable();
        meshes.dedup();
        SubmissionSummary {
            instances: self.instances.len() as u32,
            shadow_casters: self
                .instances
                .iter()
                .filter(|s| s.flags.contains(RenderFlags::CAST_SHADOWS))
                .count() as u32,
            meshes: meshes.len() as u32,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.bones.clear();
        self.bones_per_mesh.clear();
    }

    /// Groups instances by mesh (ascending id) and culls against `frustum`.
    ///
    /// An instance survives when its bounds touch the frustum or it casts
    /// shadows. With no frustum every instance counts as visible; meshes
    /// `bounds` does not know are never culled.
    pub fn build_batches(
        &self,
        frustum: Option<&Frustum>,
        bounds: impl Fn(MeshId) -> Option<BoundingSphere>,
    ) -> Result<Vec<MeshBatch>, SkinningError> {
        let mut by_mesh: BTreeMap<MeshId, [Vec<&Submitted>; 3]> = BTreeMap::new();
        for s in &self.instances {
            let in_view = match (frustum, bounds(s.mesh)) {
                (Some(f), Some(b)) => f.intersects_sphere(&b.transformed(&s.record.world())),
                _ => true,
            };
            let caster = s.flags.contains(RenderFlags::CAST_SHADOWS);
            let bucket = match (caster, in_view) {
                (true, false) => 0,
                (true, true) => 1,
                (false, true) => 2,
                (false, false) => continue,
            };
            by_mesh.entry(s.mesh).or_default()[bucket].push(s);
        }

        by_mesh
            .into_iter()
            .map(|(mesh, [hidden_casters, seen_casters, others])| {
                let hidden = hidden_casters.len() as u32;
                let casters = hidden + seen_casters.len() as u32;
                let total = casters + others.len() as u32;

                let bones_per_instance = self.bones_per_mesh.get(&mesh).copied().unwrap_or(0);
                let mut palette = BonePalette::new(bones_per_instance);
                let mut records = Vec::with_capacity(total as usize);
                for s in hidden_casters.into_iter().chain(seen_casters).chain(others) {
                    records.push(s.record);
                    if bones_per_instance > 0 {
                        palette.push_instance(&self.bones[s.bones.clone()])?;
                    }
                }

                Ok(MeshBatch {
                    mesh,
                    records,
                    casters: 0..casters,
                    visible: hidden..total,
                    palette,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{vec3, Vec3};

    const STATIC: MeshId = MeshId(0);
    const SKINNED: MeshId = MeshId(1);

    fn at(x: f32) -> Mat4 {
        Mat4::from_translation(vec3(x, 0.0, -10.0))
    }

    fn submit(s: &mut SceneSubmission, mesh: MeshId, x: f32, flags: RenderFlags) {
        s.submit_instance(mesh, at(x), Color::WHITE, Vec2::ONE, Vec2::ZERO, flags)
            .unwrap();
    }

    fn frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, vec3(0.0, 0.0, -1.0), Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    fn unit_bounds(_: MeshId) -> Option<BoundingSphere> {
        Some(BoundingSphere {
            center: Vec3::ZERO,
            radius: 1.0,
        })
    }

    // ── batching ──────────────────────────────────────────────────────────

    #[test]
    fn empty_submission_builds_no_batches() {
        let s = SceneSubmission::new();
        assert!(s.build_batches(Some(&frustum()), unit_bounds).unwrap().is_empty());
        assert_eq!(s.summary(), SubmissionSummary::default());
    }

    #[test]
    fn offscreen_non_caster_is_dropped_but_caster_kept() {
        let mut s = SceneSubmission::new();
        submit(&mut s, STATIC, 0.0, RenderFlags::NONE);
        submit(&mut s, STATIC, 500.0, RenderFlags::NONE);
        submit(&mut s, STATIC, 500.0, RenderFlags::CAST_SHADOWS);

        let batches = s.build_batches(Some(&frustum()), unit_bounds).unwrap();
        assert_eq!(batches.len(), 1);
        let b = &batches[0];
        assert_eq!(b.records.len(), 2);
        assert_eq!(b.casters, 0..1);
        assert_eq!(b.visible, 1..2);
    }

    #[test]
    fn casters_come_first_then_visible_others() {
        let mut s = SceneSubmission::new();
        submit(&mut s, STATIC, 0.0, RenderFlags::NONE);
        submit(&mut s, STATIC, 1.0, RenderFlags::CAST_SHADOWS);
        submit(&mut s, STATIC, 500.0, RenderFlags::CAST_SHADOWS);

        let b = &s.build_batches(Some(&frustum()), unit_bounds).unwrap()[0];
        let xs: Vec<f32> = b.records.iter().map(|r| r.world[3][0]).collect();
        assert_eq!(xs, vec![500.0, 1.0, 0.0]);
        assert_eq!(b.casters, 0..2);
        assert_eq!(b.visible, 1..3);
    }

    #[test]
    fn batches_are_grouped_per_mesh_in_id_order() {
        let mut s = SceneSubmission::new();
        submit(&mut s, MeshId(3), 0.0, RenderFlags::NONE);
        submit(&mut s, MeshId(1), 0.0, RenderFlags::NONE);
        submit(&mut s, MeshId(3), 1.0, RenderFlags::NONE);
        let batches = s.build_batches(None, unit_bounds).unwrap();
        let ids: Vec<MeshId> = batches.iter().map(|b| b.mesh).collect();
        assert_eq!(ids, vec![MeshId(1), MeshId(3)]);
        assert_eq!(batches[1].records.len(), 2);
        assert_eq!(s.summary().meshes, 2);
    }

    // ── skinning ──────────────────────────────────────────────────────────

    #[test]
    fn skinned_and_static_meshes_get_separate_palettes() {
        let mut s = SceneSubmission::new();
        let bones: Vec<Mat4> = (0..40).map(|b| Mat4::from_translation(vec3(b as f32, 0.0, 0.0))).collect();
        s.submit_skinned_instance(
            SKINNED,
            at(0.0),
            Color::WHITE,
            Vec2::ONE,
            Vec2::ZERO,
            RenderFlags::CAST_SHADOWS,
            &bones,
        )
        .unwrap();
        submit(&mut s, STATIC, 0.0, RenderFlags::NONE);

        let batches = s.build_batches(Some(&frustum()), unit_bounds).unwrap();
        let skinned = batches.iter().find(|b| b.mesh == SKINNED).unwrap();
        let unskinned = batches.iter().find(|b| b.mesh == STATIC).unwrap();

        assert!(skinned.is_skinned());
        assert_eq!(skinned.palette.len(), 40);
        assert_eq!(skinned.palette.get(0, 39), Some(&bones[39]));

        assert!(!unskinned.is_skinned());
        assert_eq!(unskinned.palette.bones_per_instance(), 0);
        assert!(unskinned.palette.is_empty());
    }

    #[test]
    fn palette_follows_batch_instance_order() {
        let mut s = SceneSubmission::new();
        let marker = |x: f32| [Mat4::from_translation(vec3(x, 0.0, 0.0))];
        for (x, flags) in [(0.0, RenderFlags::NONE), (500.0, RenderFlags::CAST_SHADOWS)] {
            s.submit_skinned_instance(SKINNED, at(x), Color::WHITE, Vec2::ONE, Vec2::ZERO, flags, &marker(x))
                .unwrap();
        }
        let b = &s.build_batches(Some(&frustum()), unit_bounds).unwrap()[0];
        assert_eq!(b.palette.get(0, 0), Some(&marker(500.0)[0]));
        assert_eq!(b.palette.get(1, 0), Some(&marker(0.0)[0]));
    }

    #[test]
    fn bone_count_must_match_within_mesh() {
        let mut s = SceneSubmission::new();
        let two = [Mat4::IDENTITY; 2];
        s.submit_skinned_instance(SKINNED, at(0.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &two)
            .unwrap();
        let err = s
            .submit_skinned_instance(SKINNED, at(0.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &two[..1])
            .unwrap_err();
        assert_eq!(err, SkinningError::BoneCountMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn plain_instance_rejected_after_skinned_one() {
        let mut s = SceneSubmission::new();
        s.submit_skinned_instance(SKINNED, at(0.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &[Mat4::IDENTITY; 4])
            .unwrap();
        let err = s
            .submit_instance(SKINNED, at(1.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE)
            .unwrap_err();
        assert_eq!(err, SkinningError::BoneCountMismatch { expected: 4, found: 0 });

        let batches = s.build_batches(None, |_| None).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].records.len(), 1);
        assert_eq!(batches[0].palette.len(), 4);
    }

    #[test]
    fn skinned_instance_rejected_after_plain_one() {
        let mut s = SceneSubmission::new();
        submit(&mut s, SKINNED, 0.0, RenderFlags::NONE);
        let err = s
            .submit_skinned_instance(SKINNED, at(1.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &[Mat4::IDENTITY; 2])
            .unwrap_err();
        assert_eq!(err, SkinningError::BoneCountMismatch { expected: 0, found: 2 });

        let b = &s.build_batches(None, |_| None).unwrap()[0];
        assert!(!b.is_skinned());
        assert_eq!(b.records.len(), 1);
    }

    #[test]
    fn empty_bone_slice_is_a_plain_instance() {
        let mut s = SceneSubmission::new();
        submit(&mut s, SKINNED, 0.0, RenderFlags::NONE);
        s.submit_skinned_instance(SKINNED, at(1.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &[])
            .unwrap();
        let b = &s.build_batches(None, |_| None).unwrap()[0];
        assert!(!b.is_skinned());
        assert_eq!(b.records.len(), 2);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut s = SceneSubmission::new();
        submit(&mut s, STATIC, 0.0, RenderFlags::CAST_SHADOWS);
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.summary().shadow_casters, 0);
        // bone counts reset with the frame
        s.submit_skinned_instance(STATIC, at(0.0), Color::WHITE, Vec2::ONE, Vec2::ZERO, RenderFlags::NONE, &[Mat4::IDENTITY])
            .unwrap();
    }
}
