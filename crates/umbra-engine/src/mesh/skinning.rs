//! Bone palettes for skinned meshes.
//!
//! All instances of one model share `bones_per_instance`; the palette is
//! flattened instance-major so the shader finds bone `b` of instance `i` at
//! `i * bones_per_instance + b`.

use glam::Mat4;
use thiserror::Error;

use crate::binding::BufferSpan;

use super::capacity::GrowableCapacity;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SkinningError {
    #[error("instance supplies {found} bone matrices, the model uses {expected}")]
    BoneCountMismatch { expected: u32, found: u32 },

    #[error("{offsets} bone offsets but {nodes} animated node transforms")]
    OffsetNodeMismatch { offsets: usize, nodes: usize },
}

/// Skinning matrices for one instance.
///
/// Each matrix applies the bone's offset (mesh space → bone space) first and
/// the animated node's world transform second.
pub fn final_bone_matrices(offsets: &[Mat4], node_worlds: &[Mat4]) -> Result<Vec<Mat4>, SkinningError> {
    if offsets.len() != node_worlds.len() {
        return Err(SkinningError::OffsetNodeMismatch {
            offsets: offsets.len(),
            nodes: node_worlds.len(),
        });
    }
    Ok(offsets
        .iter()
        .zip(node_worlds)
        .map(|(offset, world)| *world * *offset)
        .collect())
}

/// Instance-major flattened bone matrices of one model for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonePalette {
    bones_per_instance: u32,
    matrices: Vec<Mat4>,
}

impl BonePalette {
    pub fn new(bones_per_instance: u32) -> Self {
        Self {
            bones_per_instance,
            matrices: Vec::new(),
        }
    }

    #[inline]
    pub fn bones_per_instance(&self) -> u32 {
        self.bones_per_instance
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.matrices
            .len()
            .checked_div(self.bones_per_instance as usize)
            .unwrap_or(0) as u32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    #[inline]
    pub fn index(&self, instance: u32, bone: u32) -> usize {
        (instance * self.bones_per_instance + bone) as usize
    }

    /// Appends one instance's matrices and returns its instance index.
    pub fn push_instance(&mut self, bones: &[Mat4]) -> Result<u32, SkinningError> {
        if bones.len() as u32 != self.bones_per_instance {
            return Err(SkinningError::BoneCountMismatch {
                expected: self.bones_per_instance,
                found: bones.len() as u32,
            });
        }
        let instance = self.instance_count();
        self.matrices.extend_from_slice(bones);
        Ok(instance)
    }

    pub fn get(&self, instance: u32, bone: u32) -> Option<&Mat4> {
        if bone >= self.bones_per_instance {
            return None;
        }
        self.matrices.get(self.index(instance, bone))
    }

    #[inline]
    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }
}

/// Per-model storage buffer holding the current frame's bone palette.
#[derive(Debug, Default)]
pub struct BoneMatrixBuffer {
    buffer: Option<wgpu::Buffer>,
    capacity: GrowableCapacity,
    len: u32,
}

impl BoneMatrixBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity in matrices.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity.get()
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Uploads `palette`, reallocating when it exceeds the current capacity.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, palette: &BonePalette) {
        let required = palette.len() as u32;
        if self.capacity.reserve(required) || self.buffer.is_none() {
            let matrices = self.capacity.get().max(1);
            log::debug!("bone buffer grows to {matrices} matrices");
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("umbra bone matrices"),
                size: matrices as u64 * std::mem::size_of::<Mat4>() as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        self.len = required;
        if let (Some(buffer), false) = (self.buffer.as_ref(), palette.is_empty()) {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(palette.matrices()));
        }
    }

    /// View over the uploaded matrices, or `None` before the first upload.
    pub fn span(&self) -> Option<BufferSpan> {
        let buffer = self.buffer.as_ref()?;
        Some(BufferSpan {
            buffer: buffer.clone(),
            offset: 0,
            size: self.len.max(1) as u64 * std::mem::size_of::<Mat4>() as u64,
        })
    }
}

/// Single identity matrix bound for unskinned draws.
pub fn identity_bone_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("umbra identity bone"),
        contents: bytemuck::bytes_of(&Mat4::IDENTITY),
        usage: wgpu::BufferUsages::STORAGE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn marker(i: u32, b: u32) -> Mat4 {
        Mat4::from_translation(vec3(i as f32, b as f32, 0.0))
    }

    // ── palette ───────────────────────────────────────────────────────────

    #[test]
    fn flattened_index_is_instance_major() {
        let bones = 40;
        let mut p = BonePalette::new(bones);
        for i in 0..3 {
            let m: Vec<Mat4> = (0..bones).map(|b| marker(i, b)).collect();
            assert_eq!(p.push_instance(&m), Ok(i));
        }
        assert_eq!(p.len(), 120);
        for i in 0..3 {
            for b in 0..bones {
                assert_eq!(p.index(i, b), (i * bones + b) as usize);
                assert_eq!(p.get(i, b), Some(&marker(i, b)));
            }
        }
    }

    #[test]
    fn wrong_bone_count_is_rejected() {
        let mut p = BonePalette::new(4);
        assert_eq!(
            p.push_instance(&[Mat4::IDENTITY; 3]),
            Err(SkinningError::BoneCountMismatch { expected: 4, found: 3 })
        );
        assert!(p.is_empty());
    }

    #[test]
    fn out_of_range_bone_is_none() {
        let mut p = BonePalette::new(2);
        p.push_instance(&[Mat4::IDENTITY; 2]).unwrap();
        assert!(p.get(0, 2).is_none());
        assert!(p.get(1, 0).is_none());
    }

    #[test]
    fn zero_bone_palette_has_no_instances() {
        let p = BonePalette::new(0);
        assert_eq!(p.instance_count(), 0);
    }

    // ── final matrices ────────────────────────────────────────────────────

    #[test]
    fn offset_applies_before_node_transform() {
        let offset = Mat4::from_translation(vec3(-1.0, 0.0, 0.0));
        let node = Mat4::from_scale(vec3(2.0, 2.0, 2.0));
        let m = final_bone_matrices(&[offset], &[node]).unwrap();
        // (1,0,0) → offset → (0,0,0) → scale → (0,0,0)
        assert_eq!(m[0].transform_point3(vec3(1.0, 0.0, 0.0)), vec3(0.0, 0.0, 0.0));
        // (2,0,0) → (1,0,0) → (2,0,0)
        assert_eq!(m[0].transform_point3(vec3(2.0, 0.0, 0.0)), vec3(2.0, 0.0, 0.0));
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        assert!(final_bone_matrices(&[Mat4::IDENTITY], &[]).is_err());
    }
}
