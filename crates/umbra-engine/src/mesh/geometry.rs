use std::ops::Range;

use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::scene::MaterialId;

use super::bounds::BoundingSphere;
use super::capacity::GrowableCapacity;
use super::instance::InstanceRecord;
use super::skinning::{BoneMatrixBuffer, BonePalette};
use super::vertex::MeshVertex;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MeshError {
    #[error("mesh '{0}' has no vertices")]
    NoVertices(String),

    #[error("mesh '{label}' face {face} references vertex {index} of {vertex_count}")]
    IndexOutOfRange {
        label: String,
        face: usize,
        index: u32,
        vertex_count: u32,
    },

    #[error("mesh '{label}' subset {subset} covers faces {start}..{end} of {face_count}")]
    SubsetOutOfRange {
        label: String,
        subset: usize,
        start: u32,
        end: u32,
        face_count: u32,
    },

    #[error("subset {subset} does not exist ({count} subset(s))")]
    UnknownSubset { subset: usize, count: usize },

    #[error("draw of instances {start}..{end} but only {uploaded} uploaded")]
    InstancesNotUploaded { start: u32, end: u32, uploaded: u32 },

    #[error("mesh '{0}' is not skinned")]
    NotSkinned(String),
}

/// Contiguous run of faces drawn with one material.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Subset {
    pub start_face: u32,
    pub face_count: u32,
    pub material: MaterialId,
}

impl Subset {
    #[inline]
    fn index_range(&self) -> Range<u32> {
        self.start_face * 3..(self.start_face + self.face_count) * 3
    }
}

/// Raw geometry handed over by the asset loader.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub label: String,
    pub vertices: Vec<MeshVertex>,
    /// Triangles; empty for non-indexed meshes (vertices are then consumed in
    /// threes).
    pub faces: Vec<[u32; 3]>,
    pub subsets: Vec<Subset>,
    pub skinned: bool,
}

impl MeshData {
    fn face_count(&self) -> u32 {
        if self.faces.is_empty() {
            self.vertices.len() as u32 / 3
        } else {
            self.faces.len() as u32
        }
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.is_empty() {
            return Err(MeshError::NoVertices(self.label.clone()));
        }
        let vertex_count = self.vertices.len() as u32;
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    label: self.label.clone(),
                    face,
                    index,
                    vertex_count,
                });
            }
        }
        let face_count = self.face_count();
        for (subset, s) in self.subsets.iter().enumerate() {
            let end = s.start_face + s.face_count;
            if end > face_count {
                return Err(MeshError::SubsetOutOfRange {
                    label: self.label.clone(),
                    subset,
                    start: s.start_face,
                    end,
                    face_count,
                });
            }
        }
        Ok(())
    }
}

/// GPU-resident geometry plus this frame's instance stream and bone palette.
pub struct Mesh {
    label: String,
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    subsets: Vec<Subset>,
    bounds: BoundingSphere,
    skinned: bool,

    instance_buffer: Option<wgpu::Buffer>,
    instance_capacity: GrowableCapacity,
    instance_count: u32,

    bones: Option<BoneMatrixBuffer>,
}

impl Mesh {
    /// Uploads static geometry. A mesh without subsets gets one covering every
    /// face with the default material.
    pub fn create(device: &wgpu::Device, mut data: MeshData) -> Result<Self, MeshError> {
        data.validate()?;
        if data.subsets.is_empty() {
            data.subsets.push(Subset {
                start_face: 0,
                face_count: data.face_count(),
                material: MaterialId::DEFAULT,
            });
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&data.label),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = (!data.faces.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&data.label),
                contents: bytemuck::cast_slice(&data.faces),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        let bounds =
            BoundingSphere::from_points(data.vertices.iter().map(|v| glam::Vec3::from(v.position)));

        log::debug!(
            "mesh '{}': {} vertices, {} faces, {} subset(s), skinned={}",
            data.label,
            data.vertices.len(),
            data.face_count(),
            data.subsets.len(),
            data.skinned
        );

        Ok(Self {
            label: data.label,
            vertex_buffer,
            index_buffer,
            subsets: data.subsets,
            bounds,
            skinned: data.skinned,
            instance_buffer: None,
            instance_capacity: GrowableCapacity::new(),
            instance_count: 0,
            bones: data.skinned.then(BoneMatrixBuffer::new),
        })
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn subsets(&self) -> &[Subset] {
        &self.subsets
    }

    #[inline]
    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    #[inline]
    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    #[inline]
    pub fn instance_capacity(&self) -> u32 {
        self.instance_capacity.get()
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn bone_buffer(&self) -> Option<&BoneMatrixBuffer> {
        self.bones.as_ref()
    }

    /// Copies `records` into the instance buffer, growing it to exactly
    /// `records.len()` when it is too small. Capacity never shrinks.
    pub fn update_instance_buffer(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        records: &[InstanceRecord],
    ) {
        let required = records.len() as u32;
        if self.instance_capacity.reserve(required) {
            log::debug!("mesh '{}': instance buffer grows to {required}", self.label);
            self.instance_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&self.label),
                size: required as u64 * std::mem::size_of::<InstanceRecord>() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        self.instance_count = required;
        if let (Some(buffer), false) = (self.instance_buffer.as_ref(), records.is_empty()) {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(records));
        }
    }

    pub fn upload_bone_matrices(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        palette: &BonePalette,
    ) -> Result<(), MeshError> {
        let bones = self
            .bones
            .as_mut()
            .ok_or_else(|| MeshError::NotSkinned(self.label.clone()))?;
        bones.upload(device, queue, palette);
        Ok(())
    }

    /// Binds the vertex, instance and index streams.
    pub fn bind(&self, rpass: &mut wgpu::RenderPass<'_>) {
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        if let Some(instances) = self.instance_buffer.as_ref() {
            rpass.set_vertex_buffer(1, instances.slice(..));
        }
        if let Some(indices) = self.index_buffer.as_ref() {
            rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        }
    }

    /// Draws one subset for `instances` out of the uploaded instance stream.
    /// The mesh must have been bound with [`Mesh::bind`].
    pub fn draw_subset_instanced(
        &self,
        rpass: &mut wgpu::RenderPass<'_>,
        subset: usize,
        instances: Range<u32>,
    ) -> Result<(), MeshError> {
        let s = self.subsets.get(subset).ok_or(MeshError::UnknownSubset {
            subset,
            count: self.subsets.len(),
        })?;
        if instances.end > self.instance_count {
            return Err(MeshError::InstancesNotUploaded {
                start: instances.start,
                end: instances.end,
                uploaded: self.instance_count,
            });
        }
        if instances.is_empty() || s.face_count == 0 {
            return Ok(());
        }
        match self.index_buffer {
            Some(_) => rpass.draw_indexed(s.index_range(), 0, instances),
            None => rpass.draw(s.index_range(), instances),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> MeshData {
        MeshData {
            label: "tri".into(),
            vertices: vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
                MeshVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            ],
            faces: vec![[0, 1, 2]],
            subsets: vec![],
            skinned: false,
        }
    }

    #[test]
    fn valid_geometry_passes() {
        assert_eq!(tri().validate(), Ok(()));
    }

    #[test]
    fn out_of_range_index_is_caught() {
        let mut d = tri();
        d.faces.push([0, 1, 3]);
        assert!(matches!(
            d.validate(),
            Err(MeshError::IndexOutOfRange { face: 1, index: 3, .. })
        ));
    }

    #[test]
    fn subset_past_last_face_is_caught() {
        let mut d = tri();
        d.subsets.push(Subset {
            start_face: 0,
            face_count: 2,
            material: MaterialId::DEFAULT,
        });
        assert!(matches!(d.validate(), Err(MeshError::SubsetOutOfRange { end: 2, .. })));
    }

    #[test]
    fn non_indexed_faces_come_from_vertex_triples() {
        let mut d = tri();
        d.faces.clear();
        assert_eq!(d.face_count(), 1);
    }

    #[test]
    fn subset_index_range_spans_three_per_face() {
        let s = Subset {
            start_face: 2,
            face_count: 3,
            material: MaterialId::DEFAULT,
        };
        assert_eq!(s.index_range(), 6..15);
    }
}
