//! Mesh, instancing and skinning layer.
//!
//! Meshes own their vertex/index buffers, a growable per-frame instance buffer
//! and, when skinned, a growable bone-matrix storage buffer.

mod bounds;
mod capacity;
mod geometry;
mod instance;
mod skinning;
mod vertex;

pub use bounds::BoundingSphere;
pub use capacity::GrowableCapacity;
pub use geometry::{Mesh, MeshData, MeshError, Subset};
pub use instance::InstanceRecord;
pub use skinning::{
    final_bone_matrices, identity_bone_buffer, BoneMatrixBuffer, BonePalette, SkinningError,
};
pub use vertex::MeshVertex;

/// Handle of a mesh inside a [`MeshStore`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MeshId(pub u32);

/// Owner of every loaded mesh.
#[derive(Default)]
pub struct MeshStore {
    meshes: Vec<Mesh>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.push(mesh);
        MeshId(self.meshes.len() as u32 - 1)
    }

    pub fn get(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
