use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

use crate::paint::Color;

/// Per-instance data layout (96 bytes):
///
///  offset  0  world    [[f32; 4]; 4]  loc 5..=8 (columns)
///  offset 64  tiling   [f32; 2]       loc 9
///  offset 72  offset   [f32; 2]       loc 10
///  offset 80  tint     [f32; 4]       loc 11
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub world: [[f32; 4]; 4],
    pub tiling: [f32; 2],
    pub offset: [f32; 2],
    pub tint: [f32; 4],
}

impl InstanceRecord {
    const ATTRS: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x2,
        10 => Float32x2,
        11 => Float32x4
    ];

    pub fn new(world: Mat4, tint: Color, tiling: Vec2, offset: Vec2) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            tiling: tiling.to_array(),
            offset: offset.to_array(),
            tint: tint.to_array(),
        }
    }

    #[inline]
    pub fn world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRecord>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        assert_eq!(std::mem::size_of::<InstanceRecord>(), 96);
        let last = InstanceRecord::ATTRS[6];
        assert_eq!((last.shader_location, last.offset), (11, 80));
    }

    #[test]
    fn world_round_trips_through_columns() {
        let m = Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0));
        let r = InstanceRecord::new(m, Color::WHITE, Vec2::ONE, Vec2::ZERO);
        assert_eq!(r.world(), m);
        assert_eq!(r.world[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
