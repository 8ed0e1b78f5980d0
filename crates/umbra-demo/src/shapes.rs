//! Procedural demo geometry.

use std::f32::consts::TAU;

use umbra_engine::mesh::{MeshData, MeshVertex, Subset};
use umbra_engine::scene::MaterialId;

fn single_subset(label: &str, vertices: Vec<MeshVertex>, faces: Vec<[u32; 3]>, material: MaterialId, skinned: bool) -> MeshData {
    let face_count = faces.len() as u32;
    MeshData {
        label: label.to_owned(),
        vertices,
        faces,
        subsets: vec![Subset {
            start_face: 0,
            face_count,
            material,
        }],
        skinned,
    }
}

/// Unit cube centered on the origin, one material per face pair.
pub fn cube(sides: MaterialId, caps: MaterialId) -> MeshData {
    // (normal, u, v) with u × v = normal; caps first so they form one subset.
    let faces = [
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut tris = Vec::with_capacity(12);
    for (n, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = [
                0.5 * (n[0] + su * u[0] + sv * v[0]),
                0.5 * (n[1] + su * u[1] + sv * v[1]),
                0.5 * (n[2] + su * u[2] + sv * v[2]),
            ];
            vertices.push(MeshVertex::new(p, n, [(su + 1.0) * 0.5, (1.0 - sv) * 0.5]));
        }
        tris.push([base, base + 1, base + 2]);
        tris.push([base, base + 2, base + 3]);
    }

    let mut data = single_subset("cube", vertices, tris, sides, false);
    data.subsets = vec![
        Subset {
            start_face: 0,
            face_count: 4,
            material: caps,
        },
        Subset {
            start_face: 4,
            face_count: 8,
            material: sides,
        },
    ];
    data
}

/// Square in the XZ plane facing +Y, `size` wide, texture repeated by the
/// instance tiling.
pub fn plane(size: f32, material: MaterialId) -> MeshData {
    let h = size * 0.5;
    let n = [0.0, 1.0, 0.0];
    let vertices = vec![
        MeshVertex::new([-h, 0.0, h], n, [0.0, 1.0]),
        MeshVertex::new([h, 0.0, h], n, [1.0, 1.0]),
        MeshVertex::new([h, 0.0, -h], n, [1.0, 0.0]),
        MeshVertex::new([-h, 0.0, -h], n, [0.0, 0.0]),
    ];
    single_subset("ground", vertices, vec![[0, 1, 2], [0, 2, 3]], material, false)
}

/// Open tube along +Y from 0 to `length`, skinned to two bones: the root at
/// the base and the tip at the top, weights blending linearly along the
/// length.
pub fn skinned_tube(radius: f32, length: f32, rings: u32, segments: u32, material: MaterialId) -> MeshData {
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    for ring in 0..=rings {
        let t = ring as f32 / rings as f32;
        for seg in 0..=segments {
            let a = seg as f32 / segments as f32 * TAU;
            let (s, c) = a.sin_cos();
            vertices.push(
                MeshVertex::new([c * radius, t * length, s * radius], [c, 0.0, s], [seg as f32 / segments as f32, t])
                    .skinned([0, 1, 0, 0], [1.0 - t, t, 0.0, 0.0]),
            );
        }
    }

    let stride = segments + 1;
    let mut faces = Vec::with_capacity((rings * segments * 2) as usize);
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            faces.push([a, b, a + 1]);
            faces.push([a + 1, b, b + 1]);
        }
    }
    single_subset("tube", vertices, faces, material, true)
}

/// Checkerboard RGBA8 pixels.
pub fn checker(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let odd = ((x / cell) + (y / cell)) % 2 == 1;
            pixels.extend_from_slice(if odd { &b } else { &a });
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_subsets_cover_every_face() {
        let cube = cube(MaterialId(1), MaterialId(2));
        cube.validate().unwrap();
        let covered: u32 = cube.subsets.iter().map(|s| s.face_count).sum();
        assert_eq!(covered, cube.faces.len() as u32);
    }

    #[test]
    fn tube_weights_sum_to_one() {
        let tube = skinned_tube(0.3, 2.0, 8, 12, MaterialId::DEFAULT);
        tube.validate().unwrap();
        assert!(tube.skinned);
        for v in &tube.vertices {
            assert!((v.weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn checker_alternates() {
        let px = checker(4, 2, [0; 4], [255; 4]);
        assert_eq!(px.len(), 64);
        assert_eq!(&px[0..4], &[0; 4]);
        assert_eq!(&px[8..12], &[255; 4]);
    }
}
