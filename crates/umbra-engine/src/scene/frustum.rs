use glam::{Mat4, Vec4};

use crate::mesh::BoundingSphere;

/// Six clip planes extracted from a view-projection matrix (depth `0..1`).
/// Plane normals point inward.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|p| {
            let len = p.truncate().length();
            if len > 0.0 { p / len } else { p }
        });
        Self { planes }
    }

    /// `true` unless the sphere lies entirely outside one plane.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(sphere.center) + p.w >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{vec3, Vec3};

    fn frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, vec3(0.0, 0.0, -1.0), Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 50.0);
        Frustum::from_view_projection(&(proj * view))
    }

    fn sphere(x: f32, y: f32, z: f32, r: f32) -> BoundingSphere {
        BoundingSphere {
            center: vec3(x, y, z),
            radius: r,
        }
    }

    #[test]
    fn sphere_in_front_is_visible() {
        assert!(frustum().intersects_sphere(&sphere(0.0, 0.0, -5.0, 1.0)));
    }

    #[test]
    fn sphere_behind_or_beyond_far_is_culled() {
        let f = frustum();
        assert!(!f.intersects_sphere(&sphere(0.0, 0.0, 5.0, 1.0)));
        assert!(!f.intersects_sphere(&sphere(0.0, 0.0, -60.0, 1.0)));
    }

    #[test]
    fn sphere_straddling_side_plane_is_kept() {
        // 90° fov: the right plane at z = -5 sits at x = 5.
        let f = frustum();
        assert!(f.intersects_sphere(&sphere(5.5, 0.0, -5.0, 1.0)));
        assert!(!f.intersects_sphere(&sphere(8.0, 0.0, -5.0, 1.0)));
    }
}
