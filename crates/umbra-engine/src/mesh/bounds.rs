use glam::{Mat4, Vec3};

/// Object-space bounding sphere used by the frustum test.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Sphere around the axis-aligned box of `points`. Empty input yields a
    /// zero-radius sphere at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let pts: Vec<Vec3> = points.into_iter().collect();
        if pts.is_empty() {
            return Self {
                center: Vec3::ZERO,
                radius: 0.0,
            };
        }
        let (min, max) = pts.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        );
        let center = (min + max) * 0.5;
        let radius = pts
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f32, f32::max);
        Self { center, radius }
    }

    /// World-space sphere under `world`; the radius follows the largest axis scale.
    pub fn transformed(&self, world: &Mat4) -> Self {
        let scale = world
            .x_axis
            .truncate()
            .length()
            .max(world.y_axis.truncate().length())
            .max(world.z_axis.truncate().length());
        Self {
            center: world.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn sphere_encloses_all_points() {
        let pts = [vec3(-1.0, 0.0, 0.0), vec3(3.0, 0.0, 0.0), vec3(1.0, 2.0, 0.0)];
        let s = BoundingSphere::from_points(pts);
        assert_eq!(s.center, vec3(1.0, 1.0, 0.0));
        for p in pts {
            assert!(p.distance(s.center) <= s.radius + 1e-5);
        }
    }

    #[test]
    fn transform_scales_radius_by_largest_axis() {
        let s = BoundingSphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        let w = Mat4::from_scale_rotation_translation(
            vec3(1.0, 4.0, 2.0),
            glam::Quat::IDENTITY,
            vec3(5.0, 0.0, 0.0),
        );
        let t = s.transformed(&w);
        assert_eq!(t.center, vec3(5.0, 0.0, 0.0));
        assert!((t.radius - 4.0).abs() < 1e-5);
    }
}
