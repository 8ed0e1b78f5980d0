use std::collections::HashMap;

use glam::{Mat4, Vec3};

use super::frustum::Frustum;

/// Camera the geometry pass renders from.
pub const MAIN_CAMERA: &str = "MainCamera";
/// Camera the shadow pass renders from.
pub const LIGHT_CAMERA: &str = "LightCamera";

/// Projection parameters. Depth maps to `0..1` (wgpu clip space).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect.max(f32::EPSILON), near, far),
            Projection::Orthographic {
                width,
                height,
                near,
                far,
            } => Mat4::orthographic_rh(
                -width * 0.5,
                width * 0.5,
                -height * 0.5,
                height * 0.5,
                near,
                far,
            ),
        }
    }

    pub fn near_far(&self) -> (f32, f32) {
        match *self {
            Projection::Perspective { near, far, .. } | Projection::Orthographic { near, far, .. } => {
                (near, far)
            }
        }
    }
}

/// View/projection data of one camera for one frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraSnapshot {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl CameraSnapshot {
    pub fn new(view: Mat4, projection: Projection) -> Self {
        let (near, far) = projection.near_far();
        Self {
            view,
            projection: projection.matrix(),
            position: view.inverse().w_axis.truncate(),
            near,
            far,
        }
    }

    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, projection: Projection) -> Self {
        Self::new(Mat4::look_at_rh(eye, target, up), projection)
    }

    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }
}

/// Cameras registered for the current frame, looked up by name.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    cameras: HashMap<String, CameraSnapshot>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) `name` for this frame.
    pub fn register(&mut self, name: impl Into<String>, view: Mat4, projection: Projection) {
        self.register_snapshot(name, CameraSnapshot::new(view, projection));
    }

    pub fn register_snapshot(&mut self, name: impl Into<String>, snapshot: CameraSnapshot) {
        self.cameras.insert(name.into(), snapshot);
    }

    pub fn get(&self, name: &str) -> Option<&CameraSnapshot> {
        self.cameras.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.cameras.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Drops every registration; done after each frame.
    pub fn clear(&mut self) {
        self.cameras.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    fn persp() -> Projection {
        Projection::Perspective {
            fov_y: 1.0,
            aspect: 1.5,
            near: 0.1,
            far: 100.0,
        }
    }

    #[test]
    fn position_is_recovered_from_view() {
        let eye = vec3(3.0, 4.0, 5.0);
        let cam = CameraSnapshot::look_at(eye, Vec3::ZERO, Vec3::Y, persp());
        assert!(cam.position.abs_diff_eq(eye, 1e-4));
        assert_eq!((cam.near, cam.far), (0.1, 100.0));
    }

    #[test]
    fn registry_lookup_and_clear() {
        let mut r = CameraRegistry::new();
        r.register(MAIN_CAMERA, Mat4::IDENTITY, persp());
        assert!(r.contains(MAIN_CAMERA));
        assert!(r.get(LIGHT_CAMERA).is_none());
        r.clear();
        assert!(r.is_empty());
    }

    #[test]
    fn orthographic_maps_near_to_zero_depth() {
        let p = Projection::Orthographic {
            width: 10.0,
            height: 10.0,
            near: 1.0,
            far: 11.0,
        };
        let clip = p.matrix() * glam::vec4(0.0, 0.0, -1.0, 1.0);
        assert!(clip.z.abs() < 1e-6);
    }
}
