use glam::Vec3;

use crate::paint::Color;

/// Directional light. `direction` is the way the light travels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Color,
    pub intensity: f32,
}

impl DirectionalLight {
    /// Unit travel direction; straight down when `direction` is degenerate.
    pub fn direction(&self) -> Vec3 {
        self.direction.try_normalize().unwrap_or(Vec3::NEG_Y)
    }
}

/// Linear distance fog between `start` and `end` (view-space units).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fog {
    pub color: Color,
    pub start: f32,
    pub end: f32,
}

impl Fog {
    /// Fog blend weight at `distance`: 0 before `start`, 1 past `end`.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.end <= self.start {
            return 0.0;
        }
        ((distance - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }
}

/// Animated caustic pattern projected from above.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Caustics {
    pub color: Color,
    pub intensity: f32,
    pub scale: f32,
    pub speed: f32,
    /// Seconds; advanced by the caller each frame.
    pub time: f32,
}

/// Per-frame lighting parameters pushed by the scene collaborator.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Environment {
    pub light: DirectionalLight,
    pub ambient: Color,
    pub fog: Fog,
    pub caustics: Caustics,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            light: DirectionalLight {
                direction: Vec3::new(-0.4, -1.0, -0.3),
                color: Color::WHITE,
                intensity: 3.0,
            },
            ambient: Color::rgb(0.08, 0.09, 0.11),
            fog: Fog {
                color: Color::rgb(0.5, 0.6, 0.7),
                start: 40.0,
                end: 120.0,
            },
            caustics: Caustics {
                color: Color::rgb(0.6, 0.8, 1.0),
                intensity: 0.0,
                scale: 0.2,
                speed: 0.5,
                time: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_light_points_down() {
        let l = DirectionalLight {
            direction: Vec3::ZERO,
            color: Color::WHITE,
            intensity: 1.0,
        };
        assert_eq!(l.direction(), Vec3::NEG_Y);
    }

    #[test]
    fn fog_ramps_linearly() {
        let f = Fog {
            color: Color::WHITE,
            start: 10.0,
            end: 20.0,
        };
        assert_eq!(f.factor(5.0), 0.0);
        assert_eq!(f.factor(15.0), 0.5);
        assert_eq!(f.factor(30.0), 1.0);
    }

    #[test]
    fn inverted_fog_range_disables_fog() {
        let f = Fog {
            color: Color::WHITE,
            start: 20.0,
            end: 10.0,
        };
        assert_eq!(f.factor(100.0), 0.0);
    }
}
