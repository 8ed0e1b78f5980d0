//! Orbiting view over a field of spinning cubes and bending tubes.
//!
//! Keys: `V` cycles the debug view, `B` toggles bloom, `P` captures the
//! next frame, `Esc` quits.

mod shapes;

use std::f32::consts::FRAC_PI_3;

use anyhow::Result;
use glam::{vec2, vec3, Mat4, Quat, Vec2, Vec3};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use umbra_engine::core::{App, AppControl, FrameCtx, StartCtx};
use umbra_engine::logging::{init_logging, LoggingConfig};
use umbra_engine::mesh::{final_bone_matrices, MeshId, SkinningError};
use umbra_engine::paint::Color;
use umbra_engine::scene::{create_texture, Material, Projection, RenderFlags, MAIN_CAMERA};
use umbra_engine::window::{Runtime, RuntimeConfig};

const GRID: i32 = 3;
const SPACING: f32 = 3.0;
const TUBE_LENGTH: f32 = 2.5;

struct DemoMeshes {
    ground: MeshId,
    cube: MeshId,
    tube: MeshId,
}

#[derive(Default)]
struct Demo {
    meshes: Option<DemoMeshes>,
    cycle_view: bool,
    toggle_bloom: bool,
    capture: bool,
}

impl App for Demo {
    fn on_start(&mut self, ctx: &mut StartCtx<'_>) -> Result<()> {
        let pixels = shapes::checker(64, 8, [200, 200, 200, 255], [90, 90, 100, 255]);
        let checker = create_texture(ctx.device, ctx.queue, "checker", 64, 64, &pixels);

        let ground = ctx.renderer.add_material(Material {
            name: "ground".into(),
            base_color: Color::WHITE,
            albedo: Some(checker),
        });
        let sides = ctx.renderer.add_material(Material {
            name: "cube sides".into(),
            base_color: Color::rgb(0.8, 0.25, 0.2),
            albedo: None,
        });
        let caps = ctx.renderer.add_material(Material {
            name: "cube caps".into(),
            base_color: Color::rgb(0.95, 0.9, 0.8),
            albedo: None,
        });
        let brass = ctx.renderer.add_material(Material {
            name: "brass".into(),
            base_color: Color::rgb(1.0, 0.8, 0.35),
            albedo: None,
        });

        self.meshes = Some(DemoMeshes {
            ground: ctx.renderer.add_mesh(ctx.device, shapes::plane(60.0, ground))?,
            cube: ctx.renderer.add_mesh(ctx.device, shapes::cube(sides, caps))?,
            tube: ctx
                .renderer
                .add_mesh(ctx.device, shapes::skinned_tube(0.25, TUBE_LENGTH, 12, 16, brass))?,
        });

        let mut env = *ctx.renderer.environment();
        env.caustics.intensity = 0.6;
        env.fog.start = 25.0;
        env.fog.end = 70.0;
        ctx.renderer.set_environment(env);

        log::info!("demo scene ready; V cycles debug views, B toggles bloom, P captures");
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::KeyV) => self.cycle_view = true,
            PhysicalKey::Code(KeyCode::KeyB) => self.toggle_bloom = true,
            PhysicalKey::Code(KeyCode::KeyP) => self.capture = true,
            _ => {}
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(meshes) = self.meshes.as_ref() else {
            return AppControl::Continue;
        };
        let t = ctx.time.elapsed;

        if std::mem::take(&mut self.cycle_view) {
            let next = ctx.renderer.debug_view().next();
            ctx.renderer.set_debug_view(next);
            ctx.runtime.set_title(format!("umbra demo ({next:?})"));
        }
        if std::mem::take(&mut self.toggle_bloom) {
            let enabled = !ctx.renderer.config().bloom.enabled;
            ctx.renderer.set_bloom_enabled(enabled);
        }

        if std::mem::take(&mut self.capture) {
            ctx.gpu.request_capture();
        }
        if let Some(shot) = ctx.gpu.take_capture() {
            let lit = shot.rgba.chunks_exact(4).filter(|px| px[..3] != [0, 0, 0]).count();
            log::info!("captured {}x{}, {lit} non-black pixels", shot.width, shot.height);
        }

        let mut env = *ctx.renderer.environment();
        env.caustics.time = t;
        ctx.renderer.set_environment(env);

        let orbit = t * 0.15;
        let eye = vec3(orbit.cos() * 16.0, 7.0, orbit.sin() * 16.0);
        ctx.renderer.register_camera(
            MAIN_CAMERA,
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            Projection::Perspective {
                fov_y: FRAC_PI_3,
                aspect: ctx.window.aspect(),
                near: 0.1,
                far: 200.0,
            },
        );

        if let Err(e) = ctx.renderer.submit_instance(
            meshes.ground,
            Mat4::IDENTITY,
            Color::WHITE,
            vec2(12.0, 12.0),
            Vec2::ZERO,
            RenderFlags::NONE,
        ) {
            log::warn!("ground dropped: {e}");
        }

        for x in -GRID..=GRID {
            for z in -GRID..=GRID {
                let phase = (x * 7 + z * 3) as f32 * 0.37;
                let height = 0.5 + 0.25 * (t + phase).sin().abs();
                let world = Mat4::from_scale_rotation_translation(
                    Vec3::splat(0.6 + 0.2 * phase.sin().abs()),
                    Quat::from_rotation_y(t * 0.5 + phase),
                    vec3(x as f32 * SPACING, height, z as f32 * SPACING),
                );
                let tint = Color::rgb(
                    0.6 + 0.4 * phase.cos().abs(),
                    0.7,
                    0.6 + 0.4 * phase.sin().abs(),
                );
                if let Err(e) = ctx.renderer.submit_instance(
                    meshes.cube,
                    world,
                    tint,
                    Vec2::ONE,
                    Vec2::ZERO,
                    RenderFlags::CAST_SHADOWS,
                ) {
                    log::warn!("cube ({x}, {z}) dropped: {e}");
                }
            }
        }

        for (i, x) in [-1.5_f32, 1.5].iter().enumerate() {
            let bend = (t * 1.3 + i as f32).sin() * 0.7;
            let world = Mat4::from_translation(vec3(*x, 0.0, 0.0) * SPACING + vec3(0.0, 0.0, 1.5));
            let submitted = tube_bones(bend).and_then(|bones| {
                ctx.renderer.submit_skinned_instance(
                    meshes.tube,
                    world,
                    Color::WHITE,
                    Vec2::ONE,
                    Vec2::ZERO,
                    RenderFlags::CAST_SHADOWS,
                    &bones,
                )
            });
            if let Err(e) = submitted {
                log::warn!("tube {i} dropped: {e}");
            }
        }

        let control = ctx.render();
        if let Some(report) = ctx.report().filter(|r| r.frame % 600 == 0) {
            log::info!(
                "frame {}: {} draws, {} instances, light camera {:?}",
                report.frame,
                report.stats.draw_calls,
                report.stats.instances,
                report.light_camera
            );
        }
        control
    }
}

/// Root bone fixed, tip bone rotated about Z around the tube's midpoint.
fn tube_bones(bend: f32) -> Result<Vec<Mat4>, SkinningError> {
    let pivot = vec3(0.0, TUBE_LENGTH * 0.5, 0.0);
    let offsets = [Mat4::IDENTITY, Mat4::from_translation(-pivot)];
    let nodes = [
        Mat4::IDENTITY,
        Mat4::from_translation(pivot) * Mat4::from_rotation_z(bend),
    ];
    final_bone_matrices(&offsets, &nodes)
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut config = RuntimeConfig {
        title: "umbra demo".to_string(),
        ..RuntimeConfig::default()
    };
    config.gpu.allow_readback = true;
    Runtime::run(config, Demo::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_tube_has_identity_bones() {
        let bones = tube_bones(0.0).unwrap();
        assert!(bones.iter().all(|b| b.abs_diff_eq(Mat4::IDENTITY, 1e-6)));
    }

    #[test]
    fn bent_tip_pivots_about_the_midpoint() {
        let bones = tube_bones(1.0).unwrap();
        let mid = vec3(0.0, TUBE_LENGTH * 0.5, 0.0);
        assert!(bones[1].transform_point3(mid).abs_diff_eq(mid, 1e-5));
        assert_eq!(bones[0], Mat4::IDENTITY);
        let top = vec3(0.0, TUBE_LENGTH, 0.0);
        assert!(!bones[1].transform_point3(top).abs_diff_eq(top, 1e-3));
    }
}
