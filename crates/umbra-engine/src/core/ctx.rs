use winit::window::Window;

use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{FrameOutcome, FrameReport, Renderer};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Handles available to `App::on_start`.
pub struct StartCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub renderer: &'a mut Renderer,
}

/// Borrowed window handle.
pub struct WindowCtx<'a> {
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Physical surface size.
    pub fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Width over height, 1 for a collapsed window.
    pub fn aspect(&self) -> f32 {
        match self.size() {
            (w, h) if w > 0 && h > 0 => w as f32 / h as f32,
            _ => 1.0,
        }
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub renderer: &'a mut Renderer,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
    pub(crate) last_report: Option<FrameReport>,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Renders and presents everything submitted this frame.
    ///
    /// A lost or outdated surface skips the frame. A fatal surface error or a
    /// frame that overran a heap or broke barrier order asks the runtime to
    /// exit; both are logged.
    pub fn render(&mut self) -> AppControl {
        self.window.window.pre_present_notify();
        match self.renderer.render_frame(self.gpu) {
            Ok(FrameOutcome::Presented(report)) => {
                self.last_report = Some(report);
                AppControl::Continue
            }
            Ok(FrameOutcome::Skipped(SurfaceErrorAction::Fatal)) => AppControl::Exit,
            Ok(FrameOutcome::Skipped(_)) => AppControl::Continue,
            Err(e) => {
                log::error!("frame {} failed: {e}", self.time.frame_index);
                AppControl::Exit
            }
        }
    }

    /// Report of the frame `render` presented, if any.
    pub fn report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }
}
