use super::heap::HeapSlot;

/// Represents a single acquired frame.
///
/// Created by `Gpu::prepare` and consumed by `Gpu::present`. Holding the surface
/// texture prevents acquisition of subsequent frames.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
    /// Swap image view in the render-target heap.
    pub swap_rtv: HeapSlot,
    pub(crate) capture: bool,
}

/// Result of a completed `Gpu::present`.
#[derive(Debug, Clone)]
pub struct PresentInfo {
    /// Completion counter value the CPU waited for.
    pub fence: u64,
    pub barriers: crate::target::BarrierLog,
}
