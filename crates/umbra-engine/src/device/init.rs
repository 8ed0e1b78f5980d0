use super::heap::HeapCapacities;

/// Depth format of the default depth buffer and every render-target depth surface.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Initialization parameters for the device layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available.
    ///
    /// The tone-map pass writes linear values and relies on the surface encoding.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for the surface.
    ///
    /// If provided but unsupported on the current surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Swap images kept by the presentation engine. The core itself only ever
    /// has one frame outstanding.
    pub desired_maximum_frame_latency: u32,

    /// Fixed per-frame capacities of the descriptor heaps and constant ring.
    pub heap_capacities: HeapCapacities,

    /// Adds `COPY_SRC` to the swap images so frames can be captured.
    pub allow_readback: bool,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            heap_capacities: HeapCapacities::default(),
            allow_readback: false,
        }
    }
}
