use anyhow::{Context, Result};
use wgpu::SurfaceError;

use crate::binding::ShaderView;
use crate::paint::Color;
use crate::target::{BarrierError, BarrierTracker};

use super::frame::{GpuFrame, PresentInfo};
use super::heap::{DescriptorHeap, HeapCapacities, HeapKind};
use super::readback::{CapturedFrame, Readback};
use super::ring::ConstantRing;
use super::surface::{self, DefaultDepth};
use super::{GpuInit, SurfaceErrorAction};

/// The three per-frame descriptor heaps.
pub struct Heaps {
    pub render_target: DescriptorHeap<wgpu::TextureView>,
    pub depth_stencil: DescriptorHeap<wgpu::TextureView>,
    pub shader_visible: DescriptorHeap<ShaderView>,
}

impl Heaps {
    fn new(caps: HeapCapacities) -> Self {
        Self {
            render_target: DescriptorHeap::new(HeapKind::RenderTarget, caps.render_target),
            depth_stencil: DescriptorHeap::new(HeapKind::DepthStencil, caps.depth_stencil),
            shader_visible: DescriptorHeap::new(HeapKind::ShaderVisible, caps.shader_visible),
        }
    }

    fn reset(&mut self) {
        self.render_target.reset();
        self.depth_stencil.reset();
        self.shader_visible.reset();
    }
}

/// Slot and byte usage at the time of the query.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct HeapUsage {
    pub render_target: u32,
    pub depth_stencil: u32,
    pub shader_visible: u32,
    pub constant_bytes: u64,
}

/// Disjoint mutable borrows of the frame-shared device state.
pub struct GpuParts<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub heaps: &'a mut Heaps,
    pub ring: &'a mut ConstantRing,
    pub barriers: &'a mut BarrierTracker,
}

/// Owns wgpu core objects, the swap surface, the descriptor heaps and the
/// frame fence.
///
/// One frame is recorded, submitted and waited on at a time:
/// `reset_heaps` → `prepare` → passes → `present`.
pub struct Gpu<'w> {
    /// wgpu instance used to create the adapter and surface.
    instance: wgpu::Instance,

    /// Swap surface.
    surface: wgpu::Surface<'w>,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    device: wgpu::Device,
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Depth buffer bound together with the swap image.
    depth: DefaultDepth,

    heaps: Heaps,
    ring: ConstantRing,
    barriers: BarrierTracker,

    /// Completion counter; incremented once per submitted frame.
    fence: u64,
    heaps_reset: bool,

    allow_readback: bool,
    capture_requested: bool,
    last_capture: Option<CapturedFrame>,
}

impl<'w> Gpu<'w> {
    /// Creates the device layer for `target`.
    ///
    /// Every failure here is fatal: the engine cannot run without an adapter,
    /// a device or a configured swap surface.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'w>>,
        width: u32,
        height: u32,
        init: GpuInit,
    ) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "surface has zero size");

        let GpuInit {
            prefer_srgb,
            present_mode,
            alpha_mode,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
            heap_capacities,
            allow_readback,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        log::info!("adapter: {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("umbra device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps.formats, prefer_srgb)
            .context("no supported surface formats")?;
        let alpha_mode = surface::choose_alpha_mode(&surface_caps, alpha_mode);

        let usage = surface::swap_usage(allow_readback);
        anyhow::ensure!(
            surface_caps.usages.contains(usage),
            "surface does not support usage {usage:?}"
        );

        let config = wgpu::SurfaceConfiguration {
            usage,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let depth = DefaultDepth::new(&device, width, height);
        let ring = ConstantRing::new(&device, heap_capacities.constant_bytes);

        log::debug!(
            "device ready: {width}x{height} {format:?}, heaps {:?}",
            heap_capacities
        );

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            config,
            depth,
            heaps: Heaps::new(heap_capacities),
            ring,
            barriers: BarrierTracker::new(),
            fence: 0,
            heaps_reset: false,
            allow_readback,
            capture_requested: false,
            last_capture: None,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Current swap image size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn heap_usage(&self) -> HeapUsage {
        HeapUsage {
            render_target: self.heaps.render_target.len(),
            depth_stencil: self.heaps.depth_stencil.len(),
            shader_visible: self.heaps.shader_visible.len(),
            constant_bytes: self.ring.used(),
        }
    }

    pub fn parts(&mut self) -> GpuParts<'_> {
        GpuParts {
            device: &self.device,
            queue: &self.queue,
            heaps: &mut self.heaps,
            ring: &mut self.ring,
            barriers: &mut self.barriers,
        }
    }

    /// Reconfigures the surface and the default depth buffer after a resize.
    ///
    /// A zero-sized surface cannot be configured; the resize is deferred.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !surface::apply_resize(&self.surface, &self.device, &mut self.config, width, height) {
            return;
        }
        let current = self.depth.texture.size();
        if current.width != width || current.height != height {
            self.depth = DefaultDepth::new(&self.device, width, height);
        }
    }

    /// Empties all three descriptor heaps and the constant ring.
    ///
    /// Must run once per frame before any pass records draws.
    pub fn reset_heaps(&mut self) {
        self.heaps.reset();
        self.ring.reset();
        self.heaps_reset = true;
    }

    /// Acquires the next swap image, binds it with the default depth buffer and
    /// clears both.
    pub fn prepare(&mut self, clear: Color) -> std::result::Result<GpuFrame, SurfaceError> {
        if !self.heaps_reset {
            log::error!("prepare() called without reset_heaps(); previous frame slots would alias");
            debug_assert!(self.heaps_reset, "reset_heaps must precede prepare");
            self.reset_heaps();
        }

        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("umbra frame encoder"),
            });

        if let Err(e) = self.barriers.acquire_swap() {
            log::error!("swap image in unexpected state: {e}; resetting tracker");
            self.barriers.reset();
            let _ = self.barriers.acquire_swap();
        }

        // The heaps were just reset, so this slot always fits.
        let swap_rtv = self
            .heaps
            .render_target
            .allocate(view.clone())
            .map_err(|_| SurfaceError::Other)?;

        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("umbra prepare clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        let capture = std::mem::take(&mut self.capture_requested);

        Ok(GpuFrame {
            surface_texture,
            view,
            encoder,
            swap_rtv,
            capture,
        })
    }

    /// Transitions the swap image back to presentable, submits, blocks until
    /// the GPU has finished the frame, then presents.
    pub fn present(&mut self, frame: GpuFrame) -> std::result::Result<PresentInfo, BarrierError> {
        let barriers = match self
            .barriers
            .present_swap()
            .and_then(|()| self.barriers.finish_frame())
        {
            Ok(log) => log,
            Err(e) => {
                self.barriers.reset();
                self.heaps_reset = false;
                return Err(e);
            }
        };

        let GpuFrame {
            surface_texture,
            view,
            mut encoder,
            capture,
            ..
        } = frame;

        let readback = capture.then(|| {
            Readback::record(&self.device, &mut encoder, &surface_texture.texture)
        });

        let index = self.queue.submit(std::iter::once(encoder.finish()));
        self.fence += 1;

        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        }) {
            log::error!("waiting for frame {} failed: {e}", self.fence);
        }

        if let Some(rb) = readback {
            match rb.read(&self.device) {
                Ok(captured) => self.last_capture = Some(captured),
                Err(e) => log::warn!("frame capture failed: {e:#}"),
            }
        }

        drop(view);
        surface_texture.present();
        self.heaps_reset = false;

        Ok(PresentInfo {
            fence: self.fence,
            barriers,
        })
    }

    /// Abandons a frame that failed mid-recording. Nothing is submitted.
    pub fn discard(&mut self, frame: GpuFrame) {
        drop(frame);
        self.barriers.reset();
        self.heaps_reset = false;
    }

    /// Requests a copy of the next presented swap image.
    ///
    /// Ignored unless the device was created with `allow_readback`.
    pub fn request_capture(&mut self) {
        if self.allow_readback {
            self.capture_requested = true;
        } else {
            log::warn!("frame capture requested but readback is disabled");
        }
    }

    pub fn take_capture(&mut self) -> Option<CapturedFrame> {
        self.last_capture.take()
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        surface::map_surface_error(&self.surface, &self.device, &self.config, err)
    }
}
