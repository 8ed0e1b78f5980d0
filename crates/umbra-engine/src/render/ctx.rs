use bytemuck::Pod;

use crate::binding::{BufferSpan, ShaderView};
use crate::device::{ConstantRing, GpuParts, HeapError, HeapRange, HeapSlot, Heaps};
use crate::target::{AttachmentSlots, BarrierTracker, RenderTarget};

use super::error::FrameError;

/// Pass-facing view of the frame: device, the frame heaps and the encoder.
///
/// Every allocation made through it is valid until the next heap reset.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub heaps: &'a mut Heaps,
    pub ring: &'a mut ConstantRing,
    pub barriers: &'a mut BarrierTracker,
    pub encoder: &'a mut wgpu::CommandEncoder,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(parts: GpuParts<'a>, encoder: &'a mut wgpu::CommandEncoder) -> Self {
        Self {
            device: parts.device,
            queue: parts.queue,
            heaps: parts.heaps,
            ring: parts.ring,
            barriers: parts.barriers,
            encoder,
        }
    }

    /// Writes `value` into the constant ring and places its view in the
    /// shader-visible heap as a one-descriptor range.
    pub fn push_constants<T: Pod>(&mut self, value: &T) -> Result<HeapRange, HeapError> {
        let alloc = self.ring.push(self.queue, value)?;
        let span = BufferSpan {
            buffer: self.ring.buffer().clone(),
            offset: alloc.offset,
            size: alloc.size,
        };
        self.heaps
            .shader_visible
            .allocate_range([ShaderView::Constant(span)])
    }

    pub fn shader_views<I>(&mut self, views: I) -> Result<HeapRange, HeapError>
    where
        I: IntoIterator<Item = ShaderView>,
        I::IntoIter: ExactSizeIterator,
    {
        self.heaps.shader_visible.allocate_range(views)
    }

    /// Sampled views of `targets`, as one contiguous range.
    pub fn target_views(&mut self, targets: &[&RenderTarget]) -> Result<HeapRange, HeapError> {
        self.shader_views(targets.iter().map(|t| t.shader_view()))
    }

    pub fn attachments(&mut self, target: &RenderTarget) -> Result<AttachmentSlots, HeapError> {
        target.allocate_attachments(self.heaps)
    }

    pub fn color_slot(&mut self, target: &RenderTarget) -> Result<HeapSlot, FrameError> {
        self.attachments(target)?
            .color
            .ok_or(FrameError::MissingAttachment(target.id(), "color"))
    }

    pub fn depth_slot(&mut self, target: &RenderTarget) -> Result<HeapSlot, FrameError> {
        self.attachments(target)?
            .depth
            .ok_or(FrameError::MissingAttachment(target.id(), "depth"))
    }
}
