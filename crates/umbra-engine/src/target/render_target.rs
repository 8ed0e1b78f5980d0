use thiserror::Error;

use crate::binding::ShaderView;
use crate::device::{HeapError, HeapSlot, Heaps};
use crate::paint::Color;

use super::barrier::TargetId;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TargetError {
    #[error("render target {0:?} has zero size")]
    ZeroSize(TargetId),

    #[error("render target {0:?} has neither a color nor a depth format")]
    NoSurfaces(TargetId),

    #[error("render target {0:?} needs at least one mip level and one array layer")]
    EmptyImage(TargetId),
}

/// Creation parameters of a render target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub clear: Color,
}

impl RenderTargetDesc {
    pub fn color(width: u32, height: u32, format: wgpu::TextureFormat, clear: Color) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
            color_format: Some(format),
            depth_format: None,
            clear,
        }
    }

    pub fn depth(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
            color_format: None,
            depth_format: Some(format),
            clear: Color::WHITE,
        }
    }

    pub fn validate(&self, id: TargetId) -> Result<(), TargetError> {
        if self.width == 0 || self.height == 0 {
            return Err(TargetError::ZeroSize(id));
        }
        if self.color_format.is_none() && self.depth_format.is_none() {
            return Err(TargetError::NoSurfaces(id));
        }
        if self.mip_levels == 0 || self.array_layers == 0 {
            return Err(TargetError::EmptyImage(id));
        }
        Ok(())
    }
}

/// The views keep the texture alive.
struct Image {
    /// Mip 0, layer 0; what passes render into.
    attachment: wgpu::TextureView,
    /// Every mip and layer; what later passes sample.
    sampled: wgpu::TextureView,
}

impl Image {
    fn new(
        device: &wgpu::Device,
        label: &str,
        desc: &RenderTargetDesc,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.array_layers,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let attachment = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: 0,
            mip_level_count: Some(1),
            base_array_layer: 0,
            array_layer_count: Some(1),
            ..Default::default()
        });
        let sampled = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(if desc.array_layers > 1 {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });
        Self {
            attachment,
            sampled,
        }
    }
}

/// Heap slots holding a target's attachment views for the current frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttachmentSlots {
    pub color: Option<HeapSlot>,
    pub depth: Option<HeapSlot>,
}

/// Color surface with an optional paired depth surface.
///
/// The target owns its images. Its shader-visible view is the color image, or
/// the depth image for depth-only targets such as the shadow map.
pub struct RenderTarget {
    id: TargetId,
    desc: RenderTargetDesc,
    color: Option<Image>,
    depth: Option<Image>,
    sampled: wgpu::TextureView,
}

impl RenderTarget {
    pub fn create(
        device: &wgpu::Device,
        id: TargetId,
        desc: RenderTargetDesc,
    ) -> Result<Self, TargetError> {
        desc.validate(id)?;
        let label = format!("umbra target {id:?}");
        let color = desc
            .color_format
            .map(|f| Image::new(device, &label, &desc, f));
        let depth = desc
            .depth_format
            .map(|f| Image::new(device, &format!("{label} depth"), &desc, f));

        log::debug!(
            "render target {id:?}: {}x{} color {:?} depth {:?}",
            desc.width,
            desc.height,
            desc.color_format,
            desc.depth_format
        );

        let sampled = color
            .as_ref()
            .or(depth.as_ref())
            .map(|i| i.sampled.clone())
            .ok_or(TargetError::NoSurfaces(id))?;

        Ok(Self {
            id,
            desc,
            color,
            depth,
            sampled,
        })
    }

    /// Recreates the images at a new size, keeping formats and clear color.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), TargetError> {
        if width == self.desc.width && height == self.desc.height {
            return Ok(());
        }
        *self = Self::create(
            device,
            self.id,
            RenderTargetDesc {
                width,
                height,
                ..self.desc
            },
        )?;
        Ok(())
    }

    #[inline]
    pub fn id(&self) -> TargetId {
        self.id
    }

    #[inline]
    pub fn desc(&self) -> &RenderTargetDesc {
        &self.desc
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    #[inline]
    pub fn clear_color(&self) -> Color {
        self.desc.clear
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color.as_ref().map(|i| &i.attachment)
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|i| &i.attachment)
    }

    /// The view later passes sample.
    pub fn shader_view(&self) -> ShaderView {
        ShaderView::Texture(self.sampled.clone())
    }

    /// Places the attachment views into the render-target and depth-stencil heaps.
    pub fn allocate_attachments(&self, heaps: &mut Heaps) -> Result<AttachmentSlots, HeapError> {
        let color = self
            .color
            .as_ref()
            .map(|i| heaps.render_target.allocate(i.attachment.clone()))
            .transpose()?;
        let depth = self
            .depth
            .as_ref()
            .map(|i| heaps.depth_stencil.allocate(i.attachment.clone()))
            .transpose()?;
        Ok(AttachmentSlots { color, depth })
    }
}

/// One color output of a pass.
#[derive(Debug, Copy, Clone)]
pub struct ColorOutput {
    pub slot: HeapSlot,
    /// `Some` clears before drawing, `None` keeps the previous contents.
    pub clear: Option<Color>,
}

/// Begins a render pass whose attachments come from the frame heaps.
pub fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    heaps: &Heaps,
    colors: &[ColorOutput],
    depth: Option<(HeapSlot, Option<f32>)>,
) -> Result<wgpu::RenderPass<'e>, HeapError> {
    let color_views = colors
        .iter()
        .map(|c| heaps.render_target.get(c.slot))
        .collect::<Result<Vec<_>, _>>()?;
    let depth_view = depth
        .map(|(slot, clear)| heaps.depth_stencil.get(slot).map(|v| (v, clear)))
        .transpose()?;

    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = colors
        .iter()
        .zip(&color_views)
        .map(|(c, view)| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: match c.clear {
                        Some(color) => wgpu::LoadOp::Clear(color.to_wgpu()),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        })
        .collect();

    Ok(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &color_attachments,
        depth_stencil_attachment: depth_view.map(|(view, clear)| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: match clear {
                        Some(d) => wgpu::LoadOp::Clear(d),
                        None => wgpu::LoadOp::Load,
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::TextureFormat as F;

    #[test]
    fn depth_only_target_is_valid() {
        let d = RenderTargetDesc::depth(1024, 1024, F::Depth32Float);
        assert_eq!(d.validate(TargetId::Shadow), Ok(()));
    }

    #[test]
    fn target_without_images_is_rejected() {
        let d = RenderTargetDesc {
            color_format: None,
            ..RenderTargetDesc::depth(4, 4, F::Depth32Float)
        };
        let d = RenderTargetDesc {
            depth_format: None,
            ..d
        };
        assert_eq!(d.validate(TargetId::Hdr), Err(TargetError::NoSurfaces(TargetId::Hdr)));
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let d = RenderTargetDesc::color(0, 16, F::Rgba16Float, Color::BLACK);
        assert_eq!(d.validate(TargetId::Hdr), Err(TargetError::ZeroSize(TargetId::Hdr)));
    }

    #[test]
    fn zero_mips_is_rejected() {
        let d = RenderTargetDesc {
            mip_levels: 0,
            ..RenderTargetDesc::color(8, 8, F::Rgba8Unorm, Color::BLACK)
        };
        assert_eq!(d.validate(TargetId::Albedo), Err(TargetError::EmptyImage(TargetId::Albedo)));
    }
}
