use crate::device::DEPTH_FORMAT;
use crate::paint::Color;
use crate::target::{RenderTarget, RenderTargetDesc, TargetError, TargetId};

pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// View-space distance, read with `textureLoad`.
pub const LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Formats the geometry pass writes, in attachment order.
pub const GBUFFER_FORMATS: [wgpu::TextureFormat; 3] =
    [ALBEDO_FORMAT, NORMAL_FORMAT, LINEAR_DEPTH_FORMAT];

/// Bloom runs at half resolution.
#[inline]
pub fn bloom_size(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// Every offscreen surface of a frame.
///
/// Screen-sized targets follow the swap image on resize; the shadow map keeps
/// the size fixed at init.
pub struct FrameTargets {
    pub albedo: RenderTarget,
    pub normal: RenderTarget,
    /// `R32Float` color plus the geometry pass's depth buffer.
    pub linear_depth: RenderTarget,
    pub shadow: RenderTarget,
    pub hdr: RenderTarget,
    pub bright: RenderTarget,
    pub blur: RenderTarget,
    pub composite: RenderTarget,
}

impl FrameTargets {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        shadow_map_size: u32,
    ) -> Result<Self, TargetError> {
        let (bw, bh) = bloom_size(width, height);
        let color = |id, w, h, format, clear| {
            RenderTarget::create(device, id, RenderTargetDesc::color(w, h, format, clear))
        };
        Ok(Self {
            albedo: color(TargetId::Albedo, width, height, ALBEDO_FORMAT, Color::TRANSPARENT)?,
            normal: color(TargetId::Normal, width, height, NORMAL_FORMAT, Color::TRANSPARENT)?,
            linear_depth: RenderTarget::create(
                device,
                TargetId::LinearDepth,
                RenderTargetDesc {
                    depth_format: Some(DEPTH_FORMAT),
                    ..RenderTargetDesc::color(width, height, LINEAR_DEPTH_FORMAT, Color::TRANSPARENT)
                },
            )?,
            shadow: RenderTarget::create(
                device,
                TargetId::Shadow,
                RenderTargetDesc::depth(shadow_map_size, shadow_map_size, DEPTH_FORMAT),
            )?,
            hdr: color(TargetId::Hdr, width, height, HDR_FORMAT, Color::BLACK)?,
            bright: color(TargetId::Bright, bw, bh, HDR_FORMAT, Color::BLACK)?,
            blur: color(TargetId::Blur, bw, bh, HDR_FORMAT, Color::BLACK)?,
            composite: color(TargetId::Composite, width, height, HDR_FORMAT, Color::BLACK)?,
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), TargetError> {
        let (bw, bh) = bloom_size(width, height);
        for t in [
            &mut self.albedo,
            &mut self.normal,
            &mut self.linear_depth,
            &mut self.hdr,
            &mut self.composite,
        ] {
            t.resize(device, width, height)?;
        }
        self.bright.resize(device, bw, bh)?;
        self.blur.resize(device, bw, bh)?;
        Ok(())
    }

    pub fn get(&self, id: TargetId) -> Option<&RenderTarget> {
        Some(match id {
            TargetId::Swap => return None,
            TargetId::Albedo => &self.albedo,
            TargetId::Normal => &self.normal,
            TargetId::LinearDepth => &self.linear_depth,
            TargetId::Shadow => &self.shadow,
            TargetId::Hdr => &self.hdr,
            TargetId::Bright => &self.bright,
            TargetId::Blur => &self.blur,
            TargetId::Composite => &self.composite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_is_half_size_but_never_empty() {
        assert_eq!(bloom_size(1280, 720), (640, 360));
        assert_eq!(bloom_size(1, 1), (1, 1));
    }
}
