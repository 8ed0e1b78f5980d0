//! Direct-copy debug path: swap image → mapped buffer → tightly packed RGBA8.

use anyhow::{Context, Result};

const BYTES_PER_PIXEL: u32 = 4;

/// A captured frame as tightly packed RGBA8 rows, top row first.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Row pitch satisfying `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Removes row padding and converts BGRA surfaces to RGBA.
pub(crate) fn unpack_rows(
    padded: &[u8],
    width: u32,
    height: u32,
    padded_row: u32,
    bgra: bool,
) -> Vec<u8> {
    let row = (width * BYTES_PER_PIXEL) as usize;
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * padded_row as usize;
        out.extend_from_slice(&padded[start..start + row]);
    }
    if bgra {
        for px in out.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    out
}

/// Staging buffer for one pending capture.
pub(crate) struct Readback {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
    bgra: bool,
}

impl Readback {
    /// Records the copy from `texture` into a fresh staging buffer.
    pub(crate) fn record(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) -> Self {
        let size = texture.size();
        let padded_row = padded_bytes_per_row(size.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("umbra readback"),
            size: (padded_row * size.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );

        let bgra = matches!(
            texture.format(),
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );

        Self {
            buffer,
            width: size.width,
            height: size.height,
            padded_row,
            bgra,
        }
    }

    /// Maps the buffer. The submission that wrote it must already be complete.
    pub(crate) fn read(self, device: &wgpu::Device) -> Result<CapturedFrame> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .context("device poll failed while mapping readback buffer")?;
        rx.recv()
            .context("readback map callback dropped")?
            .context("failed to map readback buffer")?;

        let rgba = {
            let data = slice.get_mapped_range();
            unpack_rows(&data, self.width, self.height, self.padded_row, self.bgra)
        };
        self.buffer.unmap();

        Ok(CapturedFrame {
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_pitch_is_aligned() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
    }

    #[test]
    fn unpack_strips_padding_and_swizzles() {
        // 1×2 image, 8-byte padded rows.
        let padded = [
            1, 2, 3, 4, 0, 0, 0, 0, //
            5, 6, 7, 8, 0, 0, 0, 0,
        ];
        assert_eq!(unpack_rows(&padded, 1, 2, 8, false), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(unpack_rows(&padded, 1, 2, 8, true), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }
}
