use std::sync::mpsc;

use crate::backend::ReadbackTicket;
use crate::{CaptureError, Result};

/// Row pitch of a texture-to-buffer copy, rounded up to the 256-byte
/// alignment wgpu requires.
pub(crate) fn padded_bytes_per_row(width: u32, bytes_per_pixel: u32) -> u32 {
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies `height` rows of `row_len` bytes out of a buffer with pitch
/// `padded_row`.
pub(crate) fn strip_padding(data: &[u8], row_len: usize, padded_row: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row_len * height);
    for row in data.chunks(padded_row).take(height) {
        out.extend_from_slice(&row[..row_len]);
    }
    out
}

/// A texture copy waiting in a mappable buffer.
pub(crate) struct StagedReadback {
    pub ticket: ReadbackTicket,
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row: u32,
}

impl StagedReadback {
    /// Records a copy of `texture` into a new staging buffer.
    pub fn record(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ticket: ReadbackTicket,
        texture: &wgpu::Texture,
    ) -> Self {
        let size = texture.size();
        let padded_row = padded_bytes_per_row(size.width, 4);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("framegrab readback"),
            size: padded_row as u64 * size.height as u64,
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
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );

        Self {
            ticket,
            buffer,
            width: size.width,
            height: size.height,
            padded_row,
        }
    }
}

/// Maps every staged buffer and returns tightly packed pixels per ticket.
///
/// Blocks until the device has finished the submitted work.
pub(crate) fn resolve_all(
    device: &wgpu::Device,
    staged: Vec<StagedReadback>,
) -> Result<Vec<(ReadbackTicket, Vec<u8>)>> {
    if staged.is_empty() {
        return Ok(Vec::new());
    }

    let (tx, rx) = mpsc::channel();
    for (i, s) in staged.iter().enumerate() {
        let tx = tx.clone();
        s.buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |r| {
                tx.send((i, r)).ok();
            });
    }
    drop(tx);

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| CaptureError::Device(format!("poll failed: {e}")))?;

    for (i, result) in rx.iter() {
        result.map_err(|e| {
            CaptureError::Device(format!("mapping read-back {} failed: {e}", staged[i].ticket.ready_frame))
        })?;
    }

    let out = staged
        .into_iter()
        .map(|s| {
            let pixels = {
                let view = s.buffer.slice(..).get_mapped_range();
                strip_padding(&view, s.width as usize * 4, s.padded_row as usize, s.height as usize)
            };
            s.buffer.unmap();
            (s.ticket, pixels)
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_256_bytes() {
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(800, 4), 3328);
        assert_eq!(padded_bytes_per_row(1, 4), 256);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let mut data = vec![0u8; 2 * 256];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        let out = strip_padding(&data, 8, 256, 2);
        assert_eq!(out, (1..=16).collect::<Vec<u8>>());
    }
}
