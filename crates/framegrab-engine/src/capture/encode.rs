use std::borrow::Cow;
use std::path::Path;

use image::{ColorType, ImageError, ImageFormat};

use crate::{CaptureError, Result};

fn color_type(channels: u8) -> Result<ColorType> {
    match channels {
        1 => Ok(ColorType::L8),
        3 => Ok(ColorType::Rgb8),
        4 => Ok(ColorType::Rgba8),
        other => Err(CaptureError::UnsupportedChannels(other)),
    }
}

/// Writes `pixels` to `path` as PNG, creating or overwriting the file.
///
/// `stride` is the distance in bytes between row starts and may exceed
/// `width * channels`. Every argument is checked before the file is created,
/// so a rejected call leaves the file system untouched.
pub fn encode_and_save(
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    stride: usize,
    path: &Path,
) -> Result<()> {
    let color = color_type(channels)?;

    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidArgument(format!(
            "image extent {width}x{height} must be positive"
        )));
    }
    if pixels.is_empty() {
        return Err(CaptureError::EmptyBuffer);
    }

    let row = width as usize * channels as usize;
    if stride < row {
        return Err(CaptureError::InvalidArgument(format!(
            "stride {stride} shorter than row of {row} bytes"
        )));
    }
    let needed = stride * height as usize;
    if pixels.len() < needed {
        return Err(CaptureError::InvalidArgument(format!(
            "buffer of {} bytes, {needed} needed for {width}x{height} at stride {stride}",
            pixels.len()
        )));
    }

    let packed: Cow<'_, [u8]> = if stride == row {
        Cow::Borrowed(&pixels[..needed])
    } else {
        Cow::Owned(
            pixels
                .chunks(stride)
                .take(height as usize)
                .flat_map(|r| &r[..row])
                .copied()
                .collect(),
        )
    };

    image::save_buffer_with_format(path, &packed, width, height, color, ImageFormat::Png).map_err(
        |e| match e {
            ImageError::IoError(source) => CaptureError::FileIo {
                path: path.to_path_buf(),
                source,
            },
            source => CaptureError::Encode {
                path: path.to_path_buf(),
                source,
            },
        },
    )
}
