//! NV12 → packed YUV420P repacking.
//!
//! Viewfinder buffers come with row padding and interleaved chroma. The encoder
//! wants three tightly packed planes, so every row is copied without its
//! padding and the UV pairs are split into separate U and V planes.

use thiserror::Error;

use crate::frame::{CameraFrame, PlanarFrame, packed_len};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("stride {stride} is smaller than width {width}")]
    StrideTooSmall { stride: u32, width: u32 },
    #[error("chroma offset {uv_offset} overlaps the luma plane")]
    ChromaOverlap { uv_offset: u64 },
    #[error("frame buffer too short: need {needed} bytes, got {actual}")]
    BufferTooShort { needed: usize, actual: usize },
}

/// Repacks an NV12 viewfinder frame.
///
/// Returns `Ok(None)` for any other frame type; nothing is allocated in that
/// case. The source frame is only borrowed, the caller drops it afterwards.
pub fn convert(frame: &CameraFrame) -> Result<Option<PlanarFrame>, ConvertError> {
    if !frame.is_nv12() {
        return Ok(None);
    }
    check_geometry(frame)?;

    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let uv_offset = frame.uv_offset as usize;
    let src = &frame.data[..];

    let mut packed = vec![0u8; packed_len(frame.width, frame.height)];
    let (luma, chroma) = packed.split_at_mut(width * height);

    for (row, dst) in luma.chunks_exact_mut(width).enumerate() {
        let start = row * stride;
        dst.copy_from_slice(&src[start..start + width]);
    }

    let chroma_len = (width / 2) * (height / 2);
    let (dst_u, dst_v) = chroma.split_at_mut(chroma_len);
    let half_width = width / 2;
    for row in 0..height / 2 {
        let start = uv_offset + row * stride;
        let uv = &src[start..start + half_width * 2];
        let u = &mut dst_u[row * half_width..(row + 1) * half_width];
        let v = &mut dst_v[row * half_width..(row + 1) * half_width];
        for (i, pair) in uv.chunks_exact(2).enumerate() {
            u[i] = pair[0];
            v[i] = pair[1];
        }
    }

    Ok(PlanarFrame::from_packed(packed, frame.width, frame.height))
}

fn check_geometry(frame: &CameraFrame) -> Result<(), ConvertError> {
    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
        return Err(ConvertError::InvalidSize { width, height });
    }
    if frame.stride < width {
        return Err(ConvertError::StrideTooSmall {
            stride: frame.stride,
            width,
        });
    }

    let stride = frame.stride as usize;
    let actual = frame.data.len();
    let too_short = |needed| ConvertError::BufferTooShort { needed, actual };

    let luma_end = (height as usize - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(width as usize))
        .ok_or(too_short(usize::MAX))?;
    let uv_offset = usize::try_from(frame.uv_offset).map_err(|_| too_short(usize::MAX))?;
    if uv_offset < luma_end {
        return Err(ConvertError::ChromaOverlap {
            uv_offset: frame.uv_offset,
        });
    }
    // Saturates on overflow; no buffer is that long.
    let needed = (height as usize / 2 - 1)
        .checked_mul(stride)
        .and_then(|n| n.checked_add(width as usize))
        .and_then(|n| n.checked_add(uv_offset))
        .unwrap_or(usize::MAX);
    if actual < needed {
        return Err(too_short(needed));
    }
    Ok(())
}

#[cfg(test)]
#[path = "converter_test.rs"]
mod converter_test;
