use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// Pixel layout tag attached to every viewfinder buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Semi-planar 4:2:0: luma plane followed by interleaved UV rows.
    Nv12,
    Yuv420p,
    Rgb8888,
    Jpeg,
    Other(u32),
}

/// A buffer handed over by the camera viewfinder.
///
/// Rows are `stride` bytes apart and may carry padding past `width`. The
/// interleaved chroma plane starts at `uv_offset` and uses the same stride.
#[derive(Clone)]
pub struct CameraFrame {
    pub frame_type: FrameType,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub uv_offset: u64,
    pub data: Bytes,
}

impl CameraFrame {
    pub fn nv12(width: u32, height: u32, stride: u32, uv_offset: u64, data: Vec<u8>) -> Self {
        Self {
            frame_type: FrameType::Nv12,
            width,
            height,
            stride,
            uv_offset,
            data: Bytes::from(data),
        }
    }

    pub fn is_nv12(&self) -> bool {
        self.frame_type == FrameType::Nv12
    }
}

impl Display for CameraFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "CameraFrame type: {:?}, width: {}, height: {}, stride: {}, uv_offset: {}, data_len: {}",
            self.frame_type,
            self.width,
            self.height,
            self.stride,
            self.uv_offset,
            self.data.len()
        )
    }
}

/// Packed YUV 4:2:0 frame: luma, then U, then V, without row padding.
pub struct PlanarFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PlanarFrame {
    /// Wraps an already packed buffer. Returns `None` if its length is not
    /// exactly `width * height * 3 / 2`.
    pub fn from_packed(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != packed_len(width, height) {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte offset of the U plane; equals `width * height`.
    pub fn uv_offset(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn y(&self) -> &[u8] {
        &self.data[..self.uv_offset()]
    }

    pub fn u(&self) -> &[u8] {
        let start = self.uv_offset();
        &self.data[start..start + self.chroma_len()]
    }

    pub fn v(&self) -> &[u8] {
        let start = self.uv_offset() + self.chroma_len();
        &self.data[start..start + self.chroma_len()]
    }

    fn chroma_len(&self) -> usize {
        (self.width as usize / 2) * (self.height as usize / 2)
    }

    /// Copies the planes into an FFmpeg YUV420P frame, honoring FFmpeg's own
    /// line alignment, and stamps it with `pts`.
    pub fn to_video(&self, pts: i64) -> ffmpeg_next::frame::Video {
        let mut frame = ffmpeg_next::frame::Video::new(
            ffmpeg_next::format::Pixel::YUV420P,
            self.width,
            self.height,
        );
        let planes: [(&[u8], usize); 3] = [
            (self.y(), self.width as usize),
            (self.u(), self.width as usize / 2),
            (self.v(), self.width as usize / 2),
        ];
        for (index, (src, row_len)) in planes.into_iter().enumerate() {
            let dst_stride = frame.stride(index);
            let dst = frame.data_mut(index);
            for (row, src_row) in src.chunks_exact(row_len).enumerate() {
                let start = row * dst_stride;
                dst[start..start + row_len].copy_from_slice(src_row);
            }
        }
        frame.set_pts(Some(pts));
        frame
    }
}

impl Display for PlanarFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "PlanarFrame width: {}, height: {}, data_len: {}",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

/// Size in bytes of a packed 4:2:0 frame.
pub fn packed_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}
