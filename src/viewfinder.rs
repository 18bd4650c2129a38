//! Synthetic NV12 viewfinder.
//!
//! Stands in for a camera driver: a dedicated thread produces padded NV12
//! buffers at a fixed rate and hands each one to a callback, like a
//! viewfinder callback would.

use std::{
    thread::JoinHandle,
    time::{Duration, Instant},
};

use ffcam::CameraFrame;
use tokio_util::sync::CancellationToken;

use crate::config::RecorderConfig;

pub struct SyntheticCamera {
    width: u32,
    height: u32,
    stride: u32,
    fps: u32,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, stride: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            stride: stride.max(width),
            fps: fps.max(1),
        }
    }

    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(
            config.width,
            config.height,
            config.stride(),
            config.fps.max(1) as u32,
        )
    }

    /// Renders frame `index`: a diagonal luma ramp that scrolls over time and
    /// a chroma gradient. Padding bytes are left at 0xFF.
    pub fn render(&self, index: u64) -> CameraFrame {
        let (width, height, stride) = (self.width as usize, self.height as usize, self.stride as usize);
        let uv_offset = stride * height;
        let mut data = vec![0xFF_u8; uv_offset + stride * height / 2];
        let shift = (index * 4) as usize;

        for row in 0..height {
            let line = &mut data[row * stride..row * stride + width];
            for (col, px) in line.iter_mut().enumerate() {
                *px = ((row + col + shift) % 220 + 16) as u8;
            }
        }
        for row in 0..height / 2 {
            let start = uv_offset + row * stride;
            let line = &mut data[start..start + width];
            for (col, pair) in line.chunks_exact_mut(2).enumerate() {
                pair[0] = (64 + col * 128 / (width / 2).max(1)) as u8;
                pair[1] = (64 + row * 128 / (height / 2).max(1)) as u8;
            }
        }

        CameraFrame::nv12(self.width, self.height, self.stride, uv_offset as u64, data)
    }

    /// Starts delivering frames to `callback` until `cancel` fires or `limit`
    /// frames were produced. Cancels the token itself when the limit is hit.
    /// The thread returns the number of frames delivered.
    pub fn spawn<F>(
        self,
        callback: F,
        cancel: CancellationToken,
        limit: Option<u64>,
    ) -> anyhow::Result<JoinHandle<u64>>
    where
        F: Fn(&CameraFrame) + Send + 'static,
    {
        let interval = Duration::from_secs(1) / self.fps;
        let handle = std::thread::Builder::new()
            .name("ffcam-viewfinder".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut index = 0u64;
                while !cancel.is_cancelled() {
                    if limit.is_some_and(|limit| index >= limit) {
                        cancel.cancel();
                        break;
                    }
                    let frame = self.render(index);
                    callback(&frame);
                    index += 1;

                    let next = started + interval * index as u32;
                    if let Some(wait) = next.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                }
                log::info!("viewfinder stopped after {} frames", index);
                index
            })?;
        Ok(handle)
    }
}
