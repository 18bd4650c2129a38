use std::sync::LazyLock;

use ffcam::{EncoderSettings, PipelineConfig};
use ffmpeg_next::{Rational, codec};
use serde::Deserialize;

/// Environment variable pointing at a JSON recorder config.
pub const CONFIG_ENV: &str = "FFCAM_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Elementary stream output path.
    pub output: String,
    // "mpeg2video", "mpeg4", "libx264", ...
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Extra bytes per row in the synthetic viewfinder buffers.
    pub stride_padding: u32,
    // bps
    pub bit_rate: usize,
    pub fps: i32,
    pub gop_size: u32,
    pub threads: usize,
    /// Stop after this many captured frames; None = until ctrl+c.
    pub frames: Option<u64>,
    /// None = unbounded queue.
    pub queue_capacity: Option<usize>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output: "capture.mpg".to_string(),
            codec: "mpeg2video".to_string(),
            width: 640,
            height: 480,
            stride_padding: 64,
            bit_rate: 400_000,
            fps: 30,
            gop_size: 15,
            threads: 2,
            frames: None,
            queue_capacity: None,
        }
    }
}

impl RecorderConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load() -> anyhow::Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let json = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("read {}: {}", path, e))?;
                Self::from_json(&json)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn stride(&self) -> u32 {
        self.width + self.stride_padding
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            codec_id: codec::Id::MPEG2VIDEO,
            codec_name: Some(self.codec.clone()),
            width: self.width,
            height: self.height,
            bit_rate: self.bit_rate,
            time_base: Rational::new(1, self.fps.max(1)),
            gop_size: self.gop_size,
            thread_count: self.threads,
            ..Default::default()
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let builder = PipelineConfig::builder();
        match self.queue_capacity {
            Some(capacity) => builder.queue_capacity(capacity),
            None => builder.unbounded(),
        }
        .build()
    }
}

pub fn config() -> &'static RecorderConfig {
    static CONFIG: LazyLock<RecorderConfig> = LazyLock::new(|| {
        RecorderConfig::load().unwrap_or_else(|e| {
            log::warn!("invalid recorder config, using defaults: {:#}", e);
            RecorderConfig::default()
        })
    });
    &CONFIG
}
