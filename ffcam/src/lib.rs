/// Registers FFmpeg components. Call once at startup before opening encoders.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod converter;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod packet;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod worker;

pub use encoder::{EncoderSettings, FfmpegEncoder, VideoEncoder, default_codec};
pub use error::{FfcamError, ResultCode};
pub use frame::{CameraFrame, FrameType, PlanarFrame};
pub use packet::EncodedPacket;
pub use pipeline::{Pipeline, PipelineConfig};
pub use sink::PacketSink;
pub use worker::{PipelineEvent, WorkerReport, WorkerState};
