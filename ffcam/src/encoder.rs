use std::collections::VecDeque;

use ffmpeg_next::{Dictionary, Rational, codec, color, format::Pixel};

use crate::{error::FfcamError, frame::PlanarFrame, packet::EncodedPacket};

/// The two calls the encoding worker makes on a codec.
///
/// Implementations are moved into the worker thread and only ever driven from
/// there, one call at a time.
pub trait VideoEncoder: Send {
    /// `Some(frame)` encodes one frame stamped with `pts`; `None` asks the
    /// codec to flush what it has buffered. Either call may or may not produce
    /// a packet. `Ok(None)` during a flush means the codec is drained.
    fn encode(
        &mut self,
        frame: Option<&PlanarFrame>,
        pts: i64,
    ) -> anyhow::Result<Option<EncodedPacket>>;

    fn name(&self) -> &str {
        "encoder"
    }
}

#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub codec_id: codec::Id,
    /// Looked up before `codec_id` when set, e.g. "libx264".
    pub codec_name: Option<String>,
    pub width: u32,
    pub height: u32,
    pub bit_rate: usize,
    pub time_base: Rational,
    pub gop_size: u32,
    pub colorspace: color::Space,
    pub thread_count: usize,
    pub pixel_format: Pixel,
    pub options: Vec<(String, String)>,
}

impl EncoderSettings {
    pub fn new(codec_id: codec::Id, width: u32, height: u32) -> Self {
        Self {
            codec_id,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn frame_rate(&self) -> Rational {
        self.time_base.invert()
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec_id: codec::Id::MPEG2VIDEO,
            codec_name: None,
            width: 288,
            height: 512,
            bit_rate: 400_000,
            time_base: Rational::new(1, 30),
            gop_size: 15,
            colorspace: color::Space::SMPTE170M,
            thread_count: 2,
            pixel_format: Pixel::YUV420P,
            options: Vec::new(),
        }
    }
}

/// Opens an encoder for `codec_id` at `width`x`height` with the default
/// settings (400 kbit/s, 30 fps time base, GOP of 15, SMPTE 170M, 2 threads).
pub fn default_codec(
    codec_id: codec::Id,
    width: i64,
    height: i64,
) -> Result<FfmpegEncoder, FfcamError> {
    if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
        return Err(FfcamError::InvalidDimensions { width, height });
    }
    FfmpegEncoder::open(EncoderSettings::new(codec_id, width as u32, height as u32))
}

fn find_codec(settings: &EncoderSettings) -> Option<ffmpeg_next::Codec> {
    if let Some(ref name) = settings.codec_name {
        if let Some(codec) = ffmpeg_next::encoder::find_by_name(name) {
            return Some(codec);
        }
        log::warn!("encoder {} not found, trying {:?}", name, settings.codec_id);
    }
    ffmpeg_next::encoder::find(settings.codec_id)
}

/// [`VideoEncoder`] backed by an FFmpeg codec context.
pub struct FfmpegEncoder {
    inner: ffmpeg_next::codec::encoder::Video,
    settings: EncoderSettings,
    name: String,
    pending: VecDeque<EncodedPacket>,
    eof_sent: bool,
}

impl FfmpegEncoder {
    pub fn open(settings: EncoderSettings) -> Result<Self, FfcamError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(FfcamError::InvalidDimensions {
                width: settings.width as i64,
                height: settings.height as i64,
            });
        }

        let codec = match find_codec(&settings) {
            Some(codec) => codec,
            None => {
                // Codecs may not be registered yet on a fresh process.
                if let Err(e) = crate::init() {
                    log::warn!("{:#}", e);
                }
                find_codec(&settings).ok_or(FfcamError::CodecNotFound(settings.codec_id))?
            }
        };
        let name = codec.name().to_string();

        let mut context = ffmpeg_next::codec::Context::new_with_codec(codec);
        unsafe {
            (*context.as_mut_ptr()).thread_count = settings.thread_count as i32;
        }
        let mut encoder = context
            .encoder()
            .video()
            .map_err(FfcamError::CouldNotOpenCodec)?;
        encoder.set_width(settings.width);
        encoder.set_height(settings.height);
        encoder.set_format(settings.pixel_format);
        encoder.set_bit_rate(settings.bit_rate);
        encoder.set_time_base(settings.time_base);
        encoder.set_frame_rate(Some(settings.frame_rate()));
        encoder.set_gop(settings.gop_size);
        encoder.set_colorspace(settings.colorspace);

        let mut options = Dictionary::new();
        for (key, value) in settings.options.iter() {
            options.set(key, value);
        }
        let inner = encoder
            .open_with(options)
            .map_err(FfcamError::CouldNotOpenCodec)?;
        log::info!(
            "encoder opened: {} {}x{} @ {} bps",
            name,
            settings.width,
            settings.height,
            settings.bit_rate
        );

        Ok(Self {
            inner,
            settings,
            name,
            pending: VecDeque::new(),
            eof_sent: false,
        })
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    fn receive_packets(&mut self) -> anyhow::Result<()> {
        let mut packet = ffmpeg_next::codec::packet::Packet::empty();
        loop {
            match self.inner.receive_packet(&mut packet) {
                Ok(()) => self.pending.push_back(EncodedPacket::from(&packet)),
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    return Ok(());
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &mut self,
        frame: Option<&PlanarFrame>,
        pts: i64,
    ) -> anyhow::Result<Option<EncodedPacket>> {
        match frame {
            Some(frame) => {
                if frame.width() != self.settings.width || frame.height() != self.settings.height {
                    anyhow::bail!(
                        "frame size {}x{} does not match encoder {}x{}",
                        frame.width(),
                        frame.height(),
                        self.settings.width,
                        self.settings.height
                    );
                }
                if self.eof_sent {
                    anyhow::bail!("encoder already flushed");
                }
                self.inner.send_frame(&frame.to_video(pts))?;
            }
            None => {
                if !self.eof_sent {
                    self.inner.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }

        self.receive_packets()?;
        Ok(self.pending.pop_front())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
mod encoder_test;
