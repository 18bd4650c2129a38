use thiserror::Error;

/// Numeric result codes of the lifecycle operations. Values are stable and
/// start at `Ok = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ResultCode {
    Ok = 0,
    NotInitialized,
    NoCodecSpecified,
    CodecNotFound,
    CouldNotOpenCodec,
    InvalidDimensions,
    AlreadyRunning,
    AlreadyStopped,
    SpawnFailed,
}

#[derive(Debug, Error)]
pub enum FfcamError {
    #[error("pipeline is not initialized")]
    NotInitialized,
    #[error("no codec specified")]
    NoCodecSpecified,
    #[error("codec not found: {0:?}")]
    CodecNotFound(ffmpeg_next::codec::Id),
    #[error("could not open codec: {0}")]
    CouldNotOpenCodec(#[source] ffmpeg_next::Error),
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },
    #[error("pipeline is already running")]
    AlreadyRunning,
    #[error("pipeline is already stopped")]
    AlreadyStopped,
    #[error("failed to spawn encoding worker: {0}")]
    SpawnWorker(#[source] std::io::Error),
}

impl FfcamError {
    pub fn code(&self) -> ResultCode {
        match self {
            FfcamError::NotInitialized => ResultCode::NotInitialized,
            FfcamError::NoCodecSpecified => ResultCode::NoCodecSpecified,
            FfcamError::CodecNotFound(_) => ResultCode::CodecNotFound,
            FfcamError::CouldNotOpenCodec(_) => ResultCode::CouldNotOpenCodec,
            FfcamError::InvalidDimensions { .. } => ResultCode::InvalidDimensions,
            FfcamError::AlreadyRunning => ResultCode::AlreadyRunning,
            FfcamError::AlreadyStopped => ResultCode::AlreadyStopped,
            FfcamError::SpawnWorker(_) => ResultCode::SpawnFailed,
        }
    }
}

impl<T> From<&Result<T, FfcamError>> for ResultCode {
    fn from(result: &Result<T, FfcamError>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => e.code(),
        }
    }
}
