use ffcam::{FfmpegEncoder, PacketSink, Pipeline, PipelineEvent};
use tokio_util::sync::CancellationToken;

mod config;
mod viewfinder;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .filter_module("ffcam", log::LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    ffcam::init()?;
    let config = config::config();
    log::info!("recorder config: {:?}", config);

    let encoder = FfmpegEncoder::open(config.encoder_settings())?;
    let output = std::fs::File::create(&config.output)
        .map_err(|e| anyhow::anyhow!("create {}: {}", config.output, e))?;

    let mut pipeline = Pipeline::new(config.pipeline_config());
    pipeline.set_encoder(encoder);
    pipeline.set_sink(PacketSink::file(output));
    let mut events = pipeline
        .events()
        .ok_or(anyhow::anyhow!("pipeline events already taken"))?;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::EncodeFailed { pts, error } => {
                    log::error!("encode failed at {}: {:#}", pts, error)
                }
                PipelineEvent::SinkFailed {
                    pts: Some(pts),
                    error,
                } => log::error!("write failed at {}: {}", pts, error),
                PipelineEvent::SinkFailed { pts: None, error } => {
                    log::error!("output flush failed: {}", error)
                }
                PipelineEvent::FrameRejected { error } => {
                    log::error!("viewfinder frame rejected: {}", error)
                }
            }
        }
    });

    pipeline.start()?;

    let cancel = CancellationToken::new();
    let camera = viewfinder::SyntheticCamera::from_config(config).spawn(
        pipeline.viewfinder_callback(),
        cancel.clone(),
        config.frames,
    )?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("ctrl+c received");
                cancel.cancel();
            },
        }
    }

    let captured = tokio::task::spawn_blocking(move || camera.join())
        .await?
        .map_err(|_| anyhow::anyhow!("viewfinder thread panicked"))?;
    pipeline.stop()?;
    let report = pipeline.wait().await?;
    pipeline.close()?;

    if let Some(report) = report {
        log::info!(
            "captured {} frames, encoded {}, wrote {} packets to {} ({} dropped)",
            captured,
            report.frames_encoded,
            report.packets_written,
            config.output,
            captured.saturating_sub(report.frames_encoded)
        );
    }
    Ok(())
}
