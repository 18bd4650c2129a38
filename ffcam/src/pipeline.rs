//! Capture → convert → encode pipeline.
//!
//! ```text
//!  viewfinder callback                       encoding worker (thread)
//!  ───────────────────                       ────────────────────────
//!  CameraFrame ─► convert ─► FrameQueue ───► pop ─► encode ─► PacketSink
//!                              ▲   │
//!              stop(): close ──┘   └─ drained, then encoder flushed
//! ```
//!
//! The viewfinder side never blocks on the worker. `stop` only flips the
//! running flag; `wait`/`join` give the caller a shutdown handshake, and
//! `close` always joins before releasing the encoder.

use std::{sync::Arc, thread::JoinHandle};

use tokio::sync::watch;

use crate::{
    converter,
    encoder::VideoEncoder,
    error::FfcamError,
    frame::CameraFrame,
    queue::{PushOutcome, QueuePolicy},
    sink::PacketSink,
    worker::{
        EncodingWorker, EventReceiver, EventSender, PipelineEvent, Shared, WorkerReport,
        WorkerState,
    },
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_policy: QueuePolicy,
    pub worker_name: String,
    /// Events kept for the receiver of [`Pipeline::events`]; newer ones are
    /// dropped while it is full.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_policy: QueuePolicy::Unbounded,
            worker_name: "ffcam-encoder".to_string(),
            event_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Drop new frames once `capacity` frames wait for the encoder.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_policy = QueuePolicy::DropNewest { capacity };
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.config.queue_policy = QueuePolicy::Unbounded;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
    Closed,
}

struct WorkerHandle {
    thread: JoinHandle<(WorkerReport, PacketSink)>,
}

pub struct Pipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    encoder: Option<Box<dyn VideoEncoder>>,
    sink: Option<PacketSink>,
    lifecycle: Lifecycle,
    worker: Option<WorkerHandle>,
    events_tx: EventSender,
    events_rx: Option<EventReceiver>,
    state_tx: watch::Sender<WorkerState>,
}

impl Pipeline {
    /// Creates an idle pipeline. Nothing runs and viewfinder frames are
    /// ignored until [`Pipeline::start`].
    pub fn new(config: PipelineConfig) -> Self {
        let (events_tx, events_rx) = EventSender::channel(config.event_capacity);
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        Self {
            shared: Arc::new(Shared::new(config.queue_policy)),
            config,
            encoder: None,
            sink: None,
            lifecycle: Lifecycle::Idle,
            worker: None,
            events_tx,
            events_rx: Some(events_rx),
            state_tx,
        }
    }

    pub fn set_encoder<E: VideoEncoder + 'static>(&mut self, encoder: E) {
        self.encoder = Some(Box::new(encoder));
    }

    pub fn set_boxed_encoder(&mut self, encoder: Box<dyn VideoEncoder>) {
        self.encoder = Some(encoder);
    }

    pub fn set_sink(&mut self, sink: PacketSink) {
        self.sink = Some(sink);
    }

    /// Receiver for encode, sink and conversion failures. Can be taken once.
    pub fn events(&mut self) -> Option<EventReceiver> {
        self.events_rx.take()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// Presentation index the next dequeued frame or flush call will get.
    pub fn frame_count(&self) -> i64 {
        self.shared.frame_count()
    }

    pub fn pending_frames(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.shared.queue.dropped()
    }

    /// Events lost because the event channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.events_tx.dropped()
    }

    pub fn start(&mut self) -> Result<(), FfcamError> {
        match self.lifecycle {
            Lifecycle::Closed => return Err(FfcamError::NotInitialized),
            Lifecycle::Running => return Err(FfcamError::AlreadyRunning),
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
        if self.encoder.is_none() {
            return Err(FfcamError::NoCodecSpecified);
        }

        // A previous run may still be draining; it owns the sink until it exits.
        self.join_worker();

        let encoder = self.encoder.take().ok_or(FfcamError::NoCodecSpecified)?;
        let sink = self.sink.take().unwrap_or_else(|| {
            log::warn!("no packet sink configured, encoded packets are discarded");
            PacketSink::writer(std::io::sink())
        });

        self.shared.reset_frame_count();
        self.state_tx.send_replace(WorkerState::Idle);
        self.shared.queue.open();

        let worker = EncodingWorker::new(
            self.shared.clone(),
            encoder,
            sink,
            self.events_tx.clone(),
            self.state_tx.clone(),
        );
        let thread = std::thread::Builder::new()
            .name(self.config.worker_name.clone())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.shared.queue.close();
                FfcamError::SpawnWorker(e)
            })?;

        self.worker = Some(WorkerHandle { thread });
        self.lifecycle = Lifecycle::Running;
        log::info!("pipeline started");
        Ok(())
    }

    /// Requests shutdown. Queued frames are still encoded, then the encoder
    /// is flushed. Returns immediately; use [`Pipeline::wait`] or
    /// [`Pipeline::join`] to wait for the worker.
    pub fn stop(&mut self) -> Result<(), FfcamError> {
        match self.lifecycle {
            Lifecycle::Closed => return Err(FfcamError::NotInitialized),
            Lifecycle::Idle | Lifecycle::Stopped => return Err(FfcamError::AlreadyStopped),
            Lifecycle::Running => {}
        }
        self.shared.queue.close();
        self.lifecycle = Lifecycle::Stopped;
        log::info!(
            "pipeline stop requested, {} frames pending",
            self.shared.queue.len()
        );
        Ok(())
    }

    /// Blocks until the worker has drained, flushed and exited.
    ///
    /// Returns `Ok(None)` when no worker has run since the last join.
    pub fn join(&mut self) -> Result<Option<WorkerReport>, FfcamError> {
        match self.lifecycle {
            Lifecycle::Closed => Err(FfcamError::NotInitialized),
            Lifecycle::Running => Err(FfcamError::AlreadyRunning),
            Lifecycle::Idle | Lifecycle::Stopped => Ok(self.join_worker()),
        }
    }

    /// Async variant of [`Pipeline::join`].
    pub async fn wait(&mut self) -> Result<Option<WorkerReport>, FfcamError> {
        match self.lifecycle {
            Lifecycle::Closed => return Err(FfcamError::NotInitialized),
            Lifecycle::Running => return Err(FfcamError::AlreadyRunning),
            Lifecycle::Idle | Lifecycle::Stopped => {}
        }
        if self.worker.is_some() {
            let mut state = self.state_tx.subscribe();
            // The sender lives in self; the worker publishes Stopped on every
            // exit path, panics included.
            let _ = state.wait_for(|s| *s == WorkerState::Stopped).await;
        }
        Ok(self.join_worker())
    }

    /// Stops the pipeline if needed, waits for the worker and releases the
    /// encoder and sink. Every later lifecycle call fails with
    /// `NotInitialized`.
    pub fn close(&mut self) -> Result<(), FfcamError> {
        if self.lifecycle == Lifecycle::Closed {
            return Err(FfcamError::NotInitialized);
        }
        if self.lifecycle == Lifecycle::Running {
            self.stop()?;
        }
        self.join_worker();
        self.encoder = None;
        self.sink = None;
        self.lifecycle = Lifecycle::Closed;
        log::info!("pipeline closed");
        Ok(())
    }

    fn join_worker(&mut self) -> Option<WorkerReport> {
        let handle = self.worker.take()?;
        match handle.thread.join() {
            Ok((report, sink)) => {
                if self.sink.is_none() {
                    self.sink = Some(sink);
                }
                Some(report)
            }
            Err(_) => {
                log::error!("encoding worker panicked");
                self.state_tx.send_replace(WorkerState::Stopped);
                None
            }
        }
    }

    /// Viewfinder entry point: converts the frame and queues it for encoding.
    /// Never waits on the encoder.
    pub fn on_viewfinder_frame(&self, frame: &CameraFrame) {
        accept_frame(&self.shared, &self.events_tx, frame);
    }

    /// A callback that can be handed to a camera source running on its own
    /// thread. It keeps working after the pipeline is stopped, it just drops
    /// every frame.
    pub fn viewfinder_callback(&self) -> impl Fn(&CameraFrame) + Send + Sync + 'static {
        let shared = self.shared.clone();
        let events = self.events_tx.clone();
        move |frame: &CameraFrame| accept_frame(&shared, &events, frame)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.queue.close();
            self.join_worker();
        }
    }
}

fn accept_frame(shared: &Shared, events: &EventSender, frame: &CameraFrame) {
    if !frame.is_nv12() {
        log::trace!("ignoring {:?} frame", frame.frame_type);
        return;
    }
    if !shared.queue.is_running() {
        return;
    }
    if shared.queue.is_full() {
        shared.queue.record_drop();
        return;
    }

    match converter::convert(frame) {
        Ok(Some(planar)) => {
            if shared.queue.push(planar) == PushOutcome::Rejected {
                log::debug!("pipeline stopped during conversion, frame dropped");
            }
        }
        Ok(None) => {}
        Err(error) => {
            log::warn!("dropping malformed frame ({}): {}", frame, error);
            events.send(PipelineEvent::FrameRejected { error });
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
