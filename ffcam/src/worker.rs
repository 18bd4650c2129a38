use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU64, Ordering},
};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};

use crate::{
    converter::ConvertError,
    encoder::VideoEncoder,
    frame::PlanarFrame,
    packet::EncodedPacket,
    queue::{FrameQueue, QueuePolicy},
    sink::PacketSink,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Idle,
    Running,
    /// Stop requested, frames still queued.
    Draining,
    /// Queue empty after stop, pulling buffered packets out of the codec.
    Flushing,
    Stopped,
}

/// Log "event channel full" at most every N drops.
const EVENT_DROP_LOG_INTERVAL: u64 = 120;

/// Reported asynchronously; none of these stop the pipeline.
#[derive(Debug)]
pub enum PipelineEvent {
    EncodeFailed { pts: i64, error: anyhow::Error },
    /// `pts` is `None` when the final sink flush failed.
    SinkFailed {
        pts: Option<i64>,
        error: std::io::Error,
    },
    FrameRejected { error: ConvertError },
}

pub type EventReceiver = mpsc::Receiver<PipelineEvent>;

/// Sending half of the bounded event channel. Never blocks: when the receiver
/// is not keeping up (or was never taken) new events are dropped and counted.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PipelineEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    pub fn channel(capacity: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn send(&self, event: PipelineEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % EVENT_DROP_LOG_INTERVAL == 1 {
                    log::debug!(
                        "event channel full, dropped {} events, latest: {:?}",
                        dropped,
                        event
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Events discarded because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub frames_encoded: u64,
    pub flush_iterations: u64,
    pub packets_written: u64,
    pub encode_errors: u64,
    pub sink_errors: u64,
    /// Last presentation index handed to the encoder.
    pub last_pts: Option<i64>,
}

/// State shared between the viewfinder callback and the worker.
pub(crate) struct Shared {
    pub queue: FrameQueue<PlanarFrame>,
    frame_count: AtomicI64,
}

impl Shared {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            queue: FrameQueue::new(policy),
            frame_count: AtomicI64::new(0),
        }
    }

    pub fn frame_count(&self) -> i64 {
        self.frame_count.load(Ordering::Acquire)
    }

    pub fn reset_frame_count(&self) {
        self.frame_count.store(0, Ordering::Release);
    }

    fn next_pts(&self) -> i64 {
        self.frame_count.fetch_add(1, Ordering::AcqRel)
    }
}

pub(crate) struct EncodingWorker {
    shared: Arc<Shared>,
    encoder: Box<dyn VideoEncoder>,
    sink: PacketSink,
    events: EventSender,
    state: watch::Sender<WorkerState>,
    report: WorkerReport,
}

impl EncodingWorker {
    pub fn new(
        shared: Arc<Shared>,
        encoder: Box<dyn VideoEncoder>,
        sink: PacketSink,
        events: EventSender,
        state: watch::Sender<WorkerState>,
    ) -> Self {
        Self {
            shared,
            encoder,
            sink,
            events,
            state,
            report: WorkerReport::default(),
        }
    }

    /// Runs until the queue is stopped and drained and the codec is flushed.
    /// Hands the sink back so the pipeline can reuse it.
    pub fn run(mut self) -> (WorkerReport, PacketSink) {
        log::info!("encoding worker started, encoder: {}", self.encoder.name());
        let _guard = PanicGuard {
            shared: self.shared.clone(),
            state: self.state.clone(),
        };
        self.set_state(WorkerState::Running);

        while let Some(frame) = self.shared.queue.pop_blocking() {
            if !self.shared.queue.is_running() {
                self.set_state(WorkerState::Draining);
            }
            let pts = self.shared.next_pts();
            let result = self.encoder.encode(Some(&frame), pts);
            drop(frame);
            self.report.frames_encoded += 1;
            self.report.last_pts = Some(pts);
            self.handle_encoded(result, pts);
        }

        self.set_state(WorkerState::Flushing);
        loop {
            let pts = self.shared.next_pts();
            self.report.flush_iterations += 1;
            self.report.last_pts = Some(pts);
            match self.encoder.encode(None, pts) {
                Ok(Some(packet)) => self.dispatch(&packet, pts),
                Ok(None) => break,
                Err(e) => {
                    self.encode_failed(pts, e);
                    break;
                }
            }
        }

        if let Err(e) = self.sink.flush() {
            self.sink_failed(None, e);
        }

        log::info!(
            "encoding worker finished, frames: {}, flush iterations: {}, packets: {}, encode errors: {}, sink errors: {}",
            self.report.frames_encoded,
            self.report.flush_iterations,
            self.report.packets_written,
            self.report.encode_errors,
            self.report.sink_errors
        );
        self.set_state(WorkerState::Stopped);
        (self.report, self.sink)
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            log::debug!("encoding worker {:?} -> {:?}", current, state);
            *current = state;
            true
        });
    }

    fn handle_encoded(&mut self, result: anyhow::Result<Option<EncodedPacket>>, pts: i64) {
        match result {
            Ok(Some(packet)) => self.dispatch(&packet, pts),
            Ok(None) => {}
            Err(e) => self.encode_failed(pts, e),
        }
    }

    fn dispatch(&mut self, packet: &EncodedPacket, pts: i64) {
        match self.sink.write_packet(packet) {
            Ok(()) => self.report.packets_written += 1,
            Err(e) => self.sink_failed(Some(pts), e),
        }
    }

    fn encode_failed(&mut self, pts: i64, error: anyhow::Error) {
        self.report.encode_errors += 1;
        log::warn!("encode error at pts {}: {:#}", pts, error);
        self.events.send(PipelineEvent::EncodeFailed { pts, error });
    }

    fn sink_failed(&mut self, pts: Option<i64>, error: std::io::Error) {
        self.report.sink_errors += 1;
        match pts {
            Some(pts) => log::warn!("sink write error at pts {}: {}", pts, error),
            None => log::warn!("sink flush error: {}", error),
        }
        self.events.send(PipelineEvent::SinkFailed { pts, error });
    }
}

/// On unwind out of `run`: closes and clears the queue, publishes `Stopped`.
struct PanicGuard {
    shared: Arc<Shared>,
    state: watch::Sender<WorkerState>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        log::error!("encoding worker panicked, stopping pipeline");
        self.shared.queue.close();
        let discarded = self.shared.queue.clear();
        if discarded > 0 {
            log::warn!("discarded {} queued frames", discarded);
        }
        self.state.send_replace(WorkerState::Stopped);
    }
}
