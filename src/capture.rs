//! Per-camera capture workers.
//!
//! A `Camera` pairs a `CameraHandle` with at most one worker thread. The
//! worker reads from a `FrameSource` and deposits every frame into the
//! camera's mailbox, overwriting whatever the consumer has not picked up.
//! A read failure ends that worker alone and marks the camera `Stopped`.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::camera::{CameraHandle, StreamState};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::ingest::{Connector, FrameSource};
use crate::mailbox::{mailbox, Collector, Depositor};

const JOIN_POLL: Duration = Duration::from_millis(5);
const NO_FRAME: u64 = u64::MAX;

/// Stream state shared between a camera and its worker.
#[derive(Clone, Debug)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: StreamState) -> Self {
        Self(Arc::new(AtomicU8::new(encode(state))))
    }

    fn get(&self) -> StreamState {
        match self.0.load(Ordering::Acquire) {
            0 => StreamState::Idle,
            1 => StreamState::Streaming,
            _ => StreamState::Stopped,
        }
    }

    fn set(&self, state: StreamState) {
        self.0.store(encode(state), Ordering::Release);
    }
}

fn encode(state: StreamState) -> u8 {
    match state {
        StreamState::Idle => 0,
        StreamState::Streaming => 1,
        StreamState::Stopped => 2,
    }
}

/// Counters written by the worker, read by the controller.
#[derive(Debug)]
struct Counters {
    frames: AtomicU64,
    /// Milliseconds after start of the most recent deposit, `NO_FRAME` if none.
    last_frame_ms: AtomicU64,
}

/// Liveness snapshot of a running worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub since_start: Duration,
    pub since_last_frame: Option<Duration>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
    collector: Collector<Frame>,
    counters: Arc<Counters>,
    started_at: Instant,
}

/// A camera and its capture worker.
pub struct Camera {
    handle: CameraHandle,
    state: SharedState,
    stop_timeout: Duration,
    worker: Option<Worker>,
}

impl Camera {
    pub fn new(handle: CameraHandle, stop_timeout: Duration) -> Self {
        Self {
            handle,
            state: SharedState::new(StreamState::Idle),
            stop_timeout,
            worker: None,
        }
    }

    pub fn handle(&self) -> &CameraHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    /// Open the stream and launch the worker.
    ///
    /// A no-op while `Streaming`. On failure the state is left as it was.
    pub fn start(&mut self, connector: &dyn Connector) -> Result<()> {
        if self.state() == StreamState::Streaming {
            return Ok(());
        }
        if let Some(previous) = self.worker.take() {
            // A failed worker has normally exited already; make sure before
            // replacing it.
            previous.stop.store(true, Ordering::Release);
            self.reap(previous);
        }

        let source = connector.open(&self.handle)?;
        let (depositor, collector) = mailbox();
        let stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters {
            frames: AtomicU64::new(0),
            last_frame_ms: AtomicU64::new(NO_FRAME),
        });
        let started_at = Instant::now();

        let previous_state = self.state();
        self.state.set(StreamState::Streaming);

        let task = WorkerTask {
            camera: self.handle.name.clone(),
            source,
            depositor,
            stop: Arc::clone(&stop),
            state: self.state.clone(),
            counters: Arc::clone(&counters),
            started_at,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("capture-{}", self.handle.id))
            .spawn(move || task.run());

        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                self.state.set(previous_state);
                return Err(Error::stream_open(
                    &self.handle.name,
                    format!("spawn capture thread: {}", err),
                ));
            }
        };

        log::info!("started capture for {}", self.handle);
        self.worker = Some(Worker {
            stop,
            join,
            collector,
            counters,
            started_at,
        });
        Ok(())
    }

    /// Signal the worker, wait up to the stop timeout, and mark the camera
    /// `Stopped`. A worker still blocked in a read after the timeout is
    /// detached; it exits on its own once the read returns.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            self.reap(worker);
        }
        self.state.set(StreamState::Stopped);
    }

    /// Most recent unconsumed frame, if any. Never blocks.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.worker.as_ref()?.collector.fetch()
    }

    /// Liveness counters of the current worker.
    pub fn stats(&self) -> Option<CaptureStats> {
        let worker = self.worker.as_ref()?;
        let since_start = worker.started_at.elapsed();
        let last_ms = worker.counters.last_frame_ms.load(Ordering::Acquire);
        let since_last_frame = (last_ms != NO_FRAME)
            .then(|| since_start.saturating_sub(Duration::from_millis(last_ms)));
        Some(CaptureStats {
            frames_captured: worker.counters.frames.load(Ordering::Acquire),
            since_start,
            since_last_frame,
        })
    }

    fn reap(&self, worker: Worker) {
        let deadline = Instant::now() + self.stop_timeout;
        while !worker.join.is_finished() {
            if Instant::now() >= deadline {
                log::warn!(
                    "capture worker for '{}' did not stop within {:?}; detaching",
                    self.handle.name,
                    self.stop_timeout
                );
                return;
            }
            std::thread::sleep(JOIN_POLL);
        }
        if worker.join.join().is_err() {
            log::error!("capture worker for '{}' panicked", self.handle.name);
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Release);
        }
    }
}

struct WorkerTask {
    camera: String,
    source: Box<dyn FrameSource>,
    depositor: Depositor<Frame>,
    stop: Arc<AtomicBool>,
    state: SharedState,
    counters: Arc<Counters>,
    started_at: Instant,
}

impl WorkerTask {
    fn run(mut self) {
        while !self.stop.load(Ordering::Acquire) {
            match self.source.next_frame() {
                Ok(frame) => {
                    self.depositor.deposit(frame);
                    self.counters.frames.fetch_add(1, Ordering::AcqRel);
                    let elapsed_ms = self.started_at.elapsed().as_millis() as u64;
                    self.counters
                        .last_frame_ms
                        .store(elapsed_ms.min(NO_FRAME - 1), Ordering::Release);
                }
                Err(err) => {
                    // After a stop request the state belongs to the camera,
                    // which may already run a newer session.
                    if !self.stop.load(Ordering::Acquire) {
                        log::error!("{}", Error::stream_read(&self.camera, format!("{:#}", err)));
                        self.state.set(StreamState::Stopped);
                    }
                    break;
                }
            }
        }
        log::debug!("capture worker for '{}' exiting", self.camera);
    }
}
