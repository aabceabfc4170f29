use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::buffer::pool::{BufferPool, FrameView, SlotRoles};
use crate::models::config::ControllerConfig;
use crate::models::error::CaptureError;
use crate::models::state::ControllerState;
use crate::models::stats::CaptureStats;
use crate::models::timestamp::Timestamp;
use crate::sync::signal::{FrameSignal, Latch, SignalState};
use crate::traits::capture_observer::CaptureObserver;
use crate::traits::frame_source::{FrameSource, SourceHandle};

/// Lifecycle flags and diagnostics, protected by `parking_lot::Mutex`.
struct Lifecycle {
    setup: bool,
    ready: bool,
    active: bool,
    quit: bool,
    stopped: bool,
    producer_thread: Option<ThreadId>,
    end_reason: Option<CaptureError>,
    stats: CaptureStats,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            setup: false,
            ready: false,
            active: false,
            quit: false,
            stopped: false,
            producer_thread: None,
            end_reason: None,
            stats: CaptureStats::new(),
        }
    }

    fn state(&self) -> ControllerState {
        if self.stopped {
            ControllerState::Stopped
        } else if self.quit {
            ControllerState::Quitting
        } else if !self.ready {
            ControllerState::Created
        } else if self.active {
            ControllerState::Active
        } else {
            ControllerState::ReadyNotActive
        }
    }
}

/// State shared between the controller and its producer thread.
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    frames: FrameSignal,
    exited: Latch,
}

/// Multi-buffer capture controller.
///
/// Runs a `FrameSource` on a dedicated producer thread that fills slots of a
/// `BufferPool`, while any number of reader threads pull the newest complete
/// frame without copying it.
///
/// ```text
/// [FrameSource] ← fill ── [producer thread] ── publish ──→ [BufferPool] ←── read ── [readers]
///                               │                                ↑
///                               └──── first frame ──→ [FrameSignal] (readers park here)
/// ```
///
/// All methods take `&self`, so the controller can be shared through an
/// `Arc` between the thread driving the lifecycle and reader threads.
pub struct CaptureController<S: FrameSource + 'static> {
    config: ControllerConfig,
    pool: Arc<BufferPool>,
    shared: Arc<Shared>,
    observer: Option<Arc<dyn CaptureObserver>>,
    source: Mutex<Option<SourceHandle<S>>>,
    producer: Mutex<Option<JoinHandle<SourceHandle<S>>>>,
}

impl<S: FrameSource + 'static> CaptureController<S> {
    /// Create a controller over `source`, allocating the buffer pool.
    ///
    /// Fails with `InvalidArgument` if the source reports a zero element size
    /// or count, and with `ConfigurationFailed` for an invalid config.
    pub fn new(source: SourceHandle<S>, config: ControllerConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let element_size = source.element_size();
        let element_count = source.element_count();
        let pool = BufferPool::new(element_size, element_count)?;

        log::debug!(
            "capture controller created: {} x {} bytes per frame, {} source",
            element_count,
            element_size,
            if source.is_owned() { "owned" } else { "shared" }
        );

        Ok(Self {
            config,
            pool: Arc::new(pool),
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle::new()),
                frames: FrameSignal::new(),
                exited: Latch::new(),
            }),
            observer: None,
            source: Mutex::new(Some(source)),
            producer: Mutex::new(None),
        })
    }

    /// Controller that owns `source` and drops it when capture finishes.
    pub fn owned(source: S) -> Result<Self, CaptureError> {
        Self::new(SourceHandle::Owned(source), ControllerConfig::default())
    }

    /// Controller over a source the caller keeps ownership of.
    pub fn shared(source: Arc<Mutex<S>>) -> Result<Self, CaptureError> {
        Self::new(SourceHandle::Shared(source), ControllerConfig::default())
    }

    /// Install an observer. Takes effect for a producer spawned afterwards.
    pub fn set_observer(&mut self, observer: Arc<dyn CaptureObserver>) {
        self.observer = Some(observer);
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.shared.lifecycle.lock().state()
    }

    /// Whether a producer thread was spawned and has not exited yet.
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.lock().setup && !self.shared.exited.is_open()
    }

    pub fn producer_thread_id(&self) -> Option<ThreadId> {
        self.shared.lifecycle.lock().producer_thread
    }

    pub fn stats(&self) -> CaptureStats {
        self.shared.lifecycle.lock().stats.clone()
    }

    /// Why the producer ended the stream on its own, if it did.
    pub fn end_reason(&self) -> Option<CaptureError> {
        self.shared.lifecycle.lock().end_reason.clone()
    }

    /// Snapshot of the pool's role assignment.
    pub fn roles(&self) -> SlotRoles {
        self.pool.roles()
    }

    pub fn element_size(&self) -> usize {
        self.pool.element_size()
    }

    pub fn element_count(&self) -> usize {
        self.pool.element_count()
    }

    /// Spawn the producer thread.
    ///
    /// Returns once the thread is spawned; the thread marks itself ready
    /// asynchronously. Capture does not begin until `start_capture`.
    pub fn setup(&self) -> Result<(), CaptureError> {
        let mut producer = self.producer.lock();

        {
            let mut life = self.shared.lifecycle.lock();
            if life.stopped || life.quit {
                return Err(CaptureError::InvalidState("capture already finished".into()));
            }
            if life.setup {
                return Err(CaptureError::InvalidState("setup already called".into()));
            }
            life.setup = true;
        }

        let Some(source) = self.source.lock().take() else {
            self.shared.lifecycle.lock().setup = false;
            return Err(CaptureError::InvalidState("frame source already released".into()));
        };

        let worker = Producer {
            pool: Arc::clone(&self.pool),
            shared: Arc::clone(&self.shared),
            observer: self.observer.clone(),
            idle_interval: self.config.idle_poll_interval(),
        };

        let spawned = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker.run(source));

        match spawned {
            Ok(handle) => {
                *producer = Some(handle);
                self.shared.lifecycle.lock().stats.mark_started();
                log::debug!("producer thread '{}' spawned", self.config.thread_name);
                Ok(())
            }
            Err(e) => {
                // The source moved into the closure and is gone with it.
                self.shared.lifecycle.lock().setup = false;
                Err(CaptureError::ThreadFailed(format!("failed to spawn producer thread: {}", e)))
            }
        }
    }

    /// Resume capture. Idempotent.
    pub fn start_capture(&self) -> Result<(), CaptureError> {
        self.set_active(true)
    }

    /// Pause capture without tearing down the producer thread. Idempotent.
    pub fn stop_capture(&self) -> Result<(), CaptureError> {
        self.set_active(false)
    }

    /// Stop the producer for good, join it, release the source and clear the
    /// pool's roles.
    ///
    /// With `shutdown_timeout_ms` configured, returns `Timeout` if the
    /// producer is still stuck in a capture call; the call can be retried.
    pub fn finish_capture(&self) -> Result<(), CaptureError> {
        let mut producer = self.producer.lock();

        {
            let life = self.shared.lifecycle.lock();
            if !life.setup {
                return Err(CaptureError::InvalidState("finish_capture called before setup".into()));
            }
            if life.stopped {
                return Err(CaptureError::InvalidState("capture already finished".into()));
            }
        }

        self.request_quit();
        self.join_producer(&mut producer, self.config.shutdown_timeout())
    }

    /// Newest complete frame.
    ///
    /// Blocks until the first frame is published (bounded by the configured
    /// read timeout). Returns `None` before `setup`, once the stream has
    /// ended, or on timeout.
    pub fn read(&self) -> Option<FrameView> {
        self.read_inner(None, self.config.read_timeout())
    }

    /// Like `read`, with an explicit bound on the first-frame wait.
    pub fn read_within(&self, timeout: Duration) -> Option<FrameView> {
        self.read_inner(None, Some(timeout))
    }

    /// Complete frame whose timestamp is nearest to `target`.
    ///
    /// Only the frames still intact in the pool are candidates, so this
    /// falls back to the newest frame when nothing closer is held.
    pub fn read_with_sync(&self, target: Timestamp) -> Option<FrameView> {
        self.read_inner(Some(target), self.config.read_timeout())
    }

    // --- Internal helpers ---

    fn read_inner(&self, target: Option<Timestamp>, timeout: Option<Duration>) -> Option<FrameView> {
        {
            let life = self.shared.lifecycle.lock();
            if life.quit {
                return None;
            }
            if !life.setup {
                log::debug!("read before setup: no data");
                return None;
            }
        }

        match self.shared.frames.wait(timeout) {
            SignalState::Published => {}
            SignalState::Ended => return None,
            SignalState::Pending => {
                log::debug!("timed out after {:?} waiting for the first frame", timeout);
                return None;
            }
        }

        let view = match target {
            None => self.pool.acquire_read_slot(),
            Some(target) => self.pool.acquire_nearest_slot(target),
        }?;

        let mut life = self.shared.lifecycle.lock();
        if life.quit {
            return None;
        }
        life.stats.reads_served += 1;
        Some(view)
    }

    fn set_active(&self, active: bool) -> Result<(), CaptureError> {
        let state = {
            let mut life = self.shared.lifecycle.lock();
            if life.stopped {
                return Err(CaptureError::InvalidState("capture already finished".into()));
            }
            if life.active == active {
                return Ok(());
            }
            life.active = active;
            life.state()
        };

        log::debug!("capture {}", if active { "started" } else { "stopped" });
        self.notify_state(state);
        Ok(())
    }

    /// Raise the quit flag and wake parked readers.
    fn request_quit(&self) {
        let newly_set = {
            let mut life = self.shared.lifecycle.lock();
            !std::mem::replace(&mut life.quit, true)
        };
        self.shared.frames.end();

        if newly_set {
            log::debug!("quit requested");
            self.notify_state(ControllerState::Quitting);
        }
    }

    fn join_producer(
        &self,
        producer: &mut Option<JoinHandle<SourceHandle<S>>>,
        timeout: Option<Duration>,
    ) -> Result<(), CaptureError> {
        let Some(handle) = producer.take() else {
            return Err(CaptureError::InvalidState("producer thread is not running".into()));
        };

        if !self.shared.exited.wait(timeout) {
            log::warn!("producer thread did not exit within {:?}", timeout);
            *producer = Some(handle);
            return Err(CaptureError::Timeout);
        }

        let result = match handle.join() {
            Ok(source) => {
                source.release();
                Ok(())
            }
            Err(_) => {
                log::error!("producer thread panicked");
                Err(CaptureError::ThreadFailed("producer thread panicked".into()))
            }
        };

        self.pool.reset();
        {
            let mut life = self.shared.lifecycle.lock();
            life.stopped = true;
            life.active = false;
        }
        log::debug!("producer thread joined");
        self.notify_state(ControllerState::Stopped);

        result
    }

    fn notify_state(&self, state: ControllerState) {
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(state);
        }
    }
}

impl<S: FrameSource + 'static> Drop for CaptureController<S> {
    fn drop(&mut self) {
        let mut producer = self.producer.lock();
        if producer.is_none() {
            return;
        }

        self.request_quit();
        match self.join_producer(&mut producer, self.config.shutdown_timeout()) {
            Ok(()) => {}
            Err(CaptureError::Timeout) => {
                log::warn!("detaching producer thread still blocked in capture");
            }
            Err(e) => log::error!("failed to stop producer thread: {}", e),
        }
    }
}

/// The producer thread's half of the controller.
struct Producer {
    pool: Arc<BufferPool>,
    shared: Arc<Shared>,
    observer: Option<Arc<dyn CaptureObserver>>,
    idle_interval: Duration,
}

enum Step {
    Captured,
    Idle,
    Busy,
    Quit,
}

/// Marks the producer as exited however its loop ends, unwinding included.
struct ExitGuard<'a> {
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.shared.lifecycle.lock().quit = true;
        self.shared.frames.end();
        self.shared.exited.open();
    }
}

impl Producer {
    fn run<S: FrameSource>(self, mut source: SourceHandle<S>) -> SourceHandle<S> {
        let _exit = ExitGuard { shared: &self.shared };
        self.initialize();

        loop {
            match self.step(&mut source) {
                Ok(Step::Captured) => {}
                Ok(Step::Idle) | Ok(Step::Busy) => thread::sleep(self.idle_interval),
                Ok(Step::Quit) => break,
                Err(reason) => {
                    self.end_stream(reason);
                    break;
                }
            }
        }

        log::debug!("producer loop exited");
        source
    }

    fn initialize(&self) {
        let state = {
            let mut life = self.shared.lifecycle.lock();
            life.ready = true;
            life.producer_thread = Some(thread::current().id());
            life.state()
        };
        log::debug!("producer thread ready");
        self.notify_state(state);
    }

    /// One loop iteration. Never holds a lock across `fill`.
    fn step<S: FrameSource>(&self, source: &mut SourceHandle<S>) -> Result<Step, CaptureError> {
        {
            let mut life = self.shared.lifecycle.lock();
            if life.quit {
                return Ok(Step::Quit);
            }
            if !life.active {
                life.stats.idle_cycles += 1;
                return Ok(Step::Idle);
            }
        }

        let Some(mut slot) = self.pool.acquire_write_slot()? else {
            self.shared.lifecycle.lock().stats.busy_retries += 1;
            return Ok(Step::Busy);
        };

        if let Err(reason) = source.fill(slot.buffer_mut()) {
            self.pool.abandon(slot);
            return Err(reason);
        }

        let timestamp = Timestamp::now();
        let first = self.pool.publish(slot, timestamp)?;
        self.shared.lifecycle.lock().stats.record_publish(timestamp);

        if first {
            self.shared.frames.publish();
            log::debug!("first frame published at {:?}", timestamp);
            if let Some(ref observer) = self.observer {
                observer.on_first_frame(timestamp);
            }
        }

        Ok(Step::Captured)
    }

    fn end_stream(&self, reason: CaptureError) {
        match &reason {
            r if r.is_end_of_stream() => log::info!("frame source exhausted, ending stream"),
            CaptureError::PoolInvariantViolation(msg) => {
                log::error!("buffer pool invariant violated, ending stream: {}", msg)
            }
            other => log::warn!("frame source failed, ending stream: {}", other),
        }

        let state = {
            let mut life = self.shared.lifecycle.lock();
            life.quit = true;
            life.end_reason = Some(reason.clone());
            life.state()
        };
        self.shared.frames.end();

        if let Some(ref observer) = self.observer {
            observer.on_stream_ended(&reason);
        }
        self.notify_state(state);
    }

    fn notify_state(&self, state: ControllerState) {
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(state);
        }
    }
}
