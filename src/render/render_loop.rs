//! Single consumer thread: paces frames, drains the queue, calls the backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::backend::{BackendError, DrawBackend};
use crate::draw::Drawable;
use crate::sync::{BoundedQueue, ProducerLock};
use crate::timer::{Clock, FrameTimer};

/// Wait used between frames when the period is zero and nothing was queued.
const IDLE_QUANTUM: Duration = Duration::from_millis(1);

/// Observable state of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the frame period to elapse.
    Idle,
    /// Checking the pause flag and the timer.
    Ticking,
    /// Draining the queue and dispatching draw calls.
    Draining,
    /// Pause flag set; waiting for resume.
    Paused,
    /// Loop exited; the queue is closed.
    Stopped,
}

/// Why the render loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    FrameLimit,
    Fatal,
}

/// Status reported from the render thread to the canvas owner.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// One drawable (or a frame hook) failed; the rest of the frame continued.
    DrawFailed {
        frame: u64,
        shape: &'static str,
        error: BackendError,
    },
    /// The backend is gone. Rendering stopped and the queue is closed.
    Fatal { frame: u64, error: BackendError },
    /// The loop exited.
    Stopped { frames: u64, reason: StopReason },
}

/// Counters shared between the render thread and observers.
#[derive(Debug, Default)]
pub(crate) struct RenderCounters {
    frames: AtomicU64,
    drawn: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
    evicted: AtomicU64,
    fps_bits: AtomicU64,
}

impl RenderCounters {
    pub(crate) fn record_eviction(&self) -> u64 {
        self.evicted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn snapshot(&self) -> RenderStats {
        RenderStats {
            frames: self.frames.load(Ordering::Acquire),
            drawn: self.drawn.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            fps: f64::from_bits(self.fps_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of the render counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderStats {
    /// Frames processed so far.
    pub frames: u64,
    /// Drawables handed to the backend successfully.
    pub drawn: u64,
    /// Drawables the backend failed to draw.
    pub failed: u64,
    /// Drawables dropped undrawn at shutdown or after a fatal error.
    pub discarded: u64,
    /// Drawables evicted by the overwrite-oldest overflow policy.
    pub evicted: u64,
    /// Measured frames per second over the last frame.
    pub fps: f64,
}

#[derive(Debug)]
pub(crate) struct ControlState {
    pub(crate) paused: bool,
    pub(crate) stop: bool,
    pub(crate) draining: bool,
    pub(crate) state: LoopState,
    pub(crate) reason: Option<StopReason>,
}

/// State shared by the canvas façade and its render thread.
#[derive(Debug)]
pub(crate) struct LoopShared {
    pub(crate) queue: BoundedQueue<Drawable>,
    pub(crate) lock: ProducerLock,
    pub(crate) counters: RenderCounters,
    control: Mutex<ControlState>,
    changed: Condvar,
}

impl LoopShared {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: BoundedQueue::new(capacity),
            lock: ProducerLock::new(),
            counters: RenderCounters::default(),
            control: Mutex::new(ControlState {
                paused: false,
                stop: false,
                draining: false,
                state: LoopState::Ticking,
                reason: None,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock()
    }

    /// Sets the pause flag and waits for an in-flight frame to finish.
    ///
    /// Returns at once if the loop has already stopped.
    pub(crate) fn pause(&self) {
        let mut control = self.control.lock();
        control.paused = true;
        self.changed.notify_all();
        while control.draining && control.state != LoopState::Stopped {
            self.changed.wait(&mut control);
        }
    }

    pub(crate) fn resume(&self) {
        self.control.lock().paused = false;
        self.changed.notify_all();
    }

    /// Asks the loop to stop and closes the producer side.
    pub(crate) fn request_stop(&self) {
        self.control.lock().stop = true;
        self.changed.notify_all();
        self.queue.shutdown();
        self.lock.close();
    }

    /// Marks the loop stopped when its thread ended without reaching `finish`.
    pub(crate) fn mark_stopped(&self, reason: StopReason) {
        self.request_stop();
        let mut control = self.control.lock();
        control.state = LoopState::Stopped;
        control.draining = false;
        control.reason.get_or_insert(reason);
        self.changed.notify_all();
    }

    /// Blocks until the loop finishes its next frame, or until it stops.
    ///
    /// While paused this waits for `resume`.
    pub(crate) fn wait_next_frame(&self) -> u64 {
        let mut control = self.control.lock();
        let start = self.counters.frames.load(Ordering::Acquire);
        loop {
            let frames = self.counters.frames.load(Ordering::Acquire);
            if frames != start || control.stop || control.state == LoopState::Stopped {
                return frames;
            }
            self.changed.wait(&mut control);
        }
    }

    /// Blocks until the loop reaches [`LoopState::Stopped`].
    pub(crate) fn wait_stopped(&self) -> StopReason {
        let mut control = self.control.lock();
        loop {
            if let (LoopState::Stopped, Some(reason)) = (control.state, control.reason) {
                return reason;
            }
            self.changed.wait(&mut control);
        }
    }
}

enum FrameOutcome {
    Continue { had_items: bool },
    Fatal,
}

/// The consumer side of a canvas.
///
/// Owns the frame timer and the backend; runs on its own thread via [`run`](Self::run).
pub(crate) struct RenderLoop<B: DrawBackend, C: Clock> {
    shared: Arc<LoopShared>,
    backend: B,
    timer: FrameTimer<C>,
    events: mpsc::Sender<RenderEvent>,
    frame_limit: Option<u64>,
    frame: u64,
}

impl<B: DrawBackend, C: Clock> RenderLoop<B, C> {
    pub(crate) fn new(
        shared: Arc<LoopShared>,
        backend: B,
        timer: FrameTimer<C>,
        events: mpsc::Sender<RenderEvent>,
        frame_limit: Option<u64>,
    ) -> Self {
        Self {
            shared,
            backend,
            timer,
            events,
            frame_limit,
            frame: 0,
        }
    }

    /// Runs until shutdown, the frame limit, or a fatal backend error.
    pub(crate) fn run(mut self) {
        info!(
            "Render loop started (backend: {}, period: {:?})",
            self.backend.name(),
            self.timer.period()
        );

        let reason = loop {
            let mut control = self.shared.control.lock();
            control.state = LoopState::Ticking;

            if control.stop {
                break StopReason::Shutdown;
            }

            if control.paused {
                control.state = LoopState::Paused;
                debug!("Render loop paused at frame {}", self.frame);
                while control.paused && !control.stop {
                    self.shared.changed.wait(&mut control);
                }
                debug!("Render loop resumed");
                continue;
            }

            if !self.timer.past_period() {
                control.state = LoopState::Idle;
                let remaining = self.timer.remaining();
                self.shared.changed.wait_for(&mut control, remaining);
                continue;
            }

            control.state = LoopState::Draining;
            control.draining = true;
            drop(control);

            let outcome = self.process_frame();

            let mut control = self.shared.control.lock();
            control.draining = false;
            control.state = LoopState::Idle;
            self.shared.changed.notify_all();

            match outcome {
                FrameOutcome::Fatal => break StopReason::Fatal,
                FrameOutcome::Continue { had_items } => {
                    if self.frame_limit.is_some_and(|limit| self.frame >= limit) {
                        break StopReason::FrameLimit;
                    }
                    if !had_items && self.timer.period().is_zero() && !control.stop {
                        self.shared.changed.wait_for(&mut control, IDLE_QUANTUM);
                    }
                }
            }
        };

        self.finish(reason);
    }

    /// Drains the queue once and dispatches every drawable in FIFO order.
    fn process_frame(&mut self) -> FrameOutcome {
        let batch = self.shared.queue.drain_all();
        self.timer.reset();
        self.frame += 1;
        let frame = self.frame;

        if let Some(fps) = self.timer.measured_fps() {
            self.shared
                .counters
                .fps_bits
                .store(fps.to_bits(), Ordering::Relaxed);
        }
        debug!("Frame {}: {} drawable(s)", frame, batch.len());

        if let Err(err) = self.backend.begin_frame(frame) {
            if self.report_error(frame, "frame", err) {
                self.discard(batch.len() as u64);
                self.shared.counters.frames.store(frame, Ordering::Release);
                return FrameOutcome::Fatal;
            }
        }

        let total = batch.len();
        let mut items = batch.into_iter();
        while let Some(drawable) = items.next() {
            let shape = drawable.shape().name();
            match self.backend.draw(drawable) {
                Ok(()) => {
                    self.shared.counters.drawn.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    if self.report_error(frame, shape, err) {
                        // The fatal item itself was not drawn either.
                        self.discard(items.len() as u64 + 1);
                        self.shared.counters.frames.store(frame, Ordering::Release);
                        return FrameOutcome::Fatal;
                    }
                    self.shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let outcome = match self.backend.end_frame(frame) {
            Ok(()) => FrameOutcome::Continue {
                had_items: total > 0,
            },
            Err(err) => {
                if self.report_error(frame, "frame", err) {
                    FrameOutcome::Fatal
                } else {
                    FrameOutcome::Continue {
                        had_items: total > 0,
                    }
                }
            }
        };
        self.shared.counters.frames.store(frame, Ordering::Release);
        outcome
    }

    /// Logs and forwards a backend error. Returns true when it is fatal.
    fn report_error(&self, frame: u64, shape: &'static str, error: BackendError) -> bool {
        if error.is_fatal() {
            error!("Frame {}: {} - stopping render loop", frame, error);
            self.emit(RenderEvent::Fatal { frame, error });
            true
        } else {
            warn!("Frame {}: {} ({})", frame, error, shape);
            self.emit(RenderEvent::DrawFailed {
                frame,
                shape,
                error,
            });
            false
        }
    }

    fn discard(&self, count: u64) {
        if count > 0 {
            self.shared
                .counters
                .discarded
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    fn emit(&self, event: RenderEvent) {
        if self.events.send(event).is_err() {
            debug!("Render event receiver dropped");
        }
    }

    fn finish(self, reason: StopReason) {
        self.shared.request_stop();

        let leftovers = self.shared.queue.drain_all();
        if !leftovers.is_empty() {
            info!("Discarding {} undrawn drawable(s)", leftovers.len());
            self.discard(leftovers.len() as u64);
        }
        drop(leftovers);

        let stats = self.shared.counters.snapshot();
        if stats.evicted > 0 {
            warn!(
                "{} drawable(s) were evicted by the overflow policy",
                stats.evicted
            );
        }
        info!(
            "Render loop stopped ({:?}) after {} frame(s): {} drawn, {} failed, {} discarded",
            reason, self.frame, stats.drawn, stats.failed, stats.discarded
        );

        self.emit(RenderEvent::Stopped {
            frames: self.frame,
            reason,
        });

        let mut control = self.shared.control.lock();
        control.state = LoopState::Stopped;
        control.stop = true;
        control.reason = Some(reason);
        self.shared.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{BLUE, Shape};
    use crate::render::RecordingBackend;
    use crate::timer::ManualClock;
    use std::thread;

    fn dot(tag: u64) -> Drawable {
        Drawable::new(
            Shape::Circle {
                center: (1.0, 1.0),
                radius: 1.0,
                sides: 6,
            },
            BLUE,
        )
        .with_tag(tag)
    }

    fn spawn_loop(
        shared: &Arc<LoopShared>,
        backend: RecordingBackend,
        clock: ManualClock,
        period: Duration,
        frame_limit: Option<u64>,
    ) -> (thread::JoinHandle<()>, mpsc::Receiver<RenderEvent>) {
        let (tx, rx) = mpsc::channel();
        let render = RenderLoop::new(
            shared.clone(),
            backend,
            FrameTimer::with_clock(period, clock),
            tx,
            frame_limit,
        );
        (thread::spawn(move || render.run()), rx)
    }

    #[test]
    fn waits_for_the_period_before_draining() {
        let shared = Arc::new(LoopShared::new(8));
        let backend = RecordingBackend::new();
        let clock = ManualClock::new();
        for tag in 0..3 {
            shared.queue.push(dot(tag)).unwrap();
        }

        let (handle, events) = spawn_loop(
            &shared,
            backend.clone(),
            clock.clone(),
            Duration::from_millis(10),
            Some(1),
        );

        thread::sleep(Duration::from_millis(40));
        assert_eq!(backend.drawn_count(), 0);
        assert_eq!(shared.queue.len(), 3);

        clock.advance(Duration::from_millis(10));
        handle.join().unwrap();

        let tags: Vec<u64> = backend.drawn().iter().map(Drawable::tag).collect();
        assert_eq!(tags, vec![0, 1, 2]);
        assert_eq!(
            events.try_iter().last(),
            Some(RenderEvent::Stopped {
                frames: 1,
                reason: StopReason::FrameLimit
            })
        );
        assert!(shared.queue.is_closed());
        assert!(shared.lock.is_closed());
    }

    struct FlakyPresent;

    impl DrawBackend for FlakyPresent {
        fn draw(&mut self, _drawable: Drawable) -> Result<(), BackendError> {
            Ok(())
        }

        fn end_frame(&mut self, _frame: u64) -> Result<(), BackendError> {
            Err(BackendError::Draw("present failed".into()))
        }
    }

    #[test]
    fn end_frame_draw_error_keeps_the_loop_running() {
        let shared = Arc::new(LoopShared::new(8));
        shared.queue.push(dot(1)).unwrap();
        let (tx, events) = mpsc::channel();
        let render = RenderLoop::new(
            shared.clone(),
            FlakyPresent,
            FrameTimer::with_clock(Duration::ZERO, ManualClock::new()),
            tx,
            Some(3),
        );
        thread::spawn(move || render.run()).join().unwrap();

        let events: Vec<RenderEvent> = events.try_iter().collect();
        let failures = events
            .iter()
            .filter(|e| matches!(e, RenderEvent::DrawFailed { shape: "frame", .. }))
            .count();
        assert_eq!(failures, 3);
        assert_eq!(
            events.last(),
            Some(&RenderEvent::Stopped {
                frames: 3,
                reason: StopReason::FrameLimit
            })
        );
        let stats = shared.counters.snapshot();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.drawn, 1);
    }

    #[test]
    fn mark_stopped_clears_an_interrupted_drain() {
        let shared = LoopShared::new(4);
        shared.control().draining = true;
        shared.mark_stopped(StopReason::Fatal);

        shared.pause();
        assert!(!shared.control().draining);
        assert_eq!(shared.wait_stopped(), StopReason::Fatal);
        assert_eq!(shared.wait_next_frame(), 0);
    }

    #[test]
    fn stop_request_discards_leftovers_while_paused() {
        let shared = Arc::new(LoopShared::new(8));
        let backend = RecordingBackend::new();
        shared.pause();
        let (handle, events) = spawn_loop(
            &shared,
            backend.clone(),
            ManualClock::new(),
            Duration::ZERO,
            None,
        );

        shared.queue.push(dot(1)).unwrap();
        shared.queue.push(dot(2)).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(backend.drawn_count(), 0);

        shared.request_stop();
        handle.join().unwrap();
        assert_eq!(shared.wait_stopped(), StopReason::Shutdown);

        let stats = shared.counters.snapshot();
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.discarded, 2);
        assert!(matches!(
            events.try_iter().last(),
            Some(RenderEvent::Stopped {
                reason: StopReason::Shutdown,
                ..
            })
        ));
    }
}
