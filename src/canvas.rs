//! Canvas façade: the producer-facing handle that owns the render thread.
//!
//! A [`Canvas`] is shared by reference (or `Arc`) between any number of
//! producer threads. Each submission goes through the producer lock, then
//! into the bounded queue; the render thread drains the queue once per
//! frame period and hands the drawables to a [`DrawBackend`].

use std::io;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{CanvasConfig, OverflowPolicy};
use crate::draw::Drawable;
use crate::render::render_loop::{LoopShared, RenderLoop};
use crate::render::{BackendError, DrawBackend, LoopState, RenderEvent, RenderStats, StopReason};
use crate::sync::{LockError, ProducerGuard, ProducerLock, QueueClosed};
use crate::timer::{FrameTimer, period_from_fps};

/// Errors raised while starting or joining the render thread.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("render thread panicked")]
    RenderThreadPanicked,
}

/// Configures and starts a [`Canvas`].
#[derive(Debug, Clone)]
pub struct CanvasBuilder {
    capacity: usize,
    period: Duration,
    overflow: OverflowPolicy,
    frame_limit: Option<u64>,
    thread_name: String,
}

impl Default for CanvasBuilder {
    fn default() -> Self {
        Self {
            capacity: 1024,
            period: period_from_fps(60),
            overflow: OverflowPolicy::default(),
            frame_limit: None,
            thread_name: "threadcanvas-render".to_string(),
        }
    }
}

impl CanvasBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preset from the `[canvas]` config section.
    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new()
            .capacity(config.capacity)
            .fps(config.fps)
            .overflow(config.overflow)
    }

    /// Maximum queued drawables. Zero is treated as one.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Minimum time between two drains. Zero drains as fast as possible.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn fps(self, fps: u32) -> Self {
        self.period(period_from_fps(fps))
    }

    pub fn overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Stop on its own after `frames` frames. Zero means no limit.
    pub fn frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = (frames > 0).then_some(frames);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Starts the render thread with an already constructed backend.
    pub fn build<B>(self, backend: B) -> Result<Canvas, CanvasError>
    where
        B: DrawBackend + Send + 'static,
    {
        self.build_with(move || Ok(backend))
    }

    /// Starts the render thread and constructs the backend on it.
    ///
    /// Use this for backends that are not `Send`. If `factory` fails the
    /// canvas comes up closed and reports [`RenderEvent::Fatal`].
    pub fn build_with<B, F>(self, factory: F) -> Result<Canvas, CanvasError>
    where
        B: DrawBackend + 'static,
        F: FnOnce() -> Result<B, BackendError> + Send + 'static,
    {
        let shared = Arc::new(LoopShared::new(self.capacity));
        let (events_tx, events_rx) = mpsc::channel();
        let period = self.period;
        let frame_limit = self.frame_limit;

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let _stop_on_panic = StopOnPanic(thread_shared.clone());
                match factory() {
                    Ok(backend) => {
                        let timer = FrameTimer::new(period);
                        RenderLoop::new(thread_shared, backend, timer, events_tx, frame_limit)
                            .run();
                    }
                    Err(err) => {
                        error!("Failed to create draw backend: {}", err);
                        let _ = events_tx.send(RenderEvent::Fatal {
                            frame: 0,
                            error: err,
                        });
                        let _ = events_tx.send(RenderEvent::Stopped {
                            frames: 0,
                            reason: StopReason::Fatal,
                        });
                        thread_shared.mark_stopped(StopReason::Fatal);
                    }
                }
            })?;

        info!(
            "Canvas started (capacity: {}, period: {:?}, overflow: {})",
            shared.queue.capacity(),
            period,
            self.overflow
        );

        Ok(Canvas {
            shared,
            overflow: self.overflow,
            period,
            events: Mutex::new(events_rx),
            render_thread: Mutex::new(Some(handle)),
        })
    }
}

/// Closes the canvas if the render thread unwinds, so no producer stays blocked.
struct StopOnPanic(Arc<LoopShared>);

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Render thread panicked - closing canvas");
            self.0.mark_stopped(StopReason::Fatal);
        }
    }
}

/// Thread-safe drawing surface fed by many producers and drained by one
/// render thread.
///
/// Dropping the canvas shuts it down and joins the render thread.
pub struct Canvas {
    shared: Arc<LoopShared>,
    overflow: OverflowPolicy,
    period: Duration,
    events: Mutex<mpsc::Receiver<RenderEvent>>,
    render_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Canvas {
    pub fn builder() -> CanvasBuilder {
        CanvasBuilder::new()
    }

    /// Queues one drawable.
    ///
    /// Takes the producer lock for the duration of the push, unless the
    /// calling thread already holds it through a [`Batch`]. Blocks while the
    /// queue is full under [`OverflowPolicy::Block`].
    pub fn submit(&self, drawable: Drawable) -> Result<(), QueueClosed<Drawable>> {
        if self.shared.lock.is_held_by_current() {
            return self.enqueue(drawable);
        }
        let guard = match self.shared.lock.lock() {
            Ok(guard) => guard,
            Err(err) => {
                debug!("Submit rejected: {}", err);
                return Err(QueueClosed(drawable));
            }
        };
        let result = self.enqueue(drawable);
        drop(guard);
        result
    }

    /// Takes the producer lock so a group of drawables lands contiguously.
    ///
    /// # Errors
    /// [`LockError::Closed`] after shutdown, [`LockError::AlreadyHeld`] if
    /// this thread already has a batch open.
    pub fn batch(&self) -> Result<Batch<'_>, LockError> {
        let guard = self.shared.lock.lock()?;
        Ok(Batch {
            canvas: self,
            guard,
            pushed: 0,
        })
    }

    /// Submits every drawable from `drawables` under one lock hold.
    ///
    /// On failure the error carries the drawables that were not queued.
    pub fn submit_batch<I>(&self, drawables: I) -> Result<usize, QueueClosed<Vec<Drawable>>>
    where
        I: IntoIterator<Item = Drawable>,
    {
        let mut items = drawables.into_iter();
        let mut batch = match self.batch() {
            Ok(batch) => batch,
            Err(_) => return Err(QueueClosed(items.collect())),
        };
        while let Some(drawable) = items.next() {
            if let Err(QueueClosed(rejected)) = batch.push(drawable) {
                let mut rest = vec![rejected];
                rest.extend(items);
                return Err(QueueClosed(rest));
            }
        }
        Ok(batch.finish())
    }

    fn enqueue(&self, drawable: Drawable) -> Result<(), QueueClosed<Drawable>> {
        match self.overflow {
            OverflowPolicy::Block => self.shared.queue.push(drawable),
            OverflowPolicy::OverwriteOldest => {
                if let Some(evicted) = self.shared.queue.push_overwrite(drawable)? {
                    let total = self.shared.counters.record_eviction();
                    debug!(
                        "Queue full: evicted {} (tag {}), {} eviction(s) so far",
                        evicted.shape().name(),
                        evicted.tag(),
                        total
                    );
                }
                Ok(())
            }
        }
    }

    /// Stops drawing until [`resume`](Self::resume).
    ///
    /// Returns once any in-flight frame has finished, so the backend sees no
    /// draw call while paused. Producers may keep submitting until the queue
    /// fills up.
    pub fn pause(&self) {
        self.shared.pause();
        debug!("Canvas paused");
    }

    pub fn resume(&self) {
        self.shared.resume();
        debug!("Canvas resumed");
    }

    /// Blocks the calling thread until the render loop finishes its next
    /// frame, so producers can pace themselves to the frame period.
    ///
    /// Returns the frame number reached. Returns immediately once the canvas
    /// has stopped; while paused it waits for [`resume`](Self::resume).
    pub fn sleep(&self) -> u64 {
        self.shared.wait_next_frame()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control().paused
    }

    /// Whether submissions are still accepted.
    pub fn is_open(&self) -> bool {
        !self.shared.queue.is_closed()
    }

    pub fn loop_state(&self) -> LoopState {
        self.shared.control().state
    }

    /// Why the render loop stopped, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shared.control().reason
    }

    /// Number of frames processed so far.
    pub fn frame_number(&self) -> u64 {
        self.shared.counters.snapshot().frames
    }

    /// Measured frame rate over the last frame; zero before the first frame.
    pub fn fps(&self) -> f64 {
        self.shared.counters.snapshot().fps
    }

    pub fn stats(&self) -> RenderStats {
        self.shared.counters.snapshot()
    }

    /// Drawables queued but not drawn yet.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// The lock serializing producers, for explicit acquire/release.
    pub fn producer_lock(&self) -> &ProducerLock {
        &self.shared.lock
    }

    /// Every render event received so far, without blocking.
    pub fn poll_events(&self) -> Vec<RenderEvent> {
        self.events.lock().try_iter().collect()
    }

    pub fn try_recv_event(&self) -> Option<RenderEvent> {
        self.events.lock().try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<RenderEvent> {
        self.events.lock().recv_timeout(timeout).ok()
    }

    /// Blocks until the render loop stops on its own (frame limit, fatal
    /// error, or a shutdown from another thread) and joins it.
    pub fn wait(&self) -> Result<StopReason, CanvasError> {
        let reason = self.shared.wait_stopped();
        self.join()?;
        Ok(reason)
    }

    /// Closes the queue, stops the render loop and joins its thread.
    ///
    /// Idempotent. Blocked producers return [`QueueClosed`].
    pub fn shutdown(&self) {
        if !self.shared.queue.is_closed() {
            info!("Canvas shutting down");
        }
        self.shared.request_stop();
        if let Err(err) = self.join() {
            warn!("{}", err);
        }
    }

    fn join(&self) -> Result<(), CanvasError> {
        let Some(handle) = self.render_thread.lock().take() else {
            return Ok(());
        };
        if handle.thread().id() == thread::current().id() {
            // Called from the render thread; it exits once this call returns.
            return Ok(());
        }
        match handle.join() {
            Ok(()) => {
                debug!("Render thread joined");
                Ok(())
            }
            Err(_) => {
                self.shared.mark_stopped(StopReason::Fatal);
                Err(CanvasError::RenderThreadPanicked)
            }
        }
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A held producer lock. Drawables pushed through it are queued back to back.
///
/// Dropping the batch (or calling [`finish`](Self::finish)) releases the lock.
#[must_use = "dropping the batch releases the producer lock immediately"]
pub struct Batch<'a> {
    canvas: &'a Canvas,
    guard: ProducerGuard<'a>,
    pushed: usize,
}

impl Batch<'_> {
    pub fn push(&mut self, drawable: Drawable) -> Result<(), QueueClosed<Drawable>> {
        self.canvas.enqueue(drawable)?;
        self.pushed += 1;
        Ok(())
    }

    /// Drawables queued through this batch so far.
    pub fn len(&self) -> usize {
        self.pushed
    }

    pub fn is_empty(&self) -> bool {
        self.pushed == 0
    }

    /// Releases the lock and returns how many drawables were queued.
    pub fn finish(self) -> usize {
        let pushed = self.pushed;
        if let Err(err) = self.guard.release() {
            warn!("Releasing batch lock failed: {}", err);
        }
        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{GREEN, Shape};
    use crate::render::RecordingBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn square(tag: u64) -> Drawable {
        Drawable::new(
            Shape::Rectangle {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 4.0,
                filled: true,
            },
            GREEN,
        )
        .with_tag(tag)
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        done()
    }

    struct FailingBackend {
        fatal_tag: u64,
        broken_tag: u64,
    }

    impl DrawBackend for FailingBackend {
        fn draw(&mut self, drawable: Drawable) -> Result<(), BackendError> {
            if drawable.tag() == self.fatal_tag {
                Err(BackendError::Fatal("context lost".into()))
            } else if drawable.tag() == self.broken_tag {
                Err(BackendError::Draw("bad shape".into()))
            } else {
                Ok(())
            }
        }
    }

    struct SlowBackend {
        drawn: Arc<AtomicUsize>,
    }

    impl DrawBackend for SlowBackend {
        fn draw(&mut self, _drawable: Drawable) -> Result<(), BackendError> {
            thread::sleep(Duration::from_millis(5));
            self.drawn.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct PanickingBackend;

    impl DrawBackend for PanickingBackend {
        fn draw(&mut self, _drawable: Drawable) -> Result<(), BackendError> {
            panic!("backend blew up");
        }
    }

    #[test]
    fn submitted_drawables_are_drawn_in_order() {
        let backend = RecordingBackend::new();
        let canvas = Canvas::builder()
            .period(Duration::from_millis(1))
            .build(backend.clone())
            .unwrap();

        for tag in 0..20 {
            canvas.submit(square(tag)).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || backend.drawn_count() == 20));
        canvas.shutdown();

        let tags: Vec<u64> = backend.drawn().iter().map(Drawable::tag).collect();
        assert_eq!(tags, (0..20).collect::<Vec<_>>());
        assert!(canvas.frame_number() >= 1);
        assert_eq!(canvas.stats().drawn, 20);
    }

    #[test]
    fn nothing_is_drawn_while_paused() {
        let backend = RecordingBackend::new();
        let canvas = Canvas::builder()
            .capacity(16)
            .period(Duration::from_millis(1))
            .build(backend.clone())
            .unwrap();

        canvas.pause();
        assert!(canvas.is_paused());
        for tag in 0..5 {
            canvas.submit(square(tag)).unwrap();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(backend.drawn_count(), 0);
        assert_eq!(canvas.pending(), 5);
        assert_eq!(canvas.loop_state(), LoopState::Paused);

        canvas.resume();
        assert!(wait_until(Duration::from_secs(5), || backend.drawn_count() == 5));
        assert!(!canvas.is_paused());
    }

    #[test]
    fn shutdown_is_idempotent_and_rejects_later_submits() {
        let canvas = Canvas::builder().build(RecordingBackend::new()).unwrap();
        assert!(canvas.is_open());

        canvas.shutdown();
        canvas.shutdown();

        assert!(!canvas.is_open());
        assert_eq!(canvas.loop_state(), LoopState::Stopped);
        assert_eq!(canvas.stop_reason(), Some(StopReason::Shutdown));
        let err = canvas.submit(square(7)).unwrap_err();
        assert_eq!(err.into_inner().tag(), 7);
        assert_eq!(canvas.batch().err(), Some(LockError::Closed));
        assert!(matches!(
            canvas.poll_events().last(),
            Some(RenderEvent::Stopped {
                reason: StopReason::Shutdown,
                ..
            })
        ));
    }

    #[test]
    fn fatal_backend_error_closes_the_canvas() {
        let canvas = Canvas::builder()
            .period(Duration::ZERO)
            .build(FailingBackend {
                fatal_tag: 3,
                broken_tag: 1,
            })
            .unwrap();

        canvas.pause();
        assert_eq!(canvas.submit_batch((0..5).map(square)).unwrap(), 5);
        canvas.resume();
        assert_eq!(canvas.wait().unwrap(), StopReason::Fatal);

        assert!(canvas.submit(square(9)).is_err());
        let events = canvas.poll_events();
        assert!(events.iter().any(|e| matches!(
            e,
            RenderEvent::DrawFailed { shape: "rectangle", .. }
        )));
        assert!(events.iter().any(|e| matches!(e, RenderEvent::Fatal { .. })));

        let stats = canvas.stats();
        assert_eq!(stats.drawn, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.discarded, 2);
    }

    #[test]
    fn failing_factory_comes_up_closed() {
        let canvas = Canvas::builder()
            .build_with(|| -> Result<RecordingBackend, BackendError> {
                Err(BackendError::Fatal("no display".into()))
            })
            .unwrap();

        assert_eq!(canvas.wait().unwrap(), StopReason::Fatal);
        assert!(!canvas.is_open());
        assert!(canvas.submit(square(0)).is_err());
        assert!(matches!(
            canvas.try_recv_event(),
            Some(RenderEvent::Fatal { frame: 0, .. })
        ));
    }

    #[test]
    fn frame_limit_stops_the_loop() {
        let canvas = Canvas::builder()
            .period(Duration::from_millis(1))
            .frame_limit(3)
            .build(RecordingBackend::new())
            .unwrap();

        assert_eq!(canvas.wait().unwrap(), StopReason::FrameLimit);
        assert_eq!(canvas.frame_number(), 3);
        assert!(!canvas.is_open());
    }

    #[test]
    fn submit_inside_batch_reuses_the_held_lock() {
        let backend = RecordingBackend::new();
        let canvas = Canvas::builder()
            .period(Duration::from_millis(1))
            .build(backend.clone())
            .unwrap();

        let mut batch = canvas.batch().unwrap();
        batch.push(square(1)).unwrap();
        canvas.submit(square(2)).unwrap();
        batch.push(square(3)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(canvas.batch().err(), Some(LockError::AlreadyHeld));
        assert_eq!(batch.finish(), 2);
        assert!(!canvas.producer_lock().is_held());

        assert!(wait_until(Duration::from_secs(5), || backend.drawn_count() == 3));
    }

    #[test]
    fn overwrite_policy_counts_evictions() {
        let backend = RecordingBackend::new();
        let canvas = Canvas::builder()
            .capacity(2)
            .overflow(OverflowPolicy::OverwriteOldest)
            .period(Duration::from_millis(1))
            .build(backend.clone())
            .unwrap();

        canvas.pause();
        for tag in 0..5 {
            canvas.submit(square(tag)).unwrap();
        }
        assert_eq!(canvas.stats().evicted, 3);
        canvas.resume();

        assert!(wait_until(Duration::from_secs(5), || backend.drawn_count() == 2));
        let tags: Vec<u64> = backend.drawn().iter().map(Drawable::tag).collect();
        assert_eq!(tags, vec![3, 4]);
    }

    #[test]
    fn pause_during_a_frame_waits_for_the_frame_to_finish() {
        let drawn = Arc::new(AtomicUsize::new(0));
        let canvas = Canvas::builder()
            .capacity(32)
            .period(Duration::from_millis(1))
            .build(SlowBackend {
                drawn: drawn.clone(),
            })
            .unwrap();

        for tag in 0..20 {
            canvas.submit(square(tag)).unwrap();
        }
        assert!(wait_until(Duration::from_secs(5), || {
            drawn.load(Ordering::SeqCst) >= 3
        }));

        canvas.pause();
        let at_pause = drawn.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(drawn.load(Ordering::SeqCst), at_pause);
        assert_eq!(canvas.loop_state(), LoopState::Paused);

        canvas.resume();
        assert!(wait_until(Duration::from_secs(5), || {
            drawn.load(Ordering::SeqCst) == 20
        }));
    }

    #[test]
    fn backend_panic_leaves_no_caller_blocked() {
        let canvas = Arc::new(
            Canvas::builder()
                .period(Duration::from_millis(1))
                .build(PanickingBackend)
                .unwrap(),
        );
        canvas.submit(square(1)).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            canvas.stop_reason().is_some()
        }));

        let (done_tx, done_rx) = mpsc::channel();
        let pauser = canvas.clone();
        thread::spawn(move || {
            pauser.pause();
            pauser.sleep();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());

        assert!(!canvas.is_open());
        assert!(canvas.submit(square(2)).is_err());
        assert!(matches!(
            canvas.wait(),
            Err(CanvasError::RenderThreadPanicked)
        ));
        assert_eq!(canvas.stop_reason(), Some(StopReason::Fatal));
    }

    #[test]
    fn sleep_returns_after_the_next_frame() {
        let canvas = Canvas::builder()
            .period(Duration::from_millis(2))
            .build(RecordingBackend::new())
            .unwrap();

        let before = canvas.frame_number();
        let reached = canvas.sleep();
        assert!(reached > before);
        assert!(canvas.frame_number() >= reached);

        canvas.shutdown();
        assert_eq!(canvas.sleep(), canvas.frame_number());
    }
}
