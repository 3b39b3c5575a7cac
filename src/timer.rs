//! Frame pacing timer.
//!
//! Tracks time since the last frame boundary against a configured period.
//! Time always comes from a monotonic [`Clock`], never the wall clock.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic timestamps.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// [`Instant::now`]-backed clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Converts a frames-per-second rate to a frame period. Zero means unpaced.
pub fn period_from_fps(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(1_000_000_000 / fps as u64)
    }
}

/// Reports whether a frame period has elapsed since the last [`reset`](FrameTimer::reset).
#[derive(Debug)]
pub struct FrameTimer<C: Clock = MonotonicClock> {
    clock: C,
    period: Duration,
    started: Instant,
    last_reset: Instant,
    between_resets: Option<Duration>,
}

impl FrameTimer<MonotonicClock> {
    pub fn new(period: Duration) -> Self {
        Self::with_clock(period, MonotonicClock)
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::new(period_from_fps(fps))
    }
}

impl<C: Clock> FrameTimer<C> {
    pub fn with_clock(period: Duration, clock: C) -> Self {
        let now = clock.now();
        Self {
            clock,
            period,
            started: now,
            last_reset: now,
            between_resets: None,
        }
    }

    /// True once the time since the last reset meets or exceeds the period.
    ///
    /// Always true for a zero period. Does not reset the timer.
    pub fn past_period(&self) -> bool {
        self.elapsed() >= self.period
    }

    /// Marks "now" as the start of the next period.
    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.between_resets = Some(now.saturating_duration_since(self.last_reset));
        self.last_reset = now;
    }

    /// Time since the last reset. Non-decreasing between resets.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.last_reset)
    }

    /// Time left until the period elapses, zero if it already has.
    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.elapsed())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Number of whole periods since the timer was created.
    pub fn reps(&self) -> u64 {
        if self.period.is_zero() {
            return 0;
        }
        let total = self.clock.now().saturating_duration_since(self.started);
        (total.as_nanos() / self.period.as_nanos()) as u64
    }

    /// Measured spacing between the last two resets.
    pub fn time_between_frames(&self) -> Option<Duration> {
        self.between_resets
    }

    /// Frame rate derived from [`time_between_frames`](Self::time_between_frames).
    pub fn measured_fps(&self) -> Option<f64> {
        self.between_resets
            .filter(|d| !d.is_zero())
            .map(|d| 1.0 / d.as_secs_f64())
    }

    /// Puts the current thread to sleep until the period has elapsed.
    pub fn sleep_until_period(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_timer(period_ms: u64) -> (FrameTimer<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let timer = FrameTimer::with_clock(Duration::from_millis(period_ms), clock.clone());
        (timer, clock)
    }

    #[test]
    fn past_period_after_elapsed_time() {
        let (mut timer, clock) = manual_timer(16);
        timer.reset();
        assert!(!timer.past_period());

        clock.advance(Duration::from_millis(15));
        assert!(!timer.past_period());
        assert_eq!(timer.remaining(), Duration::from_millis(1));

        clock.advance(Duration::from_millis(1));
        assert!(timer.past_period());
        // Checking does not reset.
        assert!(timer.past_period());

        timer.reset();
        assert!(!timer.past_period());
    }

    #[test]
    fn zero_period_is_always_ready() {
        let (mut timer, _clock) = manual_timer(0);
        assert!(timer.past_period());
        timer.reset();
        assert!(timer.past_period());
        assert_eq!(timer.reps(), 0);
    }

    #[test]
    fn elapsed_is_monotonic_between_resets() {
        let (timer, clock) = manual_timer(10);
        let mut last = timer.elapsed();
        for _ in 0..5 {
            clock.advance(Duration::from_millis(3));
            let now = timer.elapsed();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn measures_frame_spacing_and_reps() {
        let (mut timer, clock) = manual_timer(20);
        assert_eq!(timer.time_between_frames(), None);

        clock.advance(Duration::from_millis(25));
        timer.reset();
        assert_eq!(timer.time_between_frames(), Some(Duration::from_millis(25)));
        assert_eq!(timer.measured_fps().map(|f| f.round()), Some(40.0));

        clock.advance(Duration::from_millis(40));
        assert_eq!(timer.reps(), 3);
    }

    #[test]
    fn fps_conversion() {
        assert_eq!(period_from_fps(0), Duration::ZERO);
        assert_eq!(FrameTimer::from_fps(50).period(), Duration::from_millis(20));
    }

    #[test]
    fn real_clock_reaches_period() {
        let timer = FrameTimer::new(Duration::from_millis(50));
        assert!(!timer.past_period());
        timer.sleep_until_period();
        assert!(timer.past_period());
    }
}
