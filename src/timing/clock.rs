// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio-domain clocks and frame pacing.
//!
//! Every scheduling decision in the engine is made against a single
//! [`ClockSource`] read per tick. The clock is independent of the render
//! frame rate; [`FrameTimer`] only paces the tick loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default tick rate for the simulation loop
pub const DEFAULT_TICK_RATE: f64 = 60.0;

/// Monotonic, high-resolution audio-domain time source.
pub trait ClockSource: Send {
    /// Current time in seconds. Never decreases between calls.
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], counting seconds since creation
#[derive(Debug, Clone)]
pub struct AudioClock {
    origin: Instant,
    /// Constant offset added to every reading
    offset: f64,
}

impl AudioClock {
    /// Create a clock that reads 0.0 now
    pub fn new() -> Self {
        Self::with_offset(0.0)
    }

    /// Create a clock that reads `offset` now
    pub fn with_offset(offset: f64) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }
}

impl Default for AudioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for AudioClock {
    fn now(&self) -> f64 {
        self.offset + self.origin.elapsed().as_secs_f64()
    }
}

/// Caller-driven clock for tests and headless simulation.
///
/// Clones share the same time value, so a test can hand one clone to the
/// engine and advance the other.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `seconds`
    pub fn new(seconds: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(seconds.to_bits())),
        }
    }

    /// Move the clock forward. Negative or non-finite steps are ignored.
    pub fn advance(&self, delta: f64) {
        if delta.is_finite() && delta > 0.0 {
            self.set(self.now() + delta);
        }
    }

    /// Jump to an absolute time. Jumps backwards are ignored.
    pub fn set(&self, seconds: f64) {
        if seconds.is_finite() && seconds >= self.now() {
            self.bits.store(seconds.to_bits(), Ordering::SeqCst);
        }
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// Frame pacing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Stopped,
    Running,
}

/// Paces a tick loop at a fixed rate.
#[derive(Debug)]
pub struct FrameTimer {
    /// Target ticks per second
    rate: f64,
    state: FrameState,
    /// Last tick time
    last_tick: Option<Instant>,
    /// Number of ticks emitted since start
    frames: u64,
}

impl FrameTimer {
    /// Create a timer at the given tick rate (clamped to 1..=1000 Hz)
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(1.0, 1000.0),
            state: FrameState::Stopped,
            last_tick: None,
            frames: 0,
        }
    }

    /// Target tick rate in Hz
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Ticks emitted since the last start
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Interval between ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate)
    }

    pub fn start(&mut self) {
        self.state = FrameState::Running;
        self.frames = 0;
        self.last_tick = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.state = FrameState::Stopped;
        self.last_tick = None;
    }

    /// Returns true when the next tick is due
    pub fn tick(&mut self) -> bool {
        if self.state != FrameState::Running {
            return false;
        }

        let now = Instant::now();
        match self.last_tick {
            Some(last) if now.duration_since(last) >= self.frame_interval() => {
                self.last_tick = Some(now);
                self.frames += 1;
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick is due
    pub fn time_until_next_frame(&self) -> Duration {
        if self.state != FrameState::Running {
            return Duration::ZERO;
        }

        let interval = self.frame_interval();
        match self.last_tick {
            Some(last) => interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_audio_clock_monotonic() {
        let clock = AudioClock::with_offset(5.0);
        let a = clock.now();
        thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(a >= 5.0);
        assert!(b > a);
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new(1.0);
        let handle = clock.clone();

        handle.advance(0.5);
        assert_eq!(clock.now(), 1.5);

        handle.set(3.0);
        assert_eq!(clock.now(), 3.0);
    }

    #[test]
    fn test_manual_clock_never_goes_back() {
        let clock = ManualClock::new(2.0);
        clock.set(1.0);
        assert_eq!(clock.now(), 2.0);

        clock.advance(-1.0);
        clock.advance(f64::NAN);
        assert_eq!(clock.now(), 2.0);
    }

    #[test]
    fn test_frame_timer_rate_clamping() {
        assert_eq!(FrameTimer::new(0.0).rate(), 1.0);
        assert_eq!(FrameTimer::new(5000.0).rate(), 1000.0);
    }

    #[test]
    fn test_frame_timer_ticks() {
        let mut timer = FrameTimer::new(1000.0);
        assert!(!timer.tick());

        timer.start();
        assert_eq!(timer.state(), FrameState::Running);
        thread::sleep(Duration::from_millis(3));
        assert!(timer.tick());
        assert_eq!(timer.frames(), 1);
        assert!(timer.time_until_next_frame() <= timer.frame_interval());

        timer.stop();
        assert_eq!(timer.time_until_next_frame(), Duration::ZERO);
    }
}
