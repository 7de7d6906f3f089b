//! Tick timing for `progress` loops
//!
//! Keeps the durations of the last `window` ticks with a running sum, so the
//! average is constant time however often it is read between ticks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct TickTimer {
    tick_start: Instant,
    recent: VecDeque<Duration>,
    recent_total: Duration,
    window: usize,
    ticks: u64,
    total: Duration,
}

impl TickTimer {
    /// Timer averaging over the last `window` ticks. A window of zero is
    /// bumped to one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            tick_start: Instant::now(),
            recent: VecDeque::with_capacity(window),
            recent_total: Duration::ZERO,
            window,
            ticks: 0,
            total: Duration::ZERO,
        }
    }

    pub fn begin(&mut self) {
        self.tick_start = Instant::now();
    }

    pub fn end(&mut self) {
        self.record(self.tick_start.elapsed());
    }

    /// Count one tick that took `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        if self.recent.len() == self.window {
            if let Some(oldest) = self.recent.pop_front() {
                self.recent_total -= oldest;
            }
        }
        self.recent.push_back(elapsed);
        self.recent_total += elapsed;
        self.ticks += 1;
        self.total += elapsed;
    }

    /// Ticks completed since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time spent inside ticks since creation.
    pub fn total_time(&self) -> Duration {
        self.total
    }

    fn recent_average(&self) -> Duration {
        match self.recent.len() {
            0 => Duration::ZERO,
            n => self.recent_total / n as u32,
        }
    }

    pub fn ticks_per_second(&self) -> f64 {
        let avg = self.recent_average().as_secs_f64();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Average over the recent window, in milliseconds.
    pub fn tick_time_ms(&self) -> f64 {
        self.recent_average().as_secs_f64() * 1000.0
    }

    /// Fastest and slowest tick of the recent window, in milliseconds.
    pub fn tick_time_range_ms(&self) -> (f64, f64) {
        let min = self.recent.iter().min().copied().unwrap_or_default();
        let max = self.recent.iter().max().copied().unwrap_or_default();
        (min.as_secs_f64() * 1000.0, max.as_secs_f64() * 1000.0)
    }
}
