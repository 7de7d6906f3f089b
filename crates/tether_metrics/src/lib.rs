//! Tether Metrics - counters and timing for the binding and its runtime
//!
//! Everything here compiles to no-op stubs unless the `metrics` feature is
//! enabled, so instrumentation can stay in place in ship builds.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use tether_metrics::TickTimer;
//!
//! let mut timer = TickTimer::new(60);
//! timer.begin();
//! world.progress(1.0 / 60.0)?;
//! timer.end();
//! println!("tick: {:.3} ms", timer.tick_time_ms());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use counter::CallCounter;
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Execute code only when the calling crate enables its `metrics` feature
#[macro_export]
macro_rules! metrics {
    ($($tt:tt)*) => {
        #[cfg(feature = "metrics")]
        {
            $($tt)*
        }
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct CallCounter;

#[cfg(not(feature = "metrics"))]
impl CallCounter {
    pub fn new() -> Self { Self }
    pub fn record(&mut self, _name: &'static str) {}
    pub fn add(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &str) -> u64 { 0 }
    pub fn total(&self) -> u64 { 0 }
    pub fn reset_all(&mut self) {}
}

#[cfg(not(feature = "metrics"))]
pub struct TickTimer;

#[cfg(not(feature = "metrics"))]
impl TickTimer {
    pub fn new(_window: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn record(&mut self, _elapsed: std::time::Duration) {}
    pub fn ticks(&self) -> u64 { 0 }
    pub fn total_time(&self) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn ticks_per_second(&self) -> f64 { 0.0 }
    pub fn tick_time_ms(&self) -> f64 { 0.0 }
    pub fn tick_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(test)]
mod tests {
    #[test]
    fn compiles_with_or_without_metrics() {
        let mut counter = super::CallCounter::new();
        counter.record("new_system");
        let mut timer = super::TickTimer::new(60);
        timer.begin();
        timer.end();
        timer.record(std::time::Duration::from_millis(1));
    }
}
