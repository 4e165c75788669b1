//! Real-time pacing of the dispatch loop.
//!
//! The scheduler clock is purely logical. A pacer may slow the loop down so that a run can be watched as it goes,
//! it never affects scheduling decisions.

use std::thread;
use std::time::Duration;

/// Delay inserted after each dispatch iteration.
pub trait Pacer {
    /// Called with the number of time units consumed by the last iteration.
    fn pause(&mut self, consumed_units: u64);
}

/// Runs at full speed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pause(&mut self, _consumed_units: u64) {}
}

/// Sleeps for a fixed wall-clock duration per consumed time unit.
#[derive(Clone, Copy, Debug)]
pub struct WallClockPacer {
    per_unit: Duration,
}

impl WallClockPacer {
    pub fn new(per_unit: Duration) -> Self {
        Self { per_unit }
    }

    pub fn from_micros(per_unit_us: u64) -> Self {
        Self::new(Duration::from_micros(per_unit_us))
    }

    pub fn per_unit(&self) -> Duration {
        self.per_unit
    }

    /// Delay for the given number of time units.
    pub fn delay(&self, consumed_units: u64) -> Duration {
        self.per_unit.saturating_mul(consumed_units.min(u32::MAX as u64) as u32)
    }
}

impl Default for WallClockPacer {
    fn default() -> Self {
        Self::from_micros(100)
    }
}

impl Pacer for WallClockPacer {
    fn pause(&mut self, consumed_units: u64) {
        let delay = self.delay(consumed_units);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
