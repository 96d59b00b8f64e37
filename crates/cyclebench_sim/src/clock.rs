//! Tick-based reset and clock stimulus.
//!
//! Simulated time is a bare tick counter. [`ClockSchedule`] decides, for a
//! given tick, whether reset is held and whether the clock inverts.

use std::fmt;

use serde::Serialize;

/// Default number of ticks reset is held for.
pub const DEFAULT_RESET_TICKS: u64 = 40;
/// Default number of ticks between clock inversions.
pub const DEFAULT_HALF_PERIOD: u64 = 10;

/// Reset and clock timing for a run.
///
/// Reset is asserted for ticks `0..=reset_ticks`. The clock starts low and
/// inverts on every tick `t` with `t % half_period == 1 % half_period`, so the
/// first inversion (a rising edge) lands on tick 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSchedule {
    half_period: u64,
    reset_ticks: u64,
}

impl ClockSchedule {
    /// Creates a schedule. `half_period` must be non-zero.
    pub fn new(half_period: u64, reset_ticks: u64) -> Self {
        debug_assert!(half_period > 0, "zero half period");
        Self {
            half_period,
            reset_ticks,
        }
    }

    /// Ticks between clock inversions.
    pub fn half_period(&self) -> u64 {
        self.half_period
    }

    /// Last tick on which reset is held.
    pub fn reset_ticks(&self) -> u64 {
        self.reset_ticks
    }

    /// Returns `true` if reset is asserted on `tick`.
    pub fn reset_asserted(&self, tick: u64) -> bool {
        tick <= self.reset_ticks
    }

    /// Returns `true` if the clock inverts on `tick`.
    pub fn toggles_at(&self, tick: u64) -> bool {
        tick % self.half_period == 1 % self.half_period
    }

    /// Returns `true` if `tick` carries a low-to-high transition.
    ///
    /// Inversions are numbered from zero; the even-numbered ones rise.
    pub fn rises_at(&self, tick: u64) -> bool {
        self.toggles_at(tick) && self.inversions_before(tick) % 2 == 0
    }

    /// Number of clock inversions on ticks strictly before `tick`.
    fn inversions_before(&self, tick: u64) -> u64 {
        let first = 1 % self.half_period;
        if tick <= first {
            0
        } else {
            (tick - first - 1) / self.half_period + 1
        }
    }
}

impl Default for ClockSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_HALF_PERIOD, DEFAULT_RESET_TICKS)
    }
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Reset is asserted.
    Reset,
    /// Reset released and the clock is running.
    Running,
    /// The loop has terminated.
    Halted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Reset => write!(f, "reset"),
            Phase::Running => write!(f, "running"),
            Phase::Halted => write!(f, "halted"),
        }
    }
}
