//! The tick loop.
//!
//! [`SimDriver`] owns the device, the memory and the two bus-side responders.
//! Every tick it checks for termination, drives reset and clock, services the
//! bus on rising edges, evaluates the device and feeds the optional sinks.

use std::fmt;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::{ClockSchedule, Phase};
use crate::coverage::CoverageSink;
use crate::device::{BusPins, Device};
use crate::error::SimError;
use crate::memory::SparseMemory;
use crate::monitor::{SentinelMonitor, Verdict};
use crate::responder::{BusResponder, BusStats};
use crate::trace::TraceSink;
use crate::SimConfig;

/// Why a run ended without passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The device read the fail sentinel.
    Sentinel,
    /// The tick counter reached the timeout.
    Timeout,
    /// The device stopped on its own without reading a sentinel.
    NoVerdict,
}

/// The final result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// The device read the pass sentinel.
    Pass,
    /// The run failed for the given reason.
    Fail(FailReason),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Pass`].
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Pass)
    }

    /// Process exit status for this outcome: 0 on pass, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Fail(FailReason::Sentinel) => write!(f, "fail (fail sentinel read)"),
            Outcome::Fail(FailReason::Timeout) => write!(f, "fail (timeout)"),
            Outcome::Fail(FailReason::NoVerdict) => write!(f, "fail (no verdict reached)"),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: Outcome,
    /// Number of ticks executed.
    pub ticks: u64,
    /// Bus handshake counters and boundary violations.
    pub bus: BusStats,
}

/// The result of a single [`SimDriver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A tick was executed; the loop may continue.
    Continued,
    /// A termination condition holds; no tick was executed.
    Done,
}

/// Owns a device and everything it talks to, and clocks it to completion.
///
/// Construct with [`SimDriver::new`], optionally attach sinks, preload
/// memory through [`memory_mut`](Self::memory_mut), then call
/// [`run`](Self::run).
pub struct SimDriver<D: Device> {
    device: D,
    memory: SparseMemory,
    responder: BusResponder,
    monitor: SentinelMonitor,
    schedule: ClockSchedule,
    timeout_ticks: u64,
    tick: u64,
    phase: Phase,
    clock: bool,
    trace: Option<Box<dyn TraceSink>>,
    coverage: Option<(Box<dyn CoverageSink>, PathBuf)>,
    report: Option<RunReport>,
}

impl<D: Device> SimDriver<D> {
    /// Creates a driver at tick 0 with reset asserted and the clock low.
    ///
    /// Rejects configurations that fail [`SimConfig::validate`] and memories
    /// whose range is inverted.
    pub fn new(device: D, memory: SparseMemory, config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let (lo, hi) = memory.range();
        if lo > hi {
            return Err(SimError::invalid_config(format!(
                "memory range <{lo:#010x}, {hi:#010x}> is empty"
            )));
        }
        let mut driver = Self {
            device,
            memory,
            responder: BusResponder::new(),
            monitor: SentinelMonitor::new(config.pass_addr, config.fail_addr),
            schedule: ClockSchedule::new(config.half_period, config.reset_ticks),
            timeout_ticks: config.timeout_ticks,
            tick: 0,
            phase: Phase::Reset,
            clock: false,
            trace: None,
            coverage: None,
            report: None,
        };
        let pins = driver.device.pins_mut();
        pins.reset = true;
        pins.clock = false;
        Ok(driver)
    }

    /// Attaches a trace sink sampled once per tick.
    pub fn set_trace(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = Some(trace);
    }

    /// Attaches a coverage sink sampled once per tick and written to `path`
    /// at teardown.
    pub fn set_coverage(&mut self, coverage: Box<dyn CoverageSink>, path: impl Into<PathBuf>) {
        self.coverage = Some((coverage, path.into()));
    }

    /// The current tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The device under test.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The current pin values.
    pub fn pins(&self) -> &BusPins {
        self.device.pins()
    }

    /// The simulated memory.
    pub fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    /// Mutable access to memory, for preloading before the run.
    pub fn memory_mut(&mut self) -> &mut SparseMemory {
        &mut self.memory
    }

    /// Bus counters so far.
    pub fn bus_stats(&self) -> &BusStats {
        self.responder.stats()
    }

    /// The sentinel verdict, once one has been seen.
    pub fn verdict(&self) -> Option<Verdict> {
        self.monitor.verdict()
    }

    /// The termination condition holding at the current tick, if any.
    ///
    /// A sentinel verdict takes precedence over a native finish, which takes
    /// precedence over the timeout.
    fn termination(&self) -> Option<Outcome> {
        match self.monitor.verdict() {
            Some(Verdict::Pass) => return Some(Outcome::Pass),
            Some(Verdict::Fail) => return Some(Outcome::Fail(FailReason::Sentinel)),
            None => {}
        }
        if self.device.finished() {
            return Some(Outcome::Fail(FailReason::NoVerdict));
        }
        if self.tick >= self.timeout_ticks {
            return Some(Outcome::Fail(FailReason::Timeout));
        }
        None
    }

    /// Executes one tick, unless a termination condition already holds.
    pub fn step(&mut self) -> Result<StepResult, SimError> {
        if self.phase == Phase::Halted || self.termination().is_some() {
            self.phase = Phase::Halted;
            return Ok(StepResult::Done);
        }

        let tick = self.tick;
        let reset = self.schedule.reset_asserted(tick);
        if self.phase == Phase::Reset && !reset {
            debug!("tick {tick}: reset released");
            self.phase = Phase::Running;
        }

        let rising = self.schedule.rises_at(tick);
        if self.schedule.toggles_at(tick) {
            self.clock = !self.clock;
        }
        debug_assert!(!rising || self.clock);

        let pins = self.device.pins_mut();
        pins.reset = reset;
        pins.clock = self.clock;

        if rising {
            self.responder.respond(tick, pins, &mut self.memory);
            self.monitor.observe(tick, self.device.pins());
        }

        self.device.evaluate();

        if let Some(trace) = self.trace.as_mut() {
            trace.sample(tick, self.device.pins())?;
        }
        if let Some((coverage, _)) = self.coverage.as_mut() {
            coverage.sample(tick, self.device.pins());
        }

        self.tick += 1;
        Ok(StepResult::Continued)
    }

    /// Runs until a termination condition holds, then tears down.
    ///
    /// Teardown closes the trace, finalizes the device and writes coverage,
    /// exactly once; calling `run` again returns the same report. If a tick
    /// fails, the driver halts and tears down before the error is returned.
    pub fn run(&mut self) -> Result<RunReport, SimError> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        info!(
            "running until tick {} (half period {}, reset through tick {})",
            self.timeout_ticks,
            self.schedule.half_period(),
            self.schedule.reset_ticks()
        );
        loop {
            match self.step() {
                Ok(StepResult::Continued) => {}
                Ok(StepResult::Done) => break,
                Err(err) => {
                    warn!("tick {}: {err}; halting", self.tick);
                    self.phase = Phase::Halted;
                    if let Err(teardown_err) = self.teardown() {
                        warn!("teardown after failed tick: {teardown_err}");
                    }
                    return Err(err);
                }
            }
        }
        self.teardown()
    }

    fn teardown(&mut self) -> Result<RunReport, SimError> {
        let outcome = self
            .termination()
            .unwrap_or(Outcome::Fail(FailReason::NoVerdict));
        self.phase = Phase::Halted;

        let trace_result = match self.trace.as_mut() {
            Some(trace) => trace.close(),
            None => Ok(()),
        };
        self.device.finalize();
        let coverage_result = match self.coverage.as_mut() {
            Some((coverage, path)) => coverage.write(path),
            None => Ok(()),
        };

        let report = RunReport {
            outcome,
            ticks: self.tick,
            bus: self.responder.stats().clone(),
        };
        self.report = Some(report.clone());
        info!("halted at tick {}: {outcome}", self.tick);

        trace_result?;
        coverage_result?;
        Ok(report)
    }
}
