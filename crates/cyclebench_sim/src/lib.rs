//! Cycle-driven bus-level verification harness.
//!
//! This crate clocks a device under test that talks to the outside world
//! through a single memory-mapped bus. The harness generates reset and clock,
//! answers the device's reads and writes from a sparse memory model, and
//! decides the test outcome by watching for reads of two sentinel addresses.
//!
//! # Architecture
//!
//! [`SimDriver`] owns the device (anything implementing [`Device`]), a
//! [`SparseMemory`], a [`BusResponder`] and a [`SentinelMonitor`]. Every tick
//! it drives reset and clock; on rising edges the responder services the bus
//! and the monitor looks for sentinels before the device evaluates. Optional
//! [`TraceSink`] and [`CoverageSink`] strategies observe the pins after
//! evaluation.
//!
//! # Usage
//!
//! ```no_run
//! use cyclebench_sim::{simulate, BusOp, ScriptedMaster, SimConfig, SparseMemory};
//!
//! let config = SimConfig::new(0x8000_0ff0, 0x8000_0ff4);
//! let device = ScriptedMaster::new(
//!     vec![BusOp::Write { addr: 0x100, data: 1, strobe: 0xf }],
//!     config.pass_addr,
//!     config.fail_addr,
//! );
//! let report = simulate(device, SparseMemory::full_range(0), &config)?;
//! println!("{} after {} ticks", report.outcome, report.ticks);
//! # Ok::<(), cyclebench_sim::SimError>(())
//! ```
//!
//! # Modules
//!
//! - `memory`: Sparse address-mapped word store
//! - `device`: The pin bundle and the device contract
//! - `responder`: Bus slave handshake responder
//! - `monitor`: Pass/fail sentinel monitor
//! - `clock`: Reset and clock schedule
//! - `driver`: The tick loop and run report
//! - `trace`: VCD waveform trace
//! - `coverage`: Toggle coverage database
//! - `preload`: Memory image loading
//! - `scripted`: A bus master that replays a fixed script

#![warn(missing_docs)]

pub mod clock;
pub mod coverage;
pub mod device;
pub mod driver;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod preload;
pub mod responder;
pub mod scripted;
pub mod trace;

use std::path::PathBuf;

pub use clock::{ClockSchedule, Phase, DEFAULT_HALF_PERIOD, DEFAULT_RESET_TICKS};
pub use coverage::{CoverageReport, CoverageSink, ToggleCoverage};
pub use device::{BusPins, Device};
pub use driver::{FailReason, Outcome, RunReport, SimDriver, StepResult};
pub use error::{MemoryError, PreloadError, SimError};
pub use memory::SparseMemory;
pub use monitor::{SentinelMonitor, Verdict};
pub use preload::{preload_file, preload_str};
pub use responder::{BoundaryViolation, BusResponder, BusStats, Channel};
pub use scripted::{BusOp, ScriptedMaster};
pub use trace::{TraceSink, VcdTrace};

/// Default number of ticks before a run is declared timed out.
pub const DEFAULT_TIMEOUT_TICKS: u64 = 10_000;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Reading this address ends the run with a pass.
    pub pass_addr: u32,
    /// Reading this address ends the run with a fail.
    pub fail_addr: u32,
    /// The run fails once the tick counter reaches this value.
    pub timeout_ticks: u64,
    /// Ticks between clock inversions.
    pub half_period: u64,
    /// Reset is held through this tick.
    pub reset_ticks: u64,
    /// Where to write a VCD trace. No trace is recorded if `None`.
    pub trace_path: Option<PathBuf>,
    /// Gzip the trace file.
    pub trace_compress: bool,
    /// Timescale written to the trace header.
    pub trace_timescale: String,
    /// Where to write the toggle coverage database, if anywhere.
    pub coverage_path: Option<PathBuf>,
}

impl SimConfig {
    /// Creates a configuration with the given sentinels and defaults for the
    /// rest.
    pub fn new(pass_addr: u32, fail_addr: u32) -> Self {
        Self {
            pass_addr,
            fail_addr,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            half_period: DEFAULT_HALF_PERIOD,
            reset_ticks: DEFAULT_RESET_TICKS,
            trace_path: None,
            trace_compress: false,
            trace_timescale: "1ns".to_string(),
            coverage_path: None,
        }
    }

    /// Checks the settings the tick loop depends on.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.pass_addr == self.fail_addr {
            return Err(SimError::invalid_config(format!(
                "pass and fail sentinels are both {:#010x}",
                self.pass_addr
            )));
        }
        if self.half_period == 0 {
            return Err(SimError::invalid_config("half period must be non-zero"));
        }
        if self.timeout_ticks == 0 {
            return Err(SimError::invalid_config("timeout must be non-zero"));
        }
        Ok(())
    }
}

/// High-level entry point: runs `device` against `memory` to completion.
///
/// Builds a [`SimDriver`], attaches a [`VcdTrace`] and a [`ToggleCoverage`]
/// when the configuration asks for them, and runs. Preload `memory` before
/// calling this.
pub fn simulate<D: Device>(
    device: D,
    memory: SparseMemory,
    config: &SimConfig,
) -> Result<RunReport, SimError> {
    let mut driver = SimDriver::new(device, memory, config)?;

    if let Some(path) = &config.trace_path {
        let trace = VcdTrace::create(path, config.trace_compress, &config.trace_timescale)?;
        driver.set_trace(Box::new(trace));
    }
    if let Some(path) = &config.coverage_path {
        driver.set_coverage(Box::new(ToggleCoverage::new()), path.clone());
    }

    driver.run()
}
