//! A behavioural bus master that replays a fixed list of transactions.
//!
//! [`ScriptedMaster`] stands in for a real design when exercising the
//! harness itself. It acts only on rising clock edges, issues one
//! transaction per op, and ends by reading the pass sentinel, or the fail
//! sentinel if a read returned something other than expected.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::device::{BusPins, Device};

/// One step of a [`ScriptedMaster`] script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BusOp {
    /// Read `addr`, optionally checking the returned word.
    Read {
        /// Address to read.
        addr: u32,
        /// Word the read must return.
        #[serde(default)]
        expect: Option<u32>,
    },
    /// Write `data` to `addr` on the lanes enabled by `strobe`.
    Write {
        /// Address to write.
        addr: u32,
        /// Word to write.
        data: u32,
        /// Byte-lane enables, all four lanes by default.
        #[serde(default = "full_strobe")]
        strobe: u8,
    },
    /// Drive nothing for `cycles` clock cycles.
    Idle {
        /// Number of rising edges to wait.
        cycles: u32,
    },
    /// Stop without reading a sentinel.
    Finish,
}

fn full_strobe() -> u8 {
    0xf
}

/// A read whose data did not match the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Index of the op in the script.
    pub op: usize,
    /// Address that was read.
    pub addr: u32,
    /// Word the script expected.
    pub expected: u32,
    /// Word the bus returned.
    pub actual: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for reset to be released.
    Reset,
    /// Working on `ops[index]`; `waited` counts idle cycles.
    Op { index: usize, waited: u32 },
    /// Reading a sentinel address; stays here until the driver halts.
    Sentinel,
    /// Stopped by a `Finish` op.
    Finished,
}

/// Scripted bus master.
#[derive(Debug, Clone)]
pub struct ScriptedMaster {
    pins: BusPins,
    ops: Vec<BusOp>,
    pass_addr: u32,
    fail_addr: u32,
    state: State,
    last_clock: bool,
    mismatch: Option<Mismatch>,
    completed: usize,
    finalized: bool,
}

impl ScriptedMaster {
    /// Creates a master that replays `ops`, then reads `pass_addr`; a failed
    /// read check sends it to `fail_addr` instead.
    pub fn new(ops: Vec<BusOp>, pass_addr: u32, fail_addr: u32) -> Self {
        Self {
            pins: BusPins::default(),
            ops,
            pass_addr,
            fail_addr,
            state: State::Reset,
            last_clock: false,
            mismatch: None,
            completed: 0,
            finalized: false,
        }
    }

    /// The first failed read check, if any.
    pub fn mismatch(&self) -> Option<Mismatch> {
        self.mismatch
    }

    /// Number of ops completed so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Returns `true` once [`Device::finalize`] has been called.
    pub fn finalized(&self) -> bool {
        self.finalized
    }

    fn idle_bus(&mut self) {
        self.pins.read_addr_valid = false;
        self.pins.write_addr_valid = false;
        self.pins.write_data_valid = false;
    }

    /// Drives the request for the current state.
    fn issue(&mut self) {
        self.idle_bus();
        match self.state {
            State::Op { index, .. } => match self.ops[index] {
                BusOp::Read { addr, .. } => {
                    self.pins.read_addr_valid = true;
                    self.pins.read_addr = addr;
                }
                BusOp::Write { addr, data, strobe } => {
                    self.pins.write_addr_valid = true;
                    self.pins.write_addr = addr;
                    self.pins.write_data_valid = true;
                    self.pins.write_data = data;
                    self.pins.write_strobe = strobe;
                }
                BusOp::Idle { .. } | BusOp::Finish => {}
            },
            State::Sentinel => {
                self.pins.read_addr_valid = true;
                self.pins.read_addr = if self.mismatch.is_some() {
                    self.fail_addr
                } else {
                    self.pass_addr
                };
            }
            State::Reset | State::Finished => {}
        }
    }

    /// Moves to op `index`, skipping to the sentinel past the end of the
    /// script. A `Finish` op takes effect immediately and a zero-cycle `Idle`
    /// completes without waiting.
    fn enter(&mut self, mut index: usize) {
        while let Some(BusOp::Idle { cycles: 0 }) = self.ops.get(index) {
            self.completed += 1;
            index += 1;
        }
        self.state = match self.ops.get(index) {
            None => State::Sentinel,
            Some(BusOp::Finish) => {
                debug!("scripted master finished at op {index}");
                State::Finished
            }
            Some(_) => State::Op { index, waited: 0 },
        };
    }

    fn advance(&mut self, index: usize) {
        self.completed += 1;
        self.enter(index + 1);
    }

    /// Handles one rising edge: consume the response to the outstanding
    /// request, then pick the next one.
    fn on_rising_edge(&mut self) {
        match self.state {
            State::Reset => self.enter(0),
            State::Op { index, waited } => match self.ops[index] {
                BusOp::Read { addr, expect } => {
                    if self.pins.read_data_valid {
                        let actual = self.pins.read_data;
                        match expect {
                            Some(expected) if expected != actual => {
                                debug!(
                                    "op {index}: read {addr:#010x} returned {actual:#010x}, \
                                     expected {expected:#010x}"
                                );
                                self.mismatch = Some(Mismatch {
                                    op: index,
                                    addr,
                                    expected,
                                    actual,
                                });
                                self.state = State::Sentinel;
                            }
                            _ => self.advance(index),
                        }
                    }
                }
                BusOp::Write { .. } => {
                    if self.pins.write_resp_valid {
                        self.advance(index);
                    }
                }
                BusOp::Idle { cycles } => {
                    if waited + 1 >= cycles {
                        self.advance(index);
                    } else {
                        self.state = State::Op {
                            index,
                            waited: waited + 1,
                        };
                    }
                }
                BusOp::Finish => self.state = State::Finished,
            },
            State::Sentinel | State::Finished => {}
        }
        self.issue();
    }
}

impl Device for ScriptedMaster {
    fn pins(&self) -> &BusPins {
        &self.pins
    }

    fn pins_mut(&mut self) -> &mut BusPins {
        &mut self.pins
    }

    fn evaluate(&mut self) {
        let rising = self.pins.clock && !self.last_clock;
        self.last_clock = self.pins.clock;

        if self.pins.reset {
            self.state = State::Reset;
            self.idle_bus();
            return;
        }
        if rising {
            self.on_rising_edge();
        }
    }

    fn finished(&self) -> bool {
        self.state == State::Finished
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}
