//! Zero-wait-state bus slave backed by a [`SparseMemory`].
//!
//! [`BusResponder::respond`] runs once per rising clock edge. It clears last
//! cycle's response flags, then completes at most one read and one write
//! against memory, asserting ready/valid in the same cycle the request is
//! seen.

use log::{trace, warn};
use serde::Serialize;

use crate::device::BusPins;
use crate::error::MemoryError;
use crate::memory::{align_word, merge_bytes, SparseMemory};

/// Which bus channel a boundary violation happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Read address/data channel.
    Read,
    /// Write address/data/response channels.
    Write,
}

/// A bus access the memory refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryViolation {
    /// Tick of the rising edge on which the access was attempted.
    pub tick: u64,
    /// Channel the access arrived on.
    pub channel: Channel,
    /// The aligned address that was rejected.
    pub addr: u32,
    /// Human-readable reason.
    pub reason: String,
}

/// Handshake counters accumulated over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Completed read handshakes.
    pub reads: u64,
    /// Completed write handshakes.
    pub writes: u64,
    /// Accesses that fell outside the memory.
    pub violations: Vec<BoundaryViolation>,
}

/// Bus slave servicing a device's memory requests.
#[derive(Debug, Default)]
pub struct BusResponder {
    stats: BusStats,
}

impl BusResponder {
    /// Creates a responder with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters so far.
    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    /// Services one rising edge.
    ///
    /// A refused read still completes the handshake and returns the memory's
    /// default word; a refused write completes without touching memory. Both
    /// are recorded as [`BoundaryViolation`]s.
    pub fn respond(&mut self, tick: u64, pins: &mut BusPins, memory: &mut SparseMemory) {
        pins.clear_responses();

        if pins.read_addr_valid {
            let addr = align_word(pins.read_addr);
            let data = match memory.load(addr) {
                Ok(word) => word,
                Err(e) => {
                    self.violation(tick, Channel::Read, addr, e);
                    memory.default_word()
                }
            };
            trace!("tick {tick}: read  [{addr:#010x}] -> {data:#010x}");
            pins.read_addr_ready = true;
            pins.read_data_valid = true;
            pins.read_data = data;
            self.stats.reads += 1;
        }

        if pins.write_addr_valid && pins.write_data_valid {
            let addr = align_word(pins.write_addr);
            let strobe = pins.write_strobe;
            let result = memory
                .load(addr)
                .and_then(|old| memory.store(addr, merge_bytes(old, pins.write_data, strobe)));
            match result {
                Ok(()) => trace!(
                    "tick {tick}: write [{addr:#010x}] <- {:#010x} strobe {strobe:04b}",
                    pins.write_data
                ),
                Err(e) => self.violation(tick, Channel::Write, addr, e),
            }
            pins.write_addr_ready = true;
            pins.write_data_ready = true;
            pins.write_resp_valid = true;
            self.stats.writes += 1;
        }
    }

    fn violation(&mut self, tick: u64, channel: Channel, addr: u32, err: MemoryError) {
        warn!("tick {tick}: {channel:?} access refused: {err}");
        self.stats.violations.push(BoundaryViolation {
            tick,
            channel,
            addr,
            reason: err.to_string(),
        });
    }
}
