//! Pass/fail detection by watching the read address channel.

use log::info;
use serde::Serialize;

use crate::device::BusPins;

/// The verdict a sentinel read delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The device read the pass address.
    Pass,
    /// The device read the fail address.
    Fail,
}

/// Watches for reads of two sentinel addresses.
///
/// The first sentinel hit is latched; later traffic is ignored.
#[derive(Debug, Clone)]
pub struct SentinelMonitor {
    pass_addr: u32,
    fail_addr: u32,
    verdict: Option<Verdict>,
}

impl SentinelMonitor {
    /// Creates a monitor. The two addresses are expected to differ.
    pub fn new(pass_addr: u32, fail_addr: u32) -> Self {
        debug_assert_ne!(pass_addr, fail_addr, "pass and fail sentinels coincide");
        Self {
            pass_addr,
            fail_addr,
            verdict: None,
        }
    }

    /// The latched verdict, if any.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Inspects the read request on a rising edge. Returns the verdict the
    /// first time a sentinel is seen, `None` otherwise.
    pub fn observe(&mut self, tick: u64, pins: &BusPins) -> Option<Verdict> {
        if self.verdict.is_some() || !pins.read_addr_valid {
            return None;
        }
        let verdict = if pins.read_addr == self.pass_addr {
            Verdict::Pass
        } else if pins.read_addr == self.fail_addr {
            Verdict::Fail
        } else {
            return None;
        };
        info!("tick {tick}: sentinel {:#010x} read, verdict {verdict:?}", pins.read_addr);
        self.verdict = Some(verdict);
        self.verdict
    }
}
