//! Toggle coverage of the bus pins.
//!
//! [`CoverageSink`] is the teardown-time coverage hook. [`ToggleCoverage`]
//! counts bit transitions per pin and handshakes per channel and writes them
//! as a JSON database.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::device::{BusPins, PIN_COUNT, PIN_LAYOUT};
use crate::error::SimError;

/// Position of `clock` in [`BusPins::values`].
const CLOCK: usize = 1;
/// Position of `read_data_valid` in [`BusPins::values`].
const READ_DATA_VALID: usize = 5;
/// Position of `write_resp_valid` in [`BusPins::values`].
const WRITE_RESP_VALID: usize = 14;

/// Collects coverage while the run is going and writes it at teardown.
pub trait CoverageSink {
    /// Observes the pins after the device evaluated `tick`.
    fn sample(&mut self, _tick: u64, _pins: &BusPins) {}

    /// Writes the coverage database to `path`. Called once at teardown.
    fn write(&mut self, path: &Path) -> Result<(), SimError>;
}

/// Per-pin toggle counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinToggles {
    /// Pin name.
    pub name: String,
    /// Pin width in bits.
    pub width: u32,
    /// Number of 0→1 bit transitions, summed over all bits.
    pub rises: u64,
    /// Number of 1→0 bit transitions, summed over all bits.
    pub falls: u64,
    /// Number of bits that have toggled in both directions.
    pub bits_covered: u32,
}

/// The JSON document written by [`ToggleCoverage`].
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    /// Number of pin samples observed.
    pub samples: u64,
    /// Completed read handshakes seen on the pins.
    pub read_handshakes: u64,
    /// Completed write handshakes seen on the pins.
    pub write_handshakes: u64,
    /// Fraction of all pin bits that toggled in both directions.
    pub toggle_coverage: f64,
    /// Per-pin detail, in pin declaration order.
    pub pins: Vec<PinToggles>,
}

/// Bit-level toggle coverage over every pin in [`PIN_LAYOUT`].
#[derive(Debug, Clone, Default)]
pub struct ToggleCoverage {
    samples: u64,
    read_handshakes: u64,
    write_handshakes: u64,
    last: Option<[u32; PIN_COUNT]>,
    rose: [u32; PIN_COUNT],
    fell: [u32; PIN_COUNT],
    rises: [u64; PIN_COUNT],
    falls: [u64; PIN_COUNT],
}

impl ToggleCoverage {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes what has been collected so far.
    pub fn report(&self) -> CoverageReport {
        let mut total_bits = 0u32;
        let mut covered_bits = 0u32;
        let pins = PIN_LAYOUT
            .iter()
            .enumerate()
            .map(|(i, (name, width))| {
                let bits_covered = (self.rose[i] & self.fell[i]).count_ones();
                total_bits += width;
                covered_bits += bits_covered;
                PinToggles {
                    name: name.to_string(),
                    width: *width,
                    rises: self.rises[i],
                    falls: self.falls[i],
                    bits_covered,
                }
            })
            .collect();
        CoverageReport {
            samples: self.samples,
            read_handshakes: self.read_handshakes,
            write_handshakes: self.write_handshakes,
            toggle_coverage: f64::from(covered_bits) / f64::from(total_bits),
            pins,
        }
    }
}

impl CoverageSink for ToggleCoverage {
    fn sample(&mut self, _tick: u64, pins: &BusPins) {
        let values = pins.values();
        if let Some(last) = self.last {
            for i in 0..PIN_COUNT {
                let rose = !last[i] & values[i];
                let fell = last[i] & !values[i];
                self.rose[i] |= rose;
                self.fell[i] |= fell;
                self.rises[i] += u64::from(rose.count_ones());
                self.falls[i] += u64::from(fell.count_ones());
            }
            // Response flags are re-driven on every rising edge; one high on
            // a rising edge is one handshake, even if it never dropped.
            if last[CLOCK] == 0 && values[CLOCK] != 0 {
                if values[READ_DATA_VALID] != 0 {
                    self.read_handshakes += 1;
                }
                if values[WRITE_RESP_VALID] != 0 {
                    self.write_handshakes += 1;
                }
            }
        }
        self.last = Some(values);
        self.samples += 1;
    }

    fn write(&mut self, path: &Path) -> Result<(), SimError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.report())?;
        writer.flush()?;
        Ok(())
    }
}
