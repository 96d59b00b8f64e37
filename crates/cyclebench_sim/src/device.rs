//! The pin-level contract between the harness and a device under test.
//!
//! The driver never looks inside a device. It drives `reset` and `clock`,
//! reads the request pins, drives the response pins and calls
//! [`Device::evaluate`] once per tick. Anything exposing this shape can be
//! simulated: a generated netlist wrapper, a behavioural model, or the
//! [`ScriptedMaster`](crate::scripted::ScriptedMaster) shipped with this crate.

use serde::{Deserialize, Serialize};

/// Names and bit widths of every pin in a [`BusPins`] bundle, in the order
/// returned by [`BusPins::values`].
pub const PIN_LAYOUT: [(&str, u32); 15] = [
    ("reset", 1),
    ("clock", 1),
    ("read_addr_valid", 1),
    ("read_addr", 32),
    ("read_addr_ready", 1),
    ("read_data_valid", 1),
    ("read_data", 32),
    ("write_addr_valid", 1),
    ("write_addr", 32),
    ("write_addr_ready", 1),
    ("write_data_valid", 1),
    ("write_data", 32),
    ("write_strobe", 4),
    ("write_data_ready", 1),
    ("write_resp_valid", 1),
];

/// Number of pins in a [`BusPins`] bundle.
pub const PIN_COUNT: usize = PIN_LAYOUT.len();

/// The signal bundle shared between the driver and a device.
///
/// `reset` is active high: `true` holds the device in reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusPins {
    /// Reset input, asserted while the driver is in the reset phase.
    pub reset: bool,
    /// Clock input.
    pub clock: bool,

    /// Device requests a read of `read_addr`.
    pub read_addr_valid: bool,
    /// Read request address.
    pub read_addr: u32,
    /// Driver accepted the read address.
    pub read_addr_ready: bool,
    /// `read_data` holds the response to the accepted read.
    pub read_data_valid: bool,
    /// Read response word.
    pub read_data: u32,

    /// Device requests a write to `write_addr`.
    pub write_addr_valid: bool,
    /// Write request address.
    pub write_addr: u32,
    /// Driver accepted the write address.
    pub write_addr_ready: bool,
    /// `write_data` and `write_strobe` are valid.
    pub write_data_valid: bool,
    /// Write data word.
    pub write_data: u32,
    /// Byte-lane write enables; bit `n` enables byte `n`.
    pub write_strobe: u8,
    /// Driver accepted the write data.
    pub write_data_ready: bool,
    /// The write has completed.
    pub write_resp_valid: bool,
}

impl BusPins {
    /// Returns every pin value widened to `u32`, ordered as [`PIN_LAYOUT`].
    pub fn values(&self) -> [u32; PIN_COUNT] {
        [
            self.reset as u32,
            self.clock as u32,
            self.read_addr_valid as u32,
            self.read_addr,
            self.read_addr_ready as u32,
            self.read_data_valid as u32,
            self.read_data,
            self.write_addr_valid as u32,
            self.write_addr,
            self.write_addr_ready as u32,
            self.write_data_valid as u32,
            self.write_data,
            (self.write_strobe & 0xf) as u32,
            self.write_data_ready as u32,
            self.write_resp_valid as u32,
        ]
    }

    /// Deasserts every driver-side response flag.
    pub fn clear_responses(&mut self) {
        self.read_addr_ready = false;
        self.read_data_valid = false;
        self.write_addr_ready = false;
        self.write_data_ready = false;
        self.write_resp_valid = false;
    }
}

/// A synchronous design the driver can clock.
///
/// Implementations own their [`BusPins`]; the driver writes the input pins
/// through [`pins_mut`](Self::pins_mut) and then calls
/// [`evaluate`](Self::evaluate), which must update the output pins.
pub trait Device {
    /// The current pin values.
    fn pins(&self) -> &BusPins;

    /// Mutable access to the pins, used by the driver to drive inputs.
    fn pins_mut(&mut self) -> &mut BusPins;

    /// Advances the device's logic one evaluation step.
    fn evaluate(&mut self);

    /// Returns `true` once the device has stopped on its own.
    fn finished(&self) -> bool {
        false
    }

    /// Called exactly once when the run ends.
    fn finalize(&mut self) {}
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn pins(&self) -> &BusPins {
        (**self).pins()
    }

    fn pins_mut(&mut self) -> &mut BusPins {
        (**self).pins_mut()
    }

    fn evaluate(&mut self) {
        (**self).evaluate()
    }

    fn finished(&self) -> bool {
        (**self).finished()
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }
}
