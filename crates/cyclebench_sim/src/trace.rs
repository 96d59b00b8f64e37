//! Per-tick waveform tracing of the bus pins.
//!
//! The [`TraceSink`] trait abstracts trace output. [`VcdTrace`] writes the
//! IEEE 1364 Value Change Dump format, viewable in GTKWave, Surfer, or any
//! other waveform viewer, optionally gzip-compressed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::device::{BusPins, PIN_COUNT, PIN_LAYOUT};
use crate::error::SimError;

/// Receives one sample of the bus pins per tick.
pub trait TraceSink {
    /// Records the pin values after the device evaluated `tick`.
    fn sample(&mut self, tick: u64, pins: &BusPins) -> Result<(), SimError>;

    /// Flushes and closes the trace. Called once at teardown.
    fn close(&mut self) -> Result<(), SimError>;
}

/// A trace output file, plain or gzip-compressed.
///
/// Flushing a compressed file finishes the gzip stream, so it must be the
/// last operation on it.
pub enum TraceFile {
    /// Uncompressed VCD text.
    Plain(BufWriter<File>),
    /// Gzip-compressed VCD text.
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for TraceFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TraceFile::Plain(w) => w.write(buf),
            TraceFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TraceFile::Plain(w) => w.flush(),
            TraceFile::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

/// VCD writer for the [`BusPins`] bundle.
///
/// Every pin is declared under a single `dut` scope. Only pins whose value
/// changed since the previous sample are emitted.
pub struct VcdTrace<W: Write> {
    writer: W,
    timescale: String,
    header_written: bool,
    last: Option<[u32; PIN_COUNT]>,
}

impl VcdTrace<TraceFile> {
    /// Creates a trace file at `path`, gzip-compressed if `compress` is set.
    pub fn create(path: &Path, compress: bool, timescale: &str) -> Result<Self, SimError> {
        let file = BufWriter::new(File::create(path)?);
        let writer = if compress {
            TraceFile::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            TraceFile::Plain(file)
        };
        Ok(Self::new(writer, timescale))
    }
}

impl<W: Write> VcdTrace<W> {
    /// Creates a trace writing to the given output.
    pub fn new(writer: W, timescale: &str) -> Self {
        Self {
            writer,
            timescale: timescale.to_string(),
            header_written: false,
            last: None,
        }
    }

    /// Consumes the trace, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Generates a VCD identifier code from a sequential index.
    ///
    /// Uses printable ASCII characters starting from `!` (0x21).
    fn id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn format_value(value: u32, width: u32) -> String {
        if width == 1 {
            let bit = if value & 1 == 1 { "1" } else { "0" };
            bit.to_string()
        } else {
            format!("b{value:0w$b}", w = width as usize)
        }
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Simulation date")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  cyclebench")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$scope module dut $end")?;
        for (index, (name, width)) in PIN_LAYOUT.iter().enumerate() {
            let code = Self::id_code(index);
            writeln!(self.writer, "$var wire {width} {code} {name} $end")?;
        }
        writeln!(self.writer, "$upscope $end")?;
        writeln!(self.writer, "$enddefinitions $end")?;
        self.header_written = true;
        Ok(())
    }

    fn write_value(&mut self, index: usize, value: u32) -> Result<(), SimError> {
        let width = PIN_LAYOUT[index].1;
        let code = Self::id_code(index);
        let text = Self::format_value(value, width);
        if width == 1 {
            writeln!(self.writer, "{text}{code}")?;
        } else {
            writeln!(self.writer, "{text} {code}")?;
        }
        Ok(())
    }
}

impl<W: Write> TraceSink for VcdTrace<W> {
    fn sample(&mut self, tick: u64, pins: &BusPins) -> Result<(), SimError> {
        if !self.header_written {
            self.write_header()?;
        }
        let values = pins.values();
        match self.last {
            None => {
                writeln!(self.writer, "#{tick}")?;
                writeln!(self.writer, "$dumpvars")?;
                for (index, &value) in values.iter().enumerate() {
                    self.write_value(index, value)?;
                }
                writeln!(self.writer, "$end")?;
            }
            Some(last) if last != values => {
                writeln!(self.writer, "#{tick}")?;
                for (index, &value) in values.iter().enumerate() {
                    if last[index] != value {
                        self.write_value(index, value)?;
                    }
                }
            }
            Some(_) => {}
        }
        self.last = Some(values);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SimError> {
        if !self.header_written {
            self.write_header()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
