//! Configuration types deserialized from `cyclebench.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Default number of ticks before a run times out.
pub const DEFAULT_TIMEOUT_TICKS: u64 = 10_000;
/// Default number of ticks between clock inversions.
pub const DEFAULT_HALF_PERIOD: u64 = 10;
/// Default last tick of the reset hold.
pub const DEFAULT_RESET_TICKS: u64 = 40;

/// The top-level run configuration parsed from `cyclebench.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Sentinels, timeout and clocking.
    #[serde(default)]
    pub run: RunSection,
    /// Memory range, default word and preload image.
    #[serde(default)]
    pub memory: MemorySection,
    /// Waveform trace output.
    #[serde(default)]
    pub trace: TraceSection,
    /// Coverage database output.
    #[serde(default)]
    pub coverage: CoverageSection,
    /// Transactions replayed by the scripted device.
    #[serde(default)]
    pub script: Vec<ScriptOp>,
    /// Regression tests run by `cyclebench regress`.
    #[serde(default)]
    pub test: Vec<TestEntry>,
}

/// The `[run]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Reading this address ends the run with a pass. Required.
    #[serde(default, deserialize_with = "deserialize_opt_word")]
    pub pass_addr: Option<u32>,
    /// Reading this address ends the run with a fail. Required.
    #[serde(default, deserialize_with = "deserialize_opt_word")]
    pub fail_addr: Option<u32>,
    /// Tick count at which the run times out.
    #[serde(default = "default_timeout_ticks")]
    pub timeout_ticks: u64,
    /// Ticks between clock inversions.
    #[serde(default = "default_half_period")]
    pub half_period: u64,
    /// Reset is held through this tick.
    #[serde(default = "default_reset_ticks")]
    pub reset_ticks: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            pass_addr: None,
            fail_addr: None,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            half_period: DEFAULT_HALF_PERIOD,
            reset_ticks: DEFAULT_RESET_TICKS,
        }
    }
}

fn default_timeout_ticks() -> u64 {
    DEFAULT_TIMEOUT_TICKS
}

fn default_half_period() -> u64 {
    DEFAULT_HALF_PERIOD
}

fn default_reset_ticks() -> u64 {
    DEFAULT_RESET_TICKS
}

/// The `[memory]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySection {
    /// Lowest mapped address.
    #[serde(default, deserialize_with = "deserialize_word")]
    pub lo: u32,
    /// Highest mapped address, inclusive.
    #[serde(default = "default_hi", deserialize_with = "deserialize_word")]
    pub hi: u32,
    /// Word returned for locations never written.
    #[serde(default, deserialize_with = "deserialize_word")]
    pub default: u32,
    /// Hex image preloaded before the run.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Address of the first image word.
    #[serde(default, deserialize_with = "deserialize_word")]
    pub offset: u32,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            lo: 0,
            hi: u32::MAX,
            default: 0,
            image: None,
            offset: 0,
        }
    }
}

fn default_hi() -> u32 {
    u32::MAX
}

/// The `[trace]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceSection {
    /// Record a waveform trace.
    #[serde(default)]
    pub enabled: bool,
    /// Trace file path.
    #[serde(default = "default_trace_path")]
    pub path: PathBuf,
    /// Gzip the trace file.
    #[serde(default)]
    pub compress: bool,
    /// Timescale written to the trace header.
    #[serde(default = "default_timescale")]
    pub timescale: String,
}

impl Default for TraceSection {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_trace_path(),
            compress: false,
            timescale: default_timescale(),
        }
    }
}

fn default_trace_path() -> PathBuf {
    PathBuf::from("waves.vcd")
}

fn default_timescale() -> String {
    "1ns".to_string()
}

/// The `[coverage]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageSection {
    /// Where to write the coverage database. Coverage is off if unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// One `[[script]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ScriptOp {
    /// Read a word, optionally checking its value.
    Read {
        /// Address to read.
        #[serde(deserialize_with = "deserialize_word")]
        addr: u32,
        /// Expected word.
        #[serde(default, deserialize_with = "deserialize_opt_word")]
        expect: Option<u32>,
    },
    /// Write a word.
    Write {
        /// Address to write.
        #[serde(deserialize_with = "deserialize_word")]
        addr: u32,
        /// Word to write.
        #[serde(deserialize_with = "deserialize_word")]
        data: u32,
        /// Byte-lane enables.
        #[serde(default = "default_strobe")]
        strobe: u8,
    },
    /// Wait for a number of clock cycles.
    Idle {
        /// Cycles to wait.
        cycles: u32,
    },
    /// Stop without a verdict.
    Finish,
}

fn default_strobe() -> u8 {
    0xf
}

/// One `[[test]]` entry: a memory image run as a self-checking test.
///
/// Anything left unset falls back to the `[run]`, `[memory]` and `[[script]]`
/// settings. Sentinels can also come from the `<pass>:` and `<fail>:` labels
/// of a disassembly listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestEntry {
    /// Name shown in the summary; defaults to the image file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Hex image preloaded before the test.
    pub image: PathBuf,
    /// Disassembly listing to take sentinel labels from.
    #[serde(default)]
    pub disassembly: Option<PathBuf>,
    /// Pass sentinel for this test.
    #[serde(default, deserialize_with = "deserialize_opt_word")]
    pub pass_addr: Option<u32>,
    /// Fail sentinel for this test.
    #[serde(default, deserialize_with = "deserialize_opt_word")]
    pub fail_addr: Option<u32>,
    /// Address of the first image word.
    #[serde(default, deserialize_with = "deserialize_opt_word")]
    pub offset: Option<u32>,
    /// Tick count at which this test times out.
    #[serde(default)]
    pub timeout_ticks: Option<u64>,
    /// Transactions for this test, replacing the top-level `[[script]]`.
    #[serde(default)]
    pub script: Option<Vec<ScriptOp>>,
}

impl TestEntry {
    /// Name shown for this test: `name`, or else the image file stem.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .image
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.image.display().to_string()),
        }
    }
}

/// Parses a 32-bit hexadecimal word with an optional `0x` prefix and `_`
/// separators.
pub fn parse_hex_u32(text: &str) -> Result<u32, String> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .replace('_', "");
    if digits.is_empty() {
        return Err(format!("'{text}' is not a hexadecimal word"));
    }
    u32::from_str_radix(&digits, 16)
        .map_err(|e| format!("'{text}' is not a 32-bit hexadecimal word: {e}"))
}

/// Accepts a 32-bit word as a TOML integer or as a hex string.
fn deserialize_word<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    struct WordVisitor;

    impl<'de> Visitor<'de> for WordVisitor {
        type Value = u32;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a 32-bit unsigned integer or a hexadecimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u32::try_from(v).map_err(|_| E::custom(format!("{v} does not fit in 32 bits")))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            u32::try_from(v).map_err(|_| E::custom(format!("{v} does not fit in 32 bits")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_hex_u32(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(WordVisitor)
}

fn deserialize_opt_word<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_word(deserializer).map(Some)
}
