//! Error types for the harness.
//!
//! [`MemoryError`] is the boundary-violation result of the address-mapped
//! memory, [`PreloadError`] covers memory image loading, and [`SimError`]
//! covers driver setup and sink I/O.

use std::io;
use std::path::PathBuf;

/// A load or store that falls outside what the memory maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The address is outside the inclusive `[lo, hi]` range.
    #[error("address {addr:#010x} is not in the mapped range <{lo:#010x}, {hi:#010x}>")]
    OutOfRange {
        /// The offending address.
        addr: u32,
        /// Bottom of the mapped range.
        lo: u32,
        /// Top of the mapped range (inclusive).
        hi: u32,
    },

    /// The address has one of its two low bits set.
    #[error("address {addr:#010x} is not word aligned")]
    Unaligned {
        /// The offending address.
        addr: u32,
    },
}

/// Errors raised while preloading a memory image.
#[derive(Debug, thiserror::Error)]
pub enum PreloadError {
    /// The image file could not be read.
    #[error("failed to read memory image {}: {source}", path.display())]
    Io {
        /// Path of the image file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A line is not a hexadecimal 32-bit word.
    #[error("line {line}: malformed memory word '{text}'")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },

    /// The base offset is not word aligned.
    #[error("preload offset {offset:#010x} is not word aligned")]
    UnalignedOffset {
        /// The configured base offset.
        offset: u32,
    },

    /// A word landed outside the memory.
    #[error("line {line}: {source}")]
    Memory {
        /// One-based line number.
        line: usize,
        /// The rejected store.
        source: MemoryError,
    },

    /// The image runs past the end of the 32-bit address space.
    #[error("line {line}: image extends past address 0xffffffff")]
    Overflow {
        /// One-based line number of the first word that does not fit.
        line: usize,
    },
}

/// Errors that can occur during driver setup or while writing sink output.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The run configuration was rejected before the loop started.
    #[error("invalid run configuration: {reason}")]
    InvalidConfig {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// The memory image could not be loaded.
    #[error(transparent)]
    Preload(#[from] PreloadError),

    /// A trace or coverage sink failed to write.
    #[error("sink I/O error: {0}")]
    Io(#[from] io::Error),

    /// The coverage database could not be serialized.
    #[error("coverage serialization error: {0}")]
    Coverage(#[from] serde_json::Error),
}

impl SimError {
    /// Shorthand for an [`InvalidConfig`](SimError::InvalidConfig) error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let e = MemoryError::OutOfRange {
            addr: 0x2000,
            lo: 0,
            hi: 0xfff,
        };
        assert_eq!(
            e.to_string(),
            "address 0x00002000 is not in the mapped range <0x00000000, 0x00000fff>"
        );
    }

    #[test]
    fn unaligned_display() {
        let e = MemoryError::Unaligned { addr: 0x1002 };
        assert_eq!(e.to_string(), "address 0x00001002 is not word aligned");
    }

    #[test]
    fn malformed_display() {
        let e = PreloadError::Malformed {
            line: 3,
            text: "zzzz".into(),
        };
        assert_eq!(e.to_string(), "line 3: malformed memory word 'zzzz'");
    }

    #[test]
    fn preload_memory_display() {
        let e = PreloadError::Memory {
            line: 7,
            source: MemoryError::Unaligned { addr: 2 },
        };
        assert_eq!(e.to_string(), "line 7: address 0x00000002 is not word aligned");
    }

    #[test]
    fn preload_io_display() {
        let e = PreloadError::Io {
            path: PathBuf::from("mem.hex"),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        };
        assert!(e.to_string().starts_with("failed to read memory image mem.hex"));
    }

    #[test]
    fn invalid_config_display() {
        let e = SimError::invalid_config("half period must be non-zero");
        assert_eq!(
            e.to_string(),
            "invalid run configuration: half period must be non-zero"
        );
    }

    #[test]
    fn preload_is_transparent() {
        let e = SimError::from(PreloadError::UnalignedOffset { offset: 0x1001 });
        assert_eq!(e.to_string(), "preload offset 0x00001001 is not word aligned");
    }

    #[test]
    fn io_display() {
        let e = SimError::Io(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(e.to_string().contains("sink I/O error"));
    }
}
