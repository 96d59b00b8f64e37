//! Memory image preloading.
//!
//! An image is plain text with one hexadecimal 32-bit word per line. Words
//! are stored at consecutive word addresses starting from a base offset.
//! Blank lines are skipped and an optional `0x` prefix is accepted; anything
//! else that is not a hex word rejects the whole image.

use std::path::Path;

use log::debug;

use crate::error::PreloadError;
use crate::memory::{SparseMemory, WORD_MASK};

/// A decoded image word and the line it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageWord {
    /// One-based source line number.
    pub line: usize,
    /// The word value.
    pub word: u32,
}

/// Decodes an image into words, without touching memory.
pub fn parse_image(text: &str) -> Result<Vec<ImageWord>, PreloadError> {
    let mut words = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let malformed = || PreloadError::Malformed {
            line,
            text: trimmed.to_string(),
        };
        if digits.is_empty() || digits.len() > 8 || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(malformed());
        }
        let word = u32::from_str_radix(digits, 16).map_err(|_| malformed())?;
        words.push(ImageWord { line, word });
    }
    Ok(words)
}

/// Loads an image held in a string into `memory` starting at `offset`.
///
/// Returns the number of words stored. Nothing is stored unless the whole
/// image is valid and fits.
pub fn preload_str(
    memory: &mut SparseMemory,
    text: &str,
    offset: u32,
) -> Result<usize, PreloadError> {
    if offset & !WORD_MASK != 0 {
        return Err(PreloadError::UnalignedOffset { offset });
    }
    let words = parse_image(text)?;

    let mut placed = Vec::with_capacity(words.len());
    for (slot, image_word) in words.iter().enumerate() {
        let addr = u32::try_from(slot)
            .ok()
            .and_then(|slot| slot.checked_mul(4))
            .and_then(|delta| offset.checked_add(delta))
            .ok_or(PreloadError::Overflow {
                line: image_word.line,
            })?;
        if !memory.contains(addr) {
            let (lo, hi) = memory.range();
            return Err(PreloadError::Memory {
                line: image_word.line,
                source: crate::error::MemoryError::OutOfRange { addr, lo, hi },
            });
        }
        placed.push((addr, image_word));
    }

    for (addr, image_word) in &placed {
        memory
            .store(*addr, image_word.word)
            .map_err(|source| PreloadError::Memory {
                line: image_word.line,
                source,
            })?;
    }
    debug!("preloaded {} words at {offset:#010x}", placed.len());
    Ok(placed.len())
}

/// Reads the image file at `path` and loads it into `memory` at `offset`.
pub fn preload_file(
    memory: &mut SparseMemory,
    path: &Path,
    offset: u32,
) -> Result<usize, PreloadError> {
    let text = std::fs::read_to_string(path).map_err(|source| PreloadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    preload_str(memory, &text, offset)
}
