//! Sparse word-addressed memory covering one contiguous address range.
//!
//! [`SparseMemory`] only allocates the words a test actually touches, so the
//! mapped range may span the whole 32-bit address space. Reads of words that
//! were never written return a configurable default.

use std::collections::HashMap;

use crate::error::MemoryError;

/// Mask that clears the two low address bits.
pub const WORD_MASK: u32 = !0b11;

/// Rounds an address down to the word containing it.
pub fn align_word(addr: u32) -> u32 {
    addr & WORD_MASK
}

/// Expands a 4-bit byte-lane strobe into a 32-bit mask.
///
/// Strobe bit `n` selects byte `n` (bits `8n..8n+8`) of the word.
pub fn strobe_mask(strobe: u8) -> u32 {
    (0..4u32).fold(0u32, |mask, lane| {
        if strobe & (1 << lane) != 0 {
            mask | (0xff << (lane * 8))
        } else {
            mask
        }
    })
}

/// Merges `new` into `old` on the byte lanes selected by `strobe`.
pub fn merge_bytes(old: u32, new: u32, strobe: u8) -> u32 {
    let mask = strobe_mask(strobe);
    (new & mask) | (old & !mask)
}

/// Word store over the inclusive address range `[lo, hi]`.
///
/// Every key in the backing map is word aligned and inside the range;
/// [`load`](Self::load) and [`store`](Self::store) reject anything else with a
/// [`MemoryError`] and leave the contents untouched.
#[derive(Debug, Clone)]
pub struct SparseMemory {
    words: HashMap<u32, u32>,
    lo: u32,
    hi: u32,
    default_word: u32,
}

impl SparseMemory {
    /// Creates an empty memory mapping `[lo, hi]`.
    ///
    /// With `lo > hi` nothing is mapped; [`SimDriver::new`](crate::SimDriver::new)
    /// refuses such a memory.
    pub fn new(lo: u32, hi: u32, default_word: u32) -> Self {
        Self {
            words: HashMap::new(),
            lo,
            hi,
            default_word,
        }
    }

    /// Creates a memory covering the entire 32-bit address space.
    pub fn full_range(default_word: u32) -> Self {
        Self::new(0, u32::MAX, default_word)
    }

    /// Returns the inclusive `(lo, hi)` range.
    pub fn range(&self) -> (u32, u32) {
        (self.lo, self.hi)
    }

    /// Returns the word reported for never-written addresses.
    pub fn default_word(&self) -> u32 {
        self.default_word
    }

    /// Returns `true` if `addr` lies within the mapped range.
    pub fn contains(&self, addr: u32) -> bool {
        self.lo <= addr && addr <= self.hi
    }

    /// Number of words that have been written.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if no word has been written yet.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn check(&self, addr: u32) -> Result<(), MemoryError> {
        if addr & !WORD_MASK != 0 {
            return Err(MemoryError::Unaligned { addr });
        }
        if !self.contains(addr) {
            return Err(MemoryError::OutOfRange {
                addr,
                lo: self.lo,
                hi: self.hi,
            });
        }
        Ok(())
    }

    /// Loads the word at `addr`, or the default word if it was never written.
    pub fn load(&self, addr: u32) -> Result<u32, MemoryError> {
        self.check(addr)?;
        Ok(self
            .words
            .get(&addr)
            .copied()
            .unwrap_or(self.default_word))
    }

    /// Stores `word` at `addr`, replacing any previous value.
    pub fn store(&mut self, addr: u32, word: u32) -> Result<(), MemoryError> {
        self.check(addr)?;
        self.words.insert(addr, word);
        Ok(())
    }
}
