//! Backing storage of the managed memory block.
//!
//! An [`Arena`] owns a zero-filled byte buffer of `word_size * word_count`
//! bytes. Its base address and size never change while it is alive; the
//! [`MemoryManager`](crate::MemoryManager) drops the whole arena and builds a
//! new one on re-initialization.
//!
//! # Address mapping
//!
//! ```text
//!  base                                              base + word_count * word_size
//!  │                                                 │
//!  ▼                                                 ▼
//!  ┌───────────┬───────────┬───────────┬─────┬───────┐
//!  │  word 0   │  word 1   │  word 2   │ ... │ w(n-1)│
//!  └───────────┴───────────┴───────────┴─────┴───────┘
//!  ◄─word_size─►
//! ```
//!
//! Offsets handed around by the ledger and the placement policies are word
//! indices. Only the facade converts them to and from byte addresses.

use alloc::{boxed::Box, vec};

use snafu::{OptionExt as _, Snafu, ensure};

use crate::Location;

/// Largest number of words an arena may hold.
///
/// Offsets and lengths travel through the wire views as 16-bit values, so the
/// arena can never address more than `u16::MAX` words.
pub const MAX_WORD_COUNT: usize = u16::MAX as usize;

/// Errors that can occur while creating an arena.
#[derive(Debug, Snafu)]
pub enum InitError {
    #[snafu(display(
        "arena of {word_count} words exceeds the 16-bit limit of {MAX_WORD_COUNT} words"
    ))]
    ArenaTooLarge {
        word_count: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("arena of {word_count} words of {word_size} bytes overflows usize"))]
    SizeOverflow {
        word_size: usize,
        word_count: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// A contiguous, word-addressed block of memory.
#[derive(Debug)]
pub struct Arena {
    storage: Box<[u8]>,
    word_size: usize,
    word_count: usize,
}

impl Arena {
    /// Allocates zero-filled storage for `word_count` words of `word_size`
    /// bytes each.
    ///
    /// # Panics
    ///
    /// Panics if `word_size` is zero.
    pub fn new(word_size: usize, word_count: usize) -> Result<Self, InitError> {
        assert!(word_size > 0, "Word size must be greater than zero");
        ensure!(
            word_count <= MAX_WORD_COUNT,
            ArenaTooLargeSnafu { word_count }
        );
        let byte_len = word_size.checked_mul(word_count).context(SizeOverflowSnafu {
            word_size,
            word_count,
        })?;
        Ok(Self {
            storage: vec![0; byte_len].into_boxed_slice(),
            word_size,
            word_count,
        })
    }

    #[must_use]
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Returns the size of the arena in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.storage.len()
    }

    /// Returns the address of the first byte of the arena.
    #[must_use]
    pub fn base(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// Returns a pointer to the first byte of the word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not a word index inside the arena.
    pub fn address_of(&mut self, offset: usize) -> *mut u8 {
        assert!(
            offset < self.word_count,
            "Word offset {offset} is out of arena bounds ({} words)",
            self.word_count
        );
        self.storage[offset * self.word_size..].as_mut_ptr()
    }

    /// Maps a byte address back to the index of the word starting there.
    ///
    /// Returns `None` if the address lies outside the arena or does not fall
    /// on a word boundary.
    #[must_use]
    pub fn offset_of(&self, address: *const u8) -> Option<usize> {
        let byte_offset = address.addr().checked_sub(self.base().addr())?;
        if byte_offset >= self.byte_len() || !byte_offset.is_multiple_of(self.word_size) {
            return None;
        }
        Some(byte_offset / self.word_size)
    }
}
