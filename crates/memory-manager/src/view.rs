//! Wire-level views of the segment ledger.
//!
//! Two snapshots can be materialized from a [`SegmentLedger`]:
//!
//! - [`HoleList`]: the `(offset, length)` pair of every hole, in ascending
//!   offset order. This is what placement policies choose from.
//! - [`Bitmap`]: one bit per word, set when the word is allocated.
//!
//! Both are rebuilt from scratch on every call and own their data, so a view
//! never changes after it has been returned.
//!
//! # Wire Format
//!
//! All integers are 16-bit little-endian word counts or word offsets.
//!
//! ```text
//! hole list:  ┌───────┬────────┬────────┬────────┬────────┬─────┐
//!             │ count │ off[0] │ len[0] │ off[1] │ len[1] │ ... │
//!             └───────┴────────┴────────┴────────┴────────┴─────┘
//!
//! bitmap:     ┌───────────┬────────┬────────┬─────┐
//!             │ bit count │ byte 0 │ byte 1 │ ... │   ceil(bit count / 8) bytes
//!             └───────────┴────────┴────────┴─────┘
//!                          bit j of byte i = word 8 * i + j
//! ```

use alloc::vec::Vec;
use core::fmt;

use dataview::{Pod, PodMethods as _};

use crate::ledger::SegmentLedger;

/// A `u16` stored in little-endian byte order.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod)]
pub struct Le16(u16);

impl Le16 {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value.to_le())
    }

    /// Reads the value in native endianness.
    #[must_use]
    pub const fn get(self) -> u16 {
        u16::from_le(self.0)
    }
}

impl From<u16> for Le16 {
    fn from(value: u16) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Le16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

impl fmt::Display for Le16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.get(), f)
    }
}

/// One `(offset, length)` pair of the hole list, in words.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Pod)]
pub struct HoleEntry {
    offset: Le16,
    length: Le16,
}
const _: () = assert!(size_of::<HoleEntry>() == 4);

impl HoleEntry {
    #[must_use]
    pub const fn new(offset: u16, length: u16) -> Self {
        Self {
            offset: Le16::new(offset),
            length: Le16::new(length),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> u16 {
        self.offset.get()
    }

    #[must_use]
    pub const fn length(&self) -> u16 {
        self.length.get()
    }
}

impl fmt::Debug for HoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HoleEntry")
            .field(&self.offset())
            .field(&self.length())
            .finish()
    }
}

/// Snapshot of every hole in the ledger, in ascending offset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoleList {
    entries: Vec<HoleEntry>,
}

impl HoleList {
    /// Number of holes, as written in the wire header.
    #[must_use]
    pub fn count(&self) -> u16 {
        wire_word(self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[HoleEntry] {
        &self.entries
    }

    pub fn iter(&self) -> core::slice::Iter<'_, HoleEntry> {
        self.entries.iter()
    }

    /// Encodes the list as a count header followed by the pairs.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(size_of::<Le16>() + size_of_val(self.as_slice()));
        bytes.extend_from_slice(Le16::new(self.count()).as_bytes());
        for entry in &self.entries {
            bytes.extend_from_slice(entry.as_bytes());
        }
        bytes
    }
}

impl FromIterator<HoleEntry> for HoleList {
    fn from_iter<T: IntoIterator<Item = HoleEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a HoleList {
    type Item = &'a HoleEntry;
    type IntoIter = core::slice::Iter<'a, HoleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Per-word allocation bitmap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    bit_count: u16,
    packed: Vec<u8>,
}

impl Bitmap {
    /// Number of meaningful bits, equal to the arena word count.
    #[must_use]
    pub fn bit_count(&self) -> u16 {
        self.bit_count
    }

    /// Returns the packed bits without the header.
    #[must_use]
    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    /// Returns whether `word` is allocated, or `None` past the last word.
    #[must_use]
    pub fn is_allocated(&self, word: usize) -> Option<bool> {
        if word >= usize::from(self.bit_count) {
            return None;
        }
        Some((self.packed[word / 8] & (1 << (word % 8))) != 0)
    }

    /// Encodes the bitmap as a bit-count header followed by the packed bits.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(size_of::<Le16>() + self.packed.len());
        bytes.extend_from_slice(Le16::new(self.bit_count).as_bytes());
        bytes.extend_from_slice(&self.packed);
        bytes
    }
}

/// Builds the hole list of `ledger`.
#[must_use]
pub fn hole_list(ledger: &SegmentLedger) -> HoleList {
    ledger
        .holes()
        .map(|hole| HoleEntry::new(wire_word(hole.offset()), wire_word(hole.length())))
        .collect()
}

/// Builds the allocation bitmap of `ledger`.
#[must_use]
pub fn bitmap(ledger: &SegmentLedger) -> Bitmap {
    let bit_count = ledger.word_count();
    let mut packed = alloc::vec![0_u8; bit_count.div_ceil(8)];
    for segment in ledger.segments().iter().filter(|s| s.is_allocated()) {
        for word in segment.range() {
            packed[word / 8] |= 1 << (word % 8);
        }
    }
    Bitmap {
        bit_count: wire_word(bit_count),
        packed,
    }
}

// The ledger never covers more than `MAX_WORD_COUNT` words, so every offset,
// length and count fits.
fn wire_word(value: usize) -> u16 {
    u16::try_from(value)
        .unwrap_or_else(|_| panic!("value {value} does not fit in a 16-bit wire word"))
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use dataview::PodMethods as _;

    use super::*;

    fn pairs(list: &HoleList) -> Vec<(u16, u16)> {
        list.iter().map(|h| (h.offset(), h.length())).collect()
    }

    #[test]
    fn test_le16_layout() {
        let value = Le16::new(0x1234);
        assert_eq!(value.get(), 0x1234);
        assert_eq!(value.as_bytes(), &[0x34, 0x12]);
        assert_eq!(format!("{value:?}"), "4660");
    }

    #[test]
    fn test_hole_list_initial() {
        let ledger = SegmentLedger::new(20);
        let list = hole_list(&ledger);
        assert_eq!(list.count(), 1);
        assert_eq!(pairs(&list), vec![(0, 20)]);
        assert_eq!(list.to_bytes(), vec![1, 0, 0, 0, 20, 0]);
    }

    #[test]
    fn test_hole_list_multiple_holes() {
        let mut ledger = SegmentLedger::new(300);
        ledger.claim(0, 4).unwrap();
        ledger.claim(4, 8).unwrap();
        ledger.release(0).unwrap();
        ledger.coalesce();
        let list = hole_list(&ledger);
        assert_eq!(pairs(&list), vec![(0, 4), (12, 288)]);
        assert_eq!(
            list.to_bytes(),
            vec![2, 0, 0, 0, 4, 0, 12, 0, 0x20, 0x01]
        );
    }

    #[test]
    fn test_hole_list_full_arena() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 20).unwrap();
        let list = hole_list(&ledger);
        assert!(list.is_empty());
        assert_eq!(list.to_bytes(), vec![0, 0]);
    }

    #[test]
    fn test_bitmap_layout() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        ledger.claim(4, 8).unwrap();
        ledger.claim(12, 2).unwrap();
        ledger.release(4).unwrap();
        ledger.coalesce();
        let map = bitmap(&ledger);
        assert_eq!(map.bit_count(), 20);
        assert_eq!(map.packed(), &[0x0F, 0x30, 0x00]);
        assert_eq!(map.to_bytes(), vec![20, 0, 0x0F, 0x30, 0x00]);
    }

    #[test]
    fn test_bitmap_partial_final_byte() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 20).unwrap();
        let map = bitmap(&ledger);
        // bits past word 19 stay clear
        assert_eq!(map.to_bytes(), vec![20, 0, 0xFF, 0xFF, 0x0F]);
        assert_eq!(map.is_allocated(19), Some(true));
        assert_eq!(map.is_allocated(20), None);
    }

    #[test]
    fn test_bitmap_header_is_little_endian() {
        let ledger = SegmentLedger::new(0x0102);
        let map = bitmap(&ledger);
        let bytes = map.to_bytes();
        assert_eq!(&bytes[..2], &[0x02, 0x01]);
        assert_eq!(bytes.len(), 2 + 0x0102_usize.div_ceil(8));
        assert!(bytes[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_ledger_views() {
        let ledger = SegmentLedger::new(0);
        assert_eq!(hole_list(&ledger).to_bytes(), vec![0, 0]);
        assert_eq!(bitmap(&ledger).to_bytes(), vec![0, 0]);
    }

    #[test]
    fn test_views_are_snapshots() {
        let mut ledger = SegmentLedger::new(8);
        let before = hole_list(&ledger);
        ledger.claim(0, 2).unwrap();
        assert_eq!(pairs(&before), vec![(0, 8)]);
        assert_eq!(pairs(&hole_list(&ledger)), vec![(2, 6)]);
    }
}
