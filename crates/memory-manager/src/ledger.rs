//! Segment ledger tracking which parts of the arena are in use.
//!
//! The ledger partitions the arena `[0, word_count)` into an ordered sequence
//! of segments. Every segment is either a [`Hole`](SegmentState::Hole) or
//! [`Allocated`](SegmentState::Allocated).
//!
//! # Invariants
//!
//! - **Coverage**: the first segment starts at word 0, every segment ends
//!   where the next one starts, and the last segment ends at `word_count`.
//! - **Non-empty**: every segment is at least one word long.
//! - **No adjacent holes**: after [`coalesce`](SegmentLedger::coalesce), no
//!   two consecutive segments are both holes.
//!
//! ```text
//! claim(4, 3):
//! ┌──────────── hole [4, 10) ────────────┐
//! │                                      │
//! ┌─ alloc [4, 7) ─┬──── hole [7, 10) ───┐
//!
//! release(4) + coalesce():
//! ┌ hole [0, 4) ┬─ hole [4, 7) ─┬ hole [7, 10) ┐
//! ┌──────────────── hole [0, 10) ──────────────┐
//! ```
//!
//! Segments are kept in a `Vec` sorted by offset, so lookups are binary
//! searches and splits/merges shift the tail of the vector.

use alloc::vec::Vec;
use core::{fmt, ops::Range};

use derive_more::IsVariant;
use snafu::{OptionExt as _, Snafu, ensure};

use crate::{Location, arena::MAX_WORD_COUNT};

/// Errors reported by ledger operations.
#[derive(Debug, Snafu)]
pub enum LedgerError {
    #[snafu(display("no segment manages word offset {offset}"))]
    OffsetNotManaged {
        offset: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot claim {length} words at offset {offset}: no hole that large starts there"))]
    InvalidClaim {
        offset: usize,
        length: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("segment at offset {offset} is already a hole"))]
    DoubleFree {
        offset: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Allocation state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IsVariant)]
pub enum SegmentState {
    Hole,
    Allocated,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hole => f.write_str("hole"),
            Self::Allocated => f.write_str("allocated"),
        }
    }
}

/// A maximal run of words sharing the same allocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    offset: usize,
    length: usize,
    state: SegmentState,
}

impl Segment {
    const fn new(offset: usize, length: usize, state: SegmentState) -> Self {
        Self {
            offset,
            length,
            state,
        }
    }

    /// Word index of the first word of the segment.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of words in the segment.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn state(&self) -> SegmentState {
        self.state
    }

    /// Word index one past the last word of the segment.
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    #[must_use]
    pub fn is_hole(&self) -> bool {
        self.state.is_hole()
    }

    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.state.is_allocated()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {})", self.state, self.offset, self.end())
    }
}

/// Ordered partition of an arena into hole and allocated segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLedger {
    segments: Vec<Segment>,
    word_count: usize,
}

impl SegmentLedger {
    /// Creates a ledger holding a single hole that spans `word_count` words.
    ///
    /// An empty arena gets an empty ledger.
    ///
    /// # Panics
    ///
    /// Panics if `word_count` exceeds [`MAX_WORD_COUNT`].
    #[must_use]
    pub fn new(word_count: usize) -> Self {
        assert!(
            word_count <= MAX_WORD_COUNT,
            "Word count {word_count} exceeds {MAX_WORD_COUNT}"
        );
        let mut segments = Vec::new();
        if word_count > 0 {
            segments.push(Segment::new(0, word_count, SegmentState::Hole));
        }
        Self {
            segments,
            word_count,
        }
    }

    /// Number of words covered by the ledger.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Returns all segments in ascending offset order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns an iterator over the hole segments in ascending offset order.
    pub fn holes(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.iter().filter(|s| s.is_hole())
    }

    /// Returns the segment whose range contains `offset`.
    pub fn find_containing(&self, offset: usize) -> Result<&Segment, LedgerError> {
        let index = self.index_containing(offset)?;
        Ok(&self.segments[index])
    }

    /// Claims `length` words of the hole that starts at `offset`.
    ///
    /// If the hole is exactly `length` words long it is flipped to allocated.
    /// Otherwise it is split into an allocated prefix of `length` words and a
    /// trailing hole holding the rest.
    ///
    /// The ledger is left untouched on failure.
    pub fn claim(&mut self, offset: usize, length: usize) -> Result<(), LedgerError> {
        let index = self.index_containing(offset)?;
        let segment = &mut self.segments[index];
        ensure!(
            length > 0
                && segment.offset == offset
                && segment.is_hole()
                && segment.length >= length,
            InvalidClaimSnafu { offset, length }
        );

        segment.state = SegmentState::Allocated;
        if segment.length > length {
            let remaining = Segment::new(offset + length, segment.length - length, SegmentState::Hole);
            segment.length = length;
            self.segments.insert(index + 1, remaining);
            log::trace!("claimed [{offset}, {}), split off {remaining}", offset + length);
        } else {
            log::trace!("claimed whole hole [{offset}, {})", offset + length);
        }

        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Turns the allocated segment starting at `offset` back into a hole.
    ///
    /// Neighbouring holes are not merged; call [`coalesce`](Self::coalesce)
    /// afterwards.
    pub fn release(&mut self, offset: usize) -> Result<(), LedgerError> {
        let index = self
            .segments
            .binary_search_by_key(&offset, Segment::offset)
            .ok()
            .context(OffsetNotManagedSnafu { offset })?;
        let segment = &mut self.segments[index];
        ensure!(segment.is_allocated(), DoubleFreeSnafu { offset });

        segment.state = SegmentState::Hole;
        log::trace!("released {segment}");
        Ok(())
    }

    /// Merges every run of consecutive holes into a single hole.
    pub fn coalesce(&mut self) {
        let before = self.segments.len();
        // `dedup_by` hands us (later, earlier) and drops `later` when we
        // return true, so the earlier hole absorbs the later one.
        self.segments.dedup_by(|next, prev| {
            if prev.is_hole() && next.is_hole() {
                prev.length += next.length;
                true
            } else {
                false
            }
        });
        let merged = before - self.segments.len();
        if merged > 0 {
            log::trace!("coalesced {merged} hole(s)");
        }

        debug_assert!(self.is_consistent());
        debug_assert!(!self.has_adjacent_holes());
    }

    /// Checks that the segments are non-empty, ordered, and exactly cover
    /// `[0, word_count)`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut expected_offset = 0;
        for segment in &self.segments {
            if segment.offset != expected_offset || segment.length == 0 {
                return false;
            }
            expected_offset = segment.end();
        }
        expected_offset == self.word_count
    }

    /// Returns `true` if two consecutive segments are both holes.
    #[must_use]
    pub fn has_adjacent_holes(&self) -> bool {
        self.segments
            .windows(2)
            .any(|pair| pair[0].is_hole() && pair[1].is_hole())
    }

    fn index_containing(&self, offset: usize) -> Result<usize, LedgerError> {
        let index = self.segments.partition_point(|s| s.end() <= offset);
        ensure!(
            index < self.segments.len(),
            OffsetNotManagedSnafu { offset }
        );
        Ok(index)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::{
        SegmentState::{Allocated, Hole},
        *,
    };

    fn layout(ledger: &SegmentLedger) -> Vec<(usize, usize, SegmentState)> {
        ledger
            .segments()
            .iter()
            .map(|s| (s.offset(), s.length(), s.state()))
            .collect()
    }

    #[test]
    fn test_new_single_hole() {
        let ledger = SegmentLedger::new(20);
        assert_eq!(layout(&ledger), vec![(0, 20, Hole)]);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn test_new_empty() {
        let ledger = SegmentLedger::new(0);
        assert!(ledger.segments().is_empty());
        assert!(ledger.is_consistent());
        assert!(matches!(
            ledger.find_containing(0),
            Err(LedgerError::OffsetNotManaged { offset: 0, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "Word count 65536 exceeds 65535")]
    fn test_new_too_large() {
        let _ = SegmentLedger::new(65536);
    }

    #[test]
    fn test_find_containing() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        ledger.claim(4, 8).unwrap();

        assert_eq!(ledger.find_containing(0).unwrap().range(), 0..4);
        assert_eq!(ledger.find_containing(3).unwrap().range(), 0..4);
        assert_eq!(ledger.find_containing(4).unwrap().range(), 4..12);
        assert_eq!(ledger.find_containing(11).unwrap().range(), 4..12);
        assert_eq!(ledger.find_containing(19).unwrap().range(), 12..20);
        assert!(matches!(
            ledger.find_containing(20),
            Err(LedgerError::OffsetNotManaged { offset: 20, .. })
        ));
    }

    #[test]
    fn test_claim_split() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        assert_eq!(layout(&ledger), vec![(0, 4, Allocated), (4, 16, Hole)]);
    }

    #[test]
    fn test_claim_exact() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 20).unwrap();
        assert_eq!(layout(&ledger), vec![(0, 20, Allocated)]);
    }

    #[test]
    fn test_claim_middle_hole() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        ledger.claim(4, 4).unwrap();
        ledger.claim(8, 4).unwrap();
        ledger.release(4).unwrap();
        ledger.coalesce();
        ledger.claim(4, 1).unwrap();
        assert_eq!(
            layout(&ledger),
            vec![
                (0, 4, Allocated),
                (4, 1, Allocated),
                (5, 3, Hole),
                (8, 4, Allocated),
                (12, 8, Hole),
            ]
        );
    }

    #[test]
    fn test_claim_rejects_invalid_targets() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        let before = ledger.clone();

        // allocated segment
        assert!(matches!(
            ledger.claim(0, 1),
            Err(LedgerError::InvalidClaim { .. })
        ));
        // hole too short
        assert!(matches!(
            ledger.claim(4, 17),
            Err(LedgerError::InvalidClaim { .. })
        ));
        // not the start of the hole
        assert!(matches!(
            ledger.claim(5, 1),
            Err(LedgerError::InvalidClaim { .. })
        ));
        // zero length
        assert!(matches!(
            ledger.claim(4, 0),
            Err(LedgerError::InvalidClaim { .. })
        ));
        // outside the arena
        assert!(matches!(
            ledger.claim(20, 1),
            Err(LedgerError::OffsetNotManaged { .. })
        ));

        assert_eq!(ledger, before);
    }

    #[test]
    fn test_release_and_double_free() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        ledger.release(0).unwrap();
        assert_eq!(layout(&ledger), vec![(0, 4, Hole), (4, 16, Hole)]);
        assert!(matches!(
            ledger.release(0),
            Err(LedgerError::DoubleFree { offset: 0, .. })
        ));
    }

    #[test]
    fn test_release_unknown_offset() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        assert!(matches!(
            ledger.release(2),
            Err(LedgerError::OffsetNotManaged { offset: 2, .. })
        ));
        assert!(matches!(
            ledger.release(40),
            Err(LedgerError::OffsetNotManaged { offset: 40, .. })
        ));
    }

    #[test]
    fn test_coalesce_with_next() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        ledger.release(0).unwrap();
        assert!(ledger.has_adjacent_holes());
        ledger.coalesce();
        assert_eq!(layout(&ledger), vec![(0, 20, Hole)]);
    }

    #[test]
    fn test_coalesce_with_both_neighbours() {
        let mut ledger = SegmentLedger::new(12);
        ledger.claim(0, 4).unwrap();
        ledger.claim(4, 4).unwrap();
        ledger.claim(8, 4).unwrap();
        ledger.release(0).unwrap();
        ledger.release(8).unwrap();
        ledger.coalesce();
        assert_eq!(
            layout(&ledger),
            vec![(0, 4, Hole), (4, 4, Allocated), (8, 4, Hole)]
        );

        ledger.release(4).unwrap();
        ledger.coalesce();
        assert_eq!(layout(&ledger), vec![(0, 12, Hole)]);
    }

    #[test]
    fn test_coalesce_keeps_allocated_runs() {
        let mut ledger = SegmentLedger::new(8);
        for offset in 0..8 {
            ledger.claim(offset, 1).unwrap();
        }
        ledger.coalesce();
        assert_eq!(ledger.segments().len(), 8);
        assert!(ledger.segments().iter().all(Segment::is_allocated));
    }

    #[test]
    fn test_segment_display() {
        let mut ledger = SegmentLedger::new(20);
        ledger.claim(0, 4).unwrap();
        assert_eq!(ledger.segments()[0].to_string(), "allocated [0, 4)");
        assert_eq!(ledger.segments()[1].to_string(), "hole [4, 20)");
    }
}
