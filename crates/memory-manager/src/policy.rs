//! Placement policies deciding which hole serves an allocation.
//!
//! A policy only looks at a [`HoleList`] snapshot and names the offset of the
//! hole it wants; the [`MemoryManager`](crate::MemoryManager) does the actual
//! claiming. Policies keep no state between calls.
//!
//! Any `Fn(usize, &HoleList) -> Option<usize>` closure is a policy too:
//!
//! ```rust
//! use memory_manager::{MemoryManager, view::HoleList};
//!
//! // first fit
//! let first_fit = |words: usize, holes: &HoleList| {
//!     holes
//!         .iter()
//!         .find(|h| words > 0 && usize::from(h.length()) >= words)
//!         .map(|h| usize::from(h.offset()))
//! };
//!
//! let mut manager = MemoryManager::new(4, first_fit);
//! manager.initialize(20).unwrap();
//! assert!(manager.allocate(8).is_some());
//! ```

use crate::view::{HoleEntry, HoleList};

/// Chooses the hole an allocation of a given size is placed in.
pub trait PlacementPolicy {
    /// Returns the word offset of the hole to allocate `requested_words`
    /// from, or `None` if no hole fits.
    ///
    /// The returned offset must be the start of a hole listed in `holes`
    /// whose length is at least `requested_words`.
    fn select(&self, requested_words: usize, holes: &HoleList) -> Option<usize>;

    /// Name used in log messages.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> PlacementPolicy for F
where
    F: Fn(usize, &HoleList) -> Option<usize>,
{
    fn select(&self, requested_words: usize, holes: &HoleList) -> Option<usize> {
        self(requested_words, holes)
    }
}

/// Picks the smallest hole that fits; the first one seen wins ties.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BestFit;

impl PlacementPolicy for BestFit {
    fn select(&self, requested_words: usize, holes: &HoleList) -> Option<usize> {
        fitting(requested_words, holes)
            .reduce(|best, hole| {
                if hole.length() < best.length() {
                    hole
                } else {
                    best
                }
            })
            .map(|hole| usize::from(hole.offset()))
    }

    fn name(&self) -> &str {
        "best-fit"
    }
}

/// Picks the largest hole that fits; the first one seen wins ties.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorstFit;

impl PlacementPolicy for WorstFit {
    fn select(&self, requested_words: usize, holes: &HoleList) -> Option<usize> {
        fitting(requested_words, holes)
            .reduce(|worst, hole| {
                if hole.length() > worst.length() {
                    hole
                } else {
                    worst
                }
            })
            .map(|hole| usize::from(hole.offset()))
    }

    fn name(&self) -> &str {
        "worst-fit"
    }
}

fn fitting(requested_words: usize, holes: &HoleList) -> impl Iterator<Item = &HoleEntry> {
    holes
        .iter()
        .filter(move |hole| requested_words > 0 && usize::from(hole.length()) >= requested_words)
}
