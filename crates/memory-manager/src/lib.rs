//! Fixed-size heap simulator with pluggable hole placement.
//!
//! A [`MemoryManager`] carves a single contiguous arena into allocated
//! segments and free *holes*. Which hole serves a request is decided by a
//! [`PlacementPolicy`], and the current layout can be inspected through two
//! wire-level views: a hole list and an allocation bitmap.
//!
//! # Components
//!
//! - [`arena`]: the owned backing buffer, addressed in words.
//! - [`ledger`]: the ordered partition of the arena into segments, with
//!   split-on-claim and coalesce-on-release.
//! - [`policy`]: the placement contract plus [`BestFit`] and [`WorstFit`].
//! - [`view`]: hole list and bitmap snapshots and their 16-bit little-endian
//!   encodings.
//! - [`MemoryManager`]: the facade tying the pieces together.
//!
//! # Usage Example
//!
//! ```rust
//! use memory_manager::{BestFit, MemoryManager};
//!
//! // 4-byte words, 20 words
//! let mut manager = MemoryManager::new(4, BestFit);
//! manager.initialize(20).unwrap();
//!
//! let a = manager.allocate(16).unwrap(); // 4 words
//! let b = manager.allocate(32).unwrap(); // 8 words
//! assert_eq!(a.addr() - manager.memory_start().unwrap().addr(), 0);
//! assert_eq!(b.addr() - a.addr(), 16);
//!
//! let holes: Vec<_> = manager
//!     .hole_list()
//!     .iter()
//!     .map(|h| (h.offset(), h.length()))
//!     .collect();
//! assert_eq!(holes, [(12, 8)]);
//!
//! manager.free(a).unwrap();
//! assert_eq!(manager.hole_list().to_bytes(), [2, 0, 0, 0, 4, 0, 12, 0, 8, 0]);
//! ```
//!
//! # Limits
//!
//! Offsets and lengths are exchanged as 16-bit values, so an arena holds at
//! most [`MAX_WORD_COUNT`] words.
//!
//! # Thread Safety
//!
//! Nothing in this crate locks. A manager shared between threads must be
//! wrapped in a mutex by the caller.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

pub use self::{
    arena::{InitError, MAX_WORD_COUNT},
    location::Location,
    manager::{AllocError, FreeError, MemoryManager},
    policy::{BestFit, PlacementPolicy, WorstFit},
};

pub mod arena;
pub mod ledger;
mod location;
mod manager;
pub mod policy;
pub mod view;
