use alloc::{boxed::Box, string::String};
use core::fmt;

use snafu::{IntoError as _, OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::{
    Location,
    arena::{Arena, InitError},
    ledger::{LedgerError, SegmentLedger},
    policy::PlacementPolicy,
    view::{self, Bitmap, HoleList},
};

/// Reasons an allocation request could not be served.
#[derive(Debug, Snafu)]
pub enum AllocError {
    #[snafu(display("cannot allocate zero bytes"))]
    ZeroSize {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("memory manager is not initialized"))]
    Uninitialized {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("no hole can hold {words} words"))]
    NoFit {
        words: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{policy} policy selected an unusable hole"))]
    Placement {
        policy: String,
        #[snafu(source)]
        source: LedgerError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Reasons a block could not be freed.
#[derive(Debug, Snafu)]
pub enum FreeError {
    #[snafu(display("address {address:#x} is not the start of a block in the arena"))]
    InvalidAddress {
        address: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("block at word offset {offset} is already free"))]
    DoubleFree {
        offset: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to release block at word offset {offset}"))]
    Release {
        offset: usize,
        #[snafu(source)]
        source: LedgerError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Arena and ledger that live and die together.
#[derive(Debug)]
struct Managed {
    arena: Arena,
    ledger: SegmentLedger,
}

/// Fixed-size heap simulator with a pluggable placement policy.
///
/// The manager is created with a word size and a policy, then backed by an
/// arena through [`initialize`](Self::initialize). All sizes handed to the
/// policy and reported by the views are in words.
///
/// # Thread Safety
///
/// The manager performs no locking. Wrap it in a mutex if it has to be shared
/// between threads.
pub struct MemoryManager {
    word_size: usize,
    policy: Box<dyn PlacementPolicy>,
    managed: Option<Managed>,
}

impl MemoryManager {
    /// Creates an uninitialized manager.
    ///
    /// # Panics
    ///
    /// Panics if `word_size` is zero.
    #[must_use]
    pub fn new<P>(word_size: usize, policy: P) -> Self
    where
        P: PlacementPolicy + 'static,
    {
        assert!(word_size > 0, "Word size must be greater than zero");
        Self {
            word_size,
            policy: Box::new(policy),
            managed: None,
        }
    }

    /// Backs the manager with a fresh arena of `word_count` words.
    ///
    /// Any previous arena is then released, invalidating every address it
    /// handed out. On failure the previous state is kept.
    pub fn initialize(&mut self, word_count: usize) -> Result<(), InitError> {
        let arena = Arena::new(self.word_size, word_count)?;
        if let Some(managed) = self.managed.take() {
            log::debug!(
                "re-initializing, releasing {} words",
                managed.arena.word_count()
            );
        }
        let ledger = SegmentLedger::new(word_count);
        log::debug!(
            "initialized arena of {word_count} words x {} bytes",
            self.word_size
        );
        self.managed = Some(Managed { arena, ledger });
        Ok(())
    }

    /// Releases the arena and forgets every segment.
    ///
    /// Does nothing if the manager is not initialized.
    pub fn shutdown(&mut self) {
        if let Some(managed) = self.managed.take() {
            log::debug!(
                "shut down arena of {} words",
                managed.arena.word_count()
            );
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.managed.is_some()
    }

    /// Allocates at least `size_in_bytes` bytes.
    ///
    /// Returns `None` if the request is empty, the manager is not initialized,
    /// or the policy finds no hole.
    pub fn allocate(&mut self, size_in_bytes: usize) -> Option<*mut u8> {
        match self.try_allocate(size_in_bytes) {
            Ok(address) => Some(address),
            Err(AllocError::Placement { policy, source, .. }) => {
                log::error!("{policy} policy selected an unusable hole: {source}");
                None
            }
            Err(err) => {
                log::debug!("allocation of {size_in_bytes} bytes failed: {err}");
                None
            }
        }
    }

    /// Allocates at least `size_in_bytes` bytes, reporting why it could not.
    ///
    /// The request is rounded up to whole words before the policy is asked.
    pub fn try_allocate(&mut self, size_in_bytes: usize) -> Result<*mut u8, AllocError> {
        ensure!(size_in_bytes > 0, ZeroSizeSnafu);
        let managed = self.managed.as_mut().context(UninitializedSnafu)?;

        let words = size_in_bytes.div_ceil(self.word_size);
        let holes = view::hole_list(&managed.ledger);
        let offset = self
            .policy
            .select(words, &holes)
            .context(NoFitSnafu { words })?;
        managed
            .ledger
            .claim(offset, words)
            .context(PlacementSnafu {
                policy: self.policy.name(),
            })?;

        log::trace!(
            "{} placed {words} words at offset {offset}",
            self.policy.name()
        );
        Ok(managed.arena.address_of(offset))
    }

    /// Frees the block starting at `address`.
    ///
    /// The address must be one previously returned by
    /// [`allocate`](Self::allocate) for the current arena. Misaligned
    /// addresses and addresses outside the arena are rejected without
    /// touching the ledger. Adjacent holes are merged afterwards.
    pub fn free(&mut self, address: *const u8) -> Result<(), FreeError> {
        self.release_block(address)
            .inspect_err(|err| log::warn!("rejected free: {err}"))
    }

    fn release_block(&mut self, address: *const u8) -> Result<(), FreeError> {
        let invalid = InvalidAddressSnafu {
            address: address.addr(),
        };
        let managed = self.managed.as_mut().context(invalid)?;
        let offset = managed.arena.offset_of(address).context(invalid)?;
        let segment = managed.ledger.find_containing(offset).ok().context(invalid)?;
        // a block freed earlier may already be merged into a larger hole
        ensure!(segment.is_allocated(), DoubleFreeSnafu { offset });
        ensure!(segment.offset() == offset, invalid);

        managed.ledger.release(offset).map_err(|source| match source {
            LedgerError::DoubleFree { .. } => DoubleFreeSnafu { offset }.build(),
            source => ReleaseSnafu { offset }.into_error(source),
        })?;
        managed.ledger.coalesce();
        Ok(())
    }

    /// Replaces the placement policy used by subsequent allocations.
    pub fn set_policy<P>(&mut self, policy: P)
    where
        P: PlacementPolicy + 'static,
    {
        log::debug!(
            "placement policy changed from {} to {}",
            self.policy.name(),
            policy.name()
        );
        self.policy = Box::new(policy);
    }

    /// Returns a snapshot of the current holes.
    ///
    /// The list is empty when the manager is not initialized.
    #[must_use]
    pub fn hole_list(&self) -> HoleList {
        self.managed
            .as_ref()
            .map(|managed| view::hole_list(&managed.ledger))
            .unwrap_or_default()
    }

    /// Returns a snapshot of the per-word allocation bitmap.
    ///
    /// The bitmap is empty when the manager is not initialized.
    #[must_use]
    pub fn bitmap(&self) -> Bitmap {
        self.managed
            .as_ref()
            .map(|managed| view::bitmap(&managed.ledger))
            .unwrap_or_default()
    }

    /// Returns the segment ledger, if initialized.
    #[must_use]
    pub fn ledger(&self) -> Option<&SegmentLedger> {
        self.managed.as_ref().map(|managed| &managed.ledger)
    }

    /// Returns the word size used for alignment, in bytes.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    /// Returns the address of the first byte of the arena.
    #[must_use]
    pub fn memory_start(&self) -> Option<*const u8> {
        self.managed.as_ref().map(|managed| managed.arena.base())
    }

    /// Returns the size of the arena in bytes, or zero if not initialized.
    #[must_use]
    pub fn memory_limit(&self) -> usize {
        self.managed
            .as_ref()
            .map_or(0, |managed| managed.arena.byte_len())
    }
}

impl fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryManager")
            .field("word_size", &self.word_size)
            .field("policy", &self.policy.name())
            .field("managed", &self.managed)
            .finish()
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
