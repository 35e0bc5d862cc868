//! Cache block and eviction records.
//!
//! A [`CacheBlock`] is one way of one set: validity, dirtiness, tag,
//! coherence state, and the per-block metadata the policies and statistics
//! layers consume. Blocks are created empty at construction and reused
//! in-place for the lifetime of the cache.

use serde::Serialize;

use crate::coherence::MesiState;
use crate::common::Addr;

/// One way of one cache set.
///
/// Invariants: `valid ⇔ coherence_state ≠ Invalid`; `dirty ⇒ valid`. In a
/// single-core configuration the coherence state is just a validity flag
/// (installs produce E or M) with dirty tracked separately.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheBlock {
    /// Whether this way holds a block.
    pub valid: bool,
    /// Whether the block differs from the next level.
    pub dirty: bool,
    /// Tag distinguishing which block occupies this way.
    pub tag: Addr,
    /// MESI state; `Invalid` iff `!valid`.
    pub coherence_state: MesiState,
    /// Value of the cache's monotone access clock at the last touch.
    pub last_access_time: u64,
    /// Demand accesses to this block since installation.
    pub access_count: u64,
    /// Whether the block was installed by a prefetcher and not yet
    /// demand-referenced.
    pub prefetched: bool,
}

impl CacheBlock {
    /// Resets the way to empty.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// Installs a block in-place.
    pub fn fill(&mut self, tag: Addr, dirty: bool, state: MesiState, now: u64, prefetched: bool) {
        debug_assert!(state.is_valid(), "fill with Invalid state");
        self.valid = true;
        self.dirty = dirty;
        self.tag = tag;
        self.coherence_state = state;
        self.last_access_time = now;
        self.access_count = 1;
        self.prefetched = prefetched;
    }
}

/// A block pushed out of a cache, handed to the caller for forwarding.
///
/// The address is the block base (offset bits zero). The caller decides
/// where it flows: victim cache, next level, or the abstract memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictedBlock {
    /// Base address of the evicted block.
    pub address: Addr,
    /// Whether the block must be written back.
    pub dirty: bool,
    /// Coherence state the block held at eviction.
    pub coherence_state: MesiState,
}
