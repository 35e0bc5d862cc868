//! Cache replacement policies.
//!
//! Implements victim selection for set-associative caches. Each policy keeps
//! its metadata per set; the cache stores one [`SetPolicy`] per set in a flat
//! array parallel to the block array.
//!
//! # Policies
//!
//! - `Lru`: Least Recently Used.
//! - `Fifo`: First-In, First-Out.
//! - `Random`: Uniform over valid ways (xorshift LFSR).
//! - `Plru`: Tree-based Pseudo-LRU.
//! - `Nru`: Not Recently Used (reference bits).
//! - `Mru`: Most Recently Used.
//!
//! Dispatch is a `match` on the [`SetPolicy`] enum rather than a trait
//! object, keeping the per-set state inline and statically sized per run.
//!
//! All variants share the invalid-way-first rule: `select_victim` returns the
//! lowest invalid way if one exists, so cold sets fill before any valid block
//! is evicted.

/// First-In, First-Out replacement.
pub mod fifo;

/// Least Recently Used replacement.
pub mod lru;

/// Most Recently Used replacement.
pub mod mru;

/// Not Recently Used (reference-bit) replacement.
pub mod nru;

/// Tree-based Pseudo-LRU replacement.
pub mod plru;

/// Random replacement.
pub mod random;

pub use fifo::FifoState;
pub use lru::LruState;
pub use mru::MruState;
pub use nru::NruState;
pub use plru::PlruState;
pub use random::RandomState;

use crate::config::ReplacementPolicyKind;

/// Validity bitmap for one set, passed to `select_victim`.
///
/// Backed by `u64` words so fully-associative configurations (hundreds of
/// ways) work; the cache reuses one instance as scratch across evictions.
#[derive(Clone, Debug)]
pub struct ValidMask {
    words: Vec<u64>,
    ways: usize,
}

impl ValidMask {
    /// Creates an all-invalid mask for `ways` ways.
    pub fn new(ways: usize) -> Self {
        Self {
            words: vec![0; ways.div_ceil(64)],
            ways,
        }
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Marks `way` as valid.
    #[inline]
    pub fn set(&mut self, way: usize) {
        self.words[way / 64] |= 1 << (way % 64);
    }

    /// Returns whether `way` is valid.
    #[inline]
    pub fn get(&self, way: usize) -> bool {
        (self.words[way / 64] >> (way % 64)) & 1 == 1
    }

    /// Number of ways covered by the mask.
    #[inline]
    pub fn ways(&self) -> usize {
        self.ways
    }

    /// Lowest invalid way, if any.
    pub fn first_invalid(&self) -> Option<usize> {
        for (w, word) in self.words.iter().enumerate() {
            let inverted = !word;
            if inverted != 0 {
                let way = w * 64 + inverted.trailing_zeros() as usize;
                if way < self.ways {
                    return Some(way);
                }
            }
        }
        None
    }

    /// Number of valid ways.
    pub fn count_valid(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Per-set replacement state for one policy.
///
/// The shared contract:
/// - `on_access(way)`: a resident way was touched.
/// - `on_install(way)`: a block was just installed at `way`.
/// - `select_victim(valid)`: choose the way to evict. Never mutates history
///   for the deterministic policies, so two consecutive calls agree.
/// - `reset()`: forget all history.
#[derive(Clone, Debug)]
pub enum SetPolicy {
    /// Least Recently Used.
    Lru(LruState),
    /// First-In, First-Out.
    Fifo(FifoState),
    /// Uniform random over valid ways.
    Random(RandomState),
    /// Tree Pseudo-LRU.
    Plru(PlruState),
    /// Not Recently Used.
    Nru(NruState),
    /// Most Recently Used.
    Mru(MruState),
}

impl SetPolicy {
    /// Creates per-set state for `kind` with `ways` ways.
    ///
    /// `seed` differentiates the Random policy's LFSR across sets; the other
    /// policies ignore it.
    pub fn new(kind: ReplacementPolicyKind, ways: usize, seed: u64) -> Self {
        match kind {
            ReplacementPolicyKind::Lru => Self::Lru(LruState::new(ways)),
            ReplacementPolicyKind::Fifo => Self::Fifo(FifoState::new(ways)),
            ReplacementPolicyKind::Random => Self::Random(RandomState::new(ways, seed)),
            ReplacementPolicyKind::Plru => Self::Plru(PlruState::new(ways)),
            ReplacementPolicyKind::Nru => Self::Nru(NruState::new(ways)),
            ReplacementPolicyKind::Mru => Self::Mru(MruState::new(ways)),
        }
    }

    /// Notes that a resident way was touched.
    #[inline]
    pub fn on_access(&mut self, way: usize) {
        match self {
            Self::Lru(s) => s.touch(way),
            Self::Fifo(_) => {}
            Self::Random(_) => {}
            Self::Plru(s) => s.touch(way),
            Self::Nru(s) => s.touch(way),
            Self::Mru(s) => s.touch(way),
        }
    }

    /// Notes that a block was installed at `way`.
    #[inline]
    pub fn on_install(&mut self, way: usize) {
        match self {
            Self::Lru(s) => s.touch(way),
            Self::Fifo(s) => s.installed(way),
            Self::Random(_) => {}
            Self::Plru(s) => s.touch(way),
            Self::Nru(s) => s.touch(way),
            Self::Mru(s) => s.touch(way),
        }
    }

    /// Chooses the way to evict given which ways hold valid blocks.
    ///
    /// Returns the lowest invalid way when one exists; otherwise defers to
    /// the policy. The result is always `< valid.ways()`.
    pub fn select_victim(&mut self, valid: &ValidMask) -> usize {
        if let Some(way) = valid.first_invalid() {
            return way;
        }
        let way = match self {
            Self::Lru(s) => s.victim(valid),
            Self::Fifo(s) => s.victim(valid),
            Self::Random(s) => s.victim(valid),
            Self::Plru(s) => s.victim(),
            Self::Nru(s) => s.victim(valid),
            Self::Mru(s) => s.victim(valid),
        };
        assert!(
            way < valid.ways(),
            "replacement policy returned way {way} of {}",
            valid.ways()
        );
        way
    }

    /// Forgets all history.
    pub fn reset(&mut self) {
        match self {
            Self::Lru(s) => s.reset(),
            Self::Fifo(s) => s.reset(),
            Self::Random(_) => {}
            Self::Plru(s) => s.reset(),
            Self::Nru(s) => s.reset(),
            Self::Mru(s) => s.reset(),
        }
    }
}
