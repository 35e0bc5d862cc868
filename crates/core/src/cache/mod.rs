//! Set-associative cache level.
//!
//! This module implements one level of the hierarchy: lookup, installation,
//! eviction, writeback accounting, and the query surface the visualization
//! and coherence layers use. It provides:
//! 1. **Storage:** a flat block array (`set_index · W + way`) with per-set
//!    replacement state in a parallel array.
//! 2. **Write policies:** write-back + write-allocate and write-through +
//!    no-write-allocate, with an explicit allocate override.
//! 3. **Coherence hooks:** remote invalidate/downgrade entry points driven
//!    by the directory, and state-carrying installs for granted fills.

/// Cache block and eviction records.
pub mod block;
/// Replacement policies (LRU, FIFO, Random, PLRU, NRU, MRU).
pub mod policies;
/// Fully-associative FIFO victim cache.
pub mod victim;
/// Write-combining buffer.
pub mod write;

pub use block::{CacheBlock, EvictedBlock};
pub use victim::{VictimCache, VictimEntry};
pub use write::WriteCombiningBuffer;

use serde::Serialize;
use tracing::trace;

use self::policies::{SetPolicy, ValidMask};
use crate::coherence::mesi::{self, MesiState};
use crate::common::{Addr, AddressDecoder};
use crate::config::{CacheLevelConfig, WritePolicyKind};
use crate::stats::CacheStats;

/// Outcome of one demand access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessResult {
    /// Whether the block was resident.
    pub hit: bool,
    /// Block displaced by an allocating miss, for the caller to forward.
    pub evicted: Option<EvictedBlock>,
    /// Whether a write must be forwarded to the next level immediately
    /// (write-through hit, or any no-allocate write miss).
    pub forwarded_write: bool,
    /// Whether the missing block was installed at this level.
    pub installed: bool,
}

impl AccessResult {
    fn hit() -> Self {
        Self {
            hit: true,
            evicted: None,
            forwarded_write: false,
            installed: false,
        }
    }
}

/// A read-only view of one valid block, for snapshots.
#[derive(Clone, Debug, Serialize)]
pub struct BlockView {
    /// Way index within the set.
    pub way: usize,
    /// Block tag.
    pub tag: Addr,
    /// Dirty flag.
    pub dirty: bool,
    /// Coherence state letter (`M`/`E`/`S`/`I`).
    pub state: char,
    /// Demand accesses since installation.
    pub access_count: u64,
    /// Installed by a prefetcher and not yet demand-referenced.
    pub prefetched: bool,
}

/// A read-only occupancy snapshot of a whole cache.
#[derive(Clone, Debug, Serialize)]
pub struct CacheSnapshot {
    /// Display label (`L1`, `L2`, `core0.L1`, …).
    pub label: String,
    /// Associativity.
    pub ways: usize,
    /// Valid blocks per set, in set order.
    pub sets: Vec<Vec<BlockView>>,
}

/// One set-associative cache level.
pub struct Cache {
    label: String,
    decoder: AddressDecoder,
    ways: usize,
    blocks: Vec<CacheBlock>,
    policies: Vec<SetPolicy>,
    write_policy: WritePolicyKind,
    write_allocate: bool,
    /// Monotone access clock stamped into `last_access_time`.
    clock: u64,
    scratch: ValidMask,
    /// Demand counters; exposed read-only via [`Cache::stats`].
    stats: CacheStats,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("label", &self.label)
            .field("sets", &self.decoder.num_sets())
            .field("ways", &self.ways)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Builds an empty cache from a validated level configuration.
    ///
    /// # Panics
    ///
    /// Panics if the geometry is not a power of two in every dimension;
    /// `SimConfig::validate` rejects such configurations before any cache
    /// is built.
    pub fn new(label: impl Into<String>, config: &CacheLevelConfig) -> Self {
        let num_sets = config.num_sets();
        let ways = config.associativity;
        let decoder = AddressDecoder::new(config.block_size, num_sets);
        let policies = (0..num_sets)
            .map(|set| {
                // Decorrelate the Random policy's LFSR across sets.
                let seed = (set as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0x5DEE_CE66;
                SetPolicy::new(config.replacement_policy, ways, seed)
            })
            .collect();
        Self {
            label: label.into(),
            decoder,
            ways,
            blocks: vec![CacheBlock::default(); num_sets * ways],
            policies,
            write_policy: config.write_policy,
            write_allocate: config.allocates_on_write(),
            clock: 0,
            scratch: ValidMask::new(ways),
            stats: CacheStats::default(),
        }
    }

    /// Finds the way holding `tag` within `set_index`, if resident.
    fn probe(&self, set_index: usize, tag: Addr) -> Option<usize> {
        let base = set_index * self.ways;
        (0..self.ways)
            .find(|&w| self.blocks[base + w].valid && self.blocks[base + w].tag == tag)
    }

    /// Performs a demand access with default fill states (read ⇒ Exclusive,
    /// write ⇒ Modified). Single-core path.
    pub fn access(&mut self, addr: Addr, is_write: bool) -> AccessResult {
        let fill = if is_write {
            MesiState::Modified
        } else {
            MesiState::Exclusive
        };
        self.access_with_fill(addr, is_write, fill)
    }

    /// Performs a demand access, installing a missing block in `fill_state`.
    ///
    /// Multiprocessor callers pass the state granted by the directory
    /// (Shared or Exclusive for reads, Modified for writes).
    pub fn access_with_fill(
        &mut self,
        addr: Addr,
        is_write: bool,
        fill_state: MesiState,
    ) -> AccessResult {
        self.clock += 1;
        if is_write {
            self.stats.writes += 1;
        } else {
            self.stats.reads += 1;
        }

        let d = self.decoder.decode(addr);
        if let Some(way) = self.probe(d.set_index, d.tag) {
            self.stats.hits += 1;
            let idx = d.set_index * self.ways + way;
            let block = &mut self.blocks[idx];
            block.access_count += 1;
            block.last_access_time = self.clock;
            if block.prefetched {
                self.stats.prefetch_hits += 1;
                block.prefetched = false;
            }
            let mut result = AccessResult::hit();
            if is_write {
                match self.write_policy {
                    WritePolicyKind::WriteBack => {
                        block.dirty = true;
                        block.coherence_state = mesi::on_local_write(block.coherence_state);
                    }
                    WritePolicyKind::WriteThrough => {
                        // The next level absorbs the write; the copy here
                        // stays clean.
                        block.coherence_state = mesi::on_local_write(block.coherence_state);
                        block.dirty = false;
                        self.stats.write_throughs += 1;
                        result.forwarded_write = true;
                    }
                }
            }
            self.policies[d.set_index].on_access(way);
            return result;
        }

        self.stats.misses += 1;

        if is_write && !self.write_allocate {
            // The write bypasses this level either way; only a
            // write-through cache counts it as a through-forward.
            if self.write_policy == WritePolicyKind::WriteThrough {
                self.stats.write_throughs += 1;
            }
            return AccessResult {
                hit: false,
                evicted: None,
                forwarded_write: true,
                installed: false,
            };
        }

        let dirty = is_write && self.write_policy == WritePolicyKind::WriteBack;
        let forwarded_write = if is_write && self.write_policy == WritePolicyKind::WriteThrough {
            self.stats.write_throughs += 1;
            true
        } else {
            false
        };
        let state = if is_write { MesiState::Modified } else { fill_state };
        let evicted = self.install_inner(addr, dirty, state, false);
        AccessResult {
            hit: false,
            evicted,
            forwarded_write,
            installed: true,
        }
    }

    /// Installs a block on behalf of the caller (victim-cache restore or a
    /// fill from the next level), preserving its dirty bit.
    ///
    /// Returns the displaced block, if any. Does not touch demand counters.
    pub fn install(&mut self, addr: Addr, dirty: bool) -> Option<EvictedBlock> {
        let state = if dirty {
            MesiState::Modified
        } else {
            MesiState::Exclusive
        };
        self.install_inner(addr, dirty, state, false)
    }

    /// Installs a prefetched block (clean, marked `prefetched`).
    ///
    /// A no-op when the block is already resident. Counted under
    /// `prefetch_installs`, never under demand traffic.
    pub fn install_prefetch(&mut self, addr: Addr) -> Option<EvictedBlock> {
        let d = self.decoder.decode(addr);
        if self.probe(d.set_index, d.tag).is_some() {
            return None;
        }
        self.stats.prefetch_installs += 1;
        self.install_inner(addr, false, MesiState::Exclusive, true)
    }

    fn install_inner(
        &mut self,
        addr: Addr,
        dirty: bool,
        state: MesiState,
        prefetched: bool,
    ) -> Option<EvictedBlock> {
        self.clock += 1;
        let d = self.decoder.decode(addr);

        // Re-install of a resident block only merges the dirty bit.
        if let Some(way) = self.probe(d.set_index, d.tag) {
            let block = &mut self.blocks[d.set_index * self.ways + way];
            block.dirty |= dirty;
            if dirty {
                block.coherence_state = MesiState::Modified;
            }
            return None;
        }

        let base = d.set_index * self.ways;
        self.scratch.clear();
        for w in 0..self.ways {
            if self.blocks[base + w].valid {
                self.scratch.set(w);
            }
        }
        let victim_way = self.policies[d.set_index].select_victim(&self.scratch);
        let idx = base + victim_way;

        let evicted = if self.blocks[idx].valid {
            let victim = &self.blocks[idx];
            self.stats.evictions += 1;
            if victim.dirty {
                self.stats.writebacks += 1;
            }
            let out = EvictedBlock {
                address: self.decoder.block_addr(victim.tag, d.set_index),
                dirty: victim.dirty,
                coherence_state: victim.coherence_state,
            };
            trace!(
                cache = %self.label,
                addr = format_args!("{:#x}", out.address),
                dirty = out.dirty,
                "evict"
            );
            Some(out)
        } else {
            None
        };

        self.blocks[idx].fill(d.tag, dirty, state, self.clock, prefetched);
        self.policies[d.set_index].on_install(victim_way);
        evicted
    }

    /// Absorbs a writeback from the level above without touching demand
    /// counters: marks the block dirty if resident, installs it dirty
    /// otherwise.
    pub fn absorb_writeback(&mut self, addr: Addr) -> Option<EvictedBlock> {
        self.install_inner(addr, true, MesiState::Modified, false)
    }

    /// Whether the block containing `addr` is resident.
    pub fn contains(&self, addr: Addr) -> bool {
        let d = self.decoder.decode(addr);
        self.probe(d.set_index, d.tag).is_some()
    }

    /// Coherence state of the block containing `addr`, if resident.
    pub fn line_state(&self, addr: Addr) -> Option<MesiState> {
        let d = self.decoder.decode(addr);
        self.probe(d.set_index, d.tag)
            .map(|w| self.blocks[d.set_index * self.ways + w].coherence_state)
    }

    /// Applies a remote read to the line: M/E downgrade to S.
    ///
    /// Returns `Some(writeback)` when the line was resident.
    pub fn apply_remote_read(&mut self, addr: Addr) -> Option<bool> {
        let d = self.decoder.decode(addr);
        let way = self.probe(d.set_index, d.tag)?;
        let block = &mut self.blocks[d.set_index * self.ways + way];
        let effect = mesi::on_remote_read(block.coherence_state);
        block.coherence_state = effect.next;
        if effect.writeback {
            block.dirty = false;
        }
        Some(effect.writeback)
    }

    /// Applies a remote write (or invalidate) to the line: any valid state
    /// invalidates.
    ///
    /// Returns `Some(writeback)` when the line was resident.
    pub fn apply_remote_write(&mut self, addr: Addr) -> Option<bool> {
        let d = self.decoder.decode(addr);
        let way = self.probe(d.set_index, d.tag)?;
        let block = &mut self.blocks[d.set_index * self.ways + way];
        let effect = mesi::on_remote_write(block.coherence_state);
        debug_assert_eq!(effect.next, MesiState::Invalid);
        let writeback = effect.writeback;
        block.invalidate();
        Some(writeback)
    }

    /// Invalidates dirty lines, returning how many writebacks that implies.
    ///
    /// Clean lines survive a flush.
    pub fn flush(&mut self) -> u64 {
        let mut writebacks = 0;
        for block in &mut self.blocks {
            if block.valid && block.dirty {
                block.invalidate();
                writebacks += 1;
            }
        }
        self.stats.writebacks += writebacks;
        writebacks
    }

    /// Iterates valid blocks as `(set_index, way, block)`.
    pub fn iter_valid(&self) -> impl Iterator<Item = (usize, usize, &CacheBlock)> {
        let ways = self.ways;
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.valid)
            .map(move |(i, b)| (i / ways, i % ways, b))
    }

    /// Takes a read-only occupancy snapshot for visualization.
    pub fn snapshot(&self) -> CacheSnapshot {
        let mut sets = vec![Vec::new(); self.decoder.num_sets()];
        for (set, way, block) in self.iter_valid() {
            sets[set].push(BlockView {
                way,
                tag: block.tag,
                dirty: block.dirty,
                state: block.coherence_state.letter(),
                access_count: block.access_count,
                prefetched: block.prefetched,
            });
        }
        CacheSnapshot {
            label: self.label.clone(),
            ways: self.ways,
            sets,
        }
    }

    /// Demand counters for this level.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// The address decoder for this level's geometry.
    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    /// Number of sets.
    pub fn num_sets(&self) -> usize {
        self.decoder.num_sets()
    }

    /// Associativity.
    pub fn ways(&self) -> usize {
        self.ways
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        self.decoder.block_size()
    }
}
