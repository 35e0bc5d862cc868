//! Single-core memory hierarchy.
//!
//! Owns L1, the optional L2, the optional victim cache, the optional
//! prefetcher, and the optional write-combining buffer, and routes every
//! demand access through them:
//! 1. L1 lookup. A hit returns after prefetcher bookkeeping.
//! 2. On an L1 miss, the victim cache is consulted; a hit swaps the parked
//!    block back into L1 and the freshly displaced block takes its place.
//! 3. Otherwise the miss propagates to L2 (or terminates at the abstract
//!    memory), the block installs in L1, and displaced dirty blocks flow to
//!    the victim cache or the next level.
//! 4. Prefetch targets install last; their installs never touch demand
//!    counters.
//!
//! Writes headed for the next level (write-through forwards, dirty
//! evictions, victim-cache overflow) pass through the write-combining
//! buffer when one is configured.

use tracing::info;

use crate::cache::{Cache, CacheSnapshot, VictimCache, VictimEntry, WriteCombiningBuffer};
use crate::common::{Addr, ConfigError};
use crate::config::SimConfig;
use crate::prefetch::AdaptivePrefetcher;
use crate::stats::SimulationReport;

/// A complete single-core cache hierarchy.
#[derive(Debug)]
pub struct MemoryHierarchy {
    l1: Cache,
    l2: Option<Cache>,
    victim: Option<VictimCache>,
    prefetcher: Option<AdaptivePrefetcher>,
    write_buffer: Option<WriteCombiningBuffer>,
    accesses: u64,
}

impl MemoryHierarchy {
    /// Builds a hierarchy from a configuration, validating it first.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] the configuration violates.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let l1 = Cache::new("L1", &config.l1);
        let l2 = config.l2.as_ref().map(|c| Cache::new("L2", c));
        let victim = config
            .victim_cache
            .enabled
            .then(|| VictimCache::new(config.victim_cache.size));
        let prefetcher = config
            .l1
            .prefetching
            .enabled
            .then(|| AdaptivePrefetcher::new(&config.l1.prefetching, config.l1.block_size));
        let write_buffer = config.write_combining.enabled.then(|| {
            WriteCombiningBuffer::new(
                config.write_combining.buffer_size,
                config.write_combining.timeout,
            )
        });
        info!(
            l1_size = config.l1.size,
            l1_ways = config.l1.associativity,
            block = config.l1.block_size,
            l2 = l2.is_some(),
            victim = victim.is_some(),
            prefetch = prefetcher.is_some(),
            "hierarchy built"
        );
        Ok(Self {
            l1,
            l2,
            victim,
            prefetcher,
            write_buffer,
            accesses: 0,
        })
    }

    /// Issues one demand access; returns whether L1 hit.
    pub fn access(&mut self, addr: Addr, is_write: bool) -> bool {
        self.accesses += 1;
        let block = self.l1.decoder().block_base(addr);

        // Write-combining housekeeping: timeout tick, then read
        // intersection. Both may flush.
        let mut forwards: Vec<Addr> = Vec::new();
        if let Some(wb) = &mut self.write_buffer {
            forwards.extend(wb.note_access());
            if !is_write {
                forwards.extend(wb.intersect_read(block));
            }
        }
        for a in forwards.drain(..) {
            self.push_next_level(a);
        }

        let mut targets = match &mut self.prefetcher {
            Some(p) => p.on_access(addr),
            None => Vec::new(),
        };

        let result = self.l1.access(addr, is_write);

        if result.hit {
            if result.forwarded_write {
                self.forward_write(block);
            }
            self.install_prefetches(targets);
            return true;
        }

        if let Some(p) = &mut self.prefetcher {
            targets.extend(p.on_miss(addr));
        }

        if !result.installed {
            // No-write-allocate write miss: the write bypasses L1 entirely.
            debug_assert!(result.forwarded_write);
            if let Some(vc) = &mut self.victim {
                // Any parked copy is now stale.
                vc.invalidate_range(block, block);
            }
            if let Some(l2) = &mut self.l2 {
                let _ = l2.access(addr, true);
            }
            self.install_prefetches(targets);
            return false;
        }

        if result.forwarded_write {
            self.forward_write(block);
        }

        // Victim cache: lookup first, then park the displaced block either way.
        let mut satisfied = false;
        if let Some(vc) = &mut self.victim {
            if let Some(entry) = vc.lookup(block) {
                satisfied = true;
                if entry.dirty {
                    // The miss installed the block clean; restore the dirty
                    // bit the parked copy carried.
                    let _ = self.l1.install(block, true);
                }
            }
            if let Some(ev) = result.evicted {
                if let Some(p) = &mut self.prefetcher {
                    p.on_evict(ev.address);
                }
                if let Some(dropped) = vc.insert(VictimEntry {
                    address: ev.address,
                    dirty: ev.dirty,
                }) {
                    if dropped.dirty {
                        forwards.push(dropped.address);
                    }
                }
            }
        } else if let Some(ev) = result.evicted {
            if let Some(p) = &mut self.prefetcher {
                p.on_evict(ev.address);
            }
            if ev.dirty {
                forwards.push(ev.address);
            }
        }
        for a in forwards.drain(..) {
            self.forward_write(a);
        }

        if !satisfied {
            if let Some(l2) = &mut self.l2 {
                // L2 sees the demand miss; its own dirty evictions are
                // counted but not modeled further.
                let _ = l2.access(addr, is_write);
            }
        }

        self.install_prefetches(targets);
        false
    }

    /// Installs prefetch targets into L1, routing any displaced blocks the
    /// same way demand evictions go.
    fn install_prefetches(&mut self, targets: Vec<Addr>) {
        let mut forwards: Vec<Addr> = Vec::new();
        for t in targets {
            let tb = self.l1.decoder().block_base(t);
            if self.l1.contains(tb) {
                continue;
            }
            if let Some(p) = &mut self.prefetcher {
                p.note_issued(tb);
            }
            if let Some(ev) = self.l1.install_prefetch(tb) {
                if let Some(p) = &mut self.prefetcher {
                    p.on_evict(ev.address);
                }
                if let Some(vc) = &mut self.victim {
                    if let Some(dropped) = vc.insert(VictimEntry {
                        address: ev.address,
                        dirty: ev.dirty,
                    }) {
                        if dropped.dirty {
                            forwards.push(dropped.address);
                        }
                    }
                } else if ev.dirty {
                    forwards.push(ev.address);
                }
            }
        }
        for a in forwards {
            self.forward_write(a);
        }
    }

    /// Routes a write toward the next level, through the write-combining
    /// buffer when present.
    fn forward_write(&mut self, block_addr: Addr) {
        if let Some(wb) = &mut self.write_buffer {
            let flushed = wb.record_write(block_addr);
            for a in flushed {
                self.push_next_level(a);
            }
        } else {
            self.push_next_level(block_addr);
        }
    }

    /// Delivers a write to L2, or lets it terminate at the abstract memory.
    fn push_next_level(&mut self, block_addr: Addr) {
        if let Some(l2) = &mut self.l2 {
            // Absorbed outside demand counters; cascading dirty evictions
            // are counted inside the cache.
            let _ = l2.absorb_writeback(block_addr);
        }
    }

    /// Drains the write-combining buffer and flushes dirty lines from both
    /// levels. Used at end of run and by explicit flush requests.
    pub fn flush(&mut self) {
        let pending = match &mut self.write_buffer {
            Some(wb) => wb.flush(),
            None => Vec::new(),
        };
        for a in pending {
            self.push_next_level(a);
        }
        // Flush writebacks are counted at their level; the data itself is
        // not modeled, so nothing travels further.
        let _ = self.l1.flush();
        if let Some(l2) = &mut self.l2 {
            let _ = l2.flush();
        }
    }

    /// Total demand accesses issued.
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// The L1 cache.
    pub fn l1(&self) -> &Cache {
        &self.l1
    }

    /// The L2 cache, when configured.
    pub fn l2(&self) -> Option<&Cache> {
        self.l2.as_ref()
    }

    /// The victim cache, when configured.
    pub fn victim_cache(&self) -> Option<&VictimCache> {
        self.victim.as_ref()
    }

    /// The prefetcher, when configured.
    pub fn prefetcher(&self) -> Option<&AdaptivePrefetcher> {
        self.prefetcher.as_ref()
    }

    /// Occupancy snapshots for every configured level.
    pub fn snapshots(&self) -> Vec<CacheSnapshot> {
        let mut snaps = vec![self.l1.snapshot()];
        if let Some(l2) = &self.l2 {
            snaps.push(l2.snapshot());
        }
        snaps
    }

    /// Rolls the per-component counters into a report.
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            l1: *self.l1.stats(),
            l2: self.l2.as_ref().map(|c| *c.stats()),
            victim: self.victim.as_ref().map(|v| *v.stats()),
            prefetch: self.prefetcher.as_ref().map(AdaptivePrefetcher::stats),
            write_combining: self.write_buffer.as_ref().map(|w| *w.stats()),
            cores: Vec::new(),
            directory: None,
            interconnect: None,
            trace: Default::default(),
            cycles: self.accesses,
            host_seconds: 0.0,
        }
    }
}
