//! Cache level unit tests.
//!
//! Exercises hit/miss logic, eviction and writeback accounting, the write
//! policies, coherence hooks, flush, and the counter invariants
//! (`hits + misses == reads + writes`, single residency per address).

use cachesim_core::cache::Cache;
use cachesim_core::coherence::MesiState;
use cachesim_core::config::{CacheLevelConfig, WritePolicyKind};
use pretty_assertions::assert_eq;

use crate::common::{level, tiny_l1, write_through_l1};

/// Builds the 256 B / 2-way / 64 B test cache (2 sets).
///
/// Set index = (addr >> 6) & 1, so page-aligned addresses all land in set 0.
fn test_cache() -> Cache {
    Cache::new("L1", &tiny_l1())
}

// ══════════════════════════════════════════════════════════
// 1. Cold miss / warm hit
// ══════════════════════════════════════════════════════════

/// First touch of a block is a compulsory miss with nothing evicted.
#[test]
fn cold_miss_installs_without_eviction() {
    let mut cache = test_cache();
    let result = cache.access(0x1000, false);
    assert!(!result.hit);
    assert!(result.installed);
    assert_eq!(result.evicted, None);
    assert!(cache.contains(0x1000));
}

/// Second access to the same address hits.
#[test]
fn second_access_hits() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, false);
    assert!(cache.access(0x1000, false).hit);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

/// A different offset within the same block still hits.
#[test]
fn same_block_different_offset_hits() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, false);
    assert!(cache.access(0x1000 + 32, false).hit);
}

// ══════════════════════════════════════════════════════════
// 2. Eviction and writeback
// ══════════════════════════════════════════════════════════

/// Filling a 2-way set and adding a third block evicts the LRU way.
#[test]
fn conflict_evicts_lru_way() {
    let mut cache = test_cache();
    // Tags differ, all set 0.
    let _ = cache.access(0x0000, false);
    let _ = cache.access(0x1000, false);
    let result = cache.access(0x2000, false);
    assert!(!result.hit);
    let evicted = result.evicted.expect("a valid block was displaced");
    assert_eq!(evicted.address, 0x0000);
    assert!(!evicted.dirty);
    assert!(!cache.contains(0x0000));
    assert!(cache.contains(0x1000));
    assert!(cache.contains(0x2000));
}

/// Evicting a written block reports it dirty and counts a writeback.
#[test]
fn dirty_eviction_reports_writeback() {
    let mut cache = test_cache();
    let _ = cache.access(0x0000, true);
    let _ = cache.access(0x1000, false);
    let result = cache.access(0x2000, false);
    let evicted = result.evicted.expect("dirty victim");
    assert!(evicted.dirty);
    assert_eq!(evicted.address, 0x0000);
    assert_eq!(cache.stats().writebacks, 1);
    assert_eq!(cache.stats().evictions, 1);
}

/// The dirty bit survives intervening reads.
#[test]
fn dirty_bit_persists_across_reads() {
    let mut cache = test_cache();
    let _ = cache.access(0x0000, true);
    let _ = cache.access(0x0000, false);
    let _ = cache.access(0x1000, false);
    let result = cache.access(0x2000, false);
    assert!(result.evicted.expect("victim").dirty);
}

// ══════════════════════════════════════════════════════════
// 3. Counter invariants
// ══════════════════════════════════════════════════════════

/// hits + misses == reads + writes over an arbitrary mixed workload.
#[test]
fn access_counters_balance() {
    let mut cache = test_cache();
    let addrs = [0x0000u32, 0x1000, 0x0000, 0x2000, 0x1000, 0x3000, 0x0040];
    for (i, &addr) in addrs.iter().enumerate() {
        let _ = cache.access(addr, i % 3 == 0);
    }
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, stats.reads + stats.writes);
    assert_eq!(stats.reads + stats.writes, addrs.len() as u64);
}

/// No address is ever resident in two ways of its set.
#[test]
fn single_residency_per_address() {
    let mut cache = Cache::new("L1", &level(512, 4, 64));
    let addrs: Vec<u32> = (0..32).map(|i| i * 0x100).collect();
    for &addr in &addrs {
        let _ = cache.access(addr, addr % 3 == 0);
        let _ = cache.access(addr, false);
        let mut seen: Vec<(usize, u32)> = cache
            .iter_valid()
            .map(|(set, _, block)| (set, block.tag))
            .collect();
        let before = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), before, "duplicate (set, tag) after {addr:#x}");
    }
}

/// A fully-associative cache holds exactly as many distinct blocks as it
/// has ways, with no conflict misses.
#[test]
fn fully_associative_no_conflict_misses() {
    // 1024 B / 16-way / 64 B: one set of 16 ways.
    let mut cache = Cache::new("L1", &level(1024, 16, 64));
    assert_eq!(cache.num_sets(), 1);
    for i in 0..16u32 {
        let result = cache.access(i * 0x40, false);
        assert!(!result.hit);
        assert_eq!(result.evicted, None, "no eviction while ways remain");
    }
    for i in 0..16u32 {
        assert!(cache.access(i * 0x40, false).hit);
    }
    assert_eq!(cache.stats().misses, 16);
    assert_eq!(cache.stats().evictions, 0);
}

// ══════════════════════════════════════════════════════════
// 4. Write-through / no-write-allocate
// ══════════════════════════════════════════════════════════

/// A write hit under write-through forwards and leaves the block clean.
#[test]
fn write_through_hit_forwards_and_stays_clean() {
    let mut cache = Cache::new("L1", &write_through_l1());
    let _ = cache.access(0x1000, false);
    let result = cache.access(0x1000, true);
    assert!(result.hit);
    assert!(result.forwarded_write);
    // Evicting the written block must not claim a writeback.
    let _ = cache.access(0x0000, false);
    let _ = cache.access(0x2000, false);
    let _ = cache.access(0x3000, false);
    assert_eq!(cache.stats().writebacks, 0);
}

/// A write miss under no-write-allocate forwards without installing.
#[test]
fn no_allocate_write_miss_skips_install() {
    let mut cache = Cache::new("L1", &write_through_l1());
    let result = cache.access(0x1000, true);
    assert!(!result.hit);
    assert!(!result.installed);
    assert!(result.forwarded_write);
    assert!(!cache.contains(0x1000));
    assert_eq!(cache.stats().write_throughs, 1);
}

/// A write-back cache with the no-allocate override forwards write misses
/// without claiming them as write-through traffic.
#[test]
fn write_back_no_allocate_is_not_write_through() {
    let config = CacheLevelConfig {
        write_policy: WritePolicyKind::WriteBack,
        write_allocate: Some(false),
        ..tiny_l1()
    };
    let mut cache = Cache::new("L1", &config);
    let result = cache.access(0x1000, true);
    assert!(!result.hit);
    assert!(!result.installed);
    assert!(result.forwarded_write, "the write still reaches the next level");
    assert_eq!(cache.stats().write_throughs, 0, "the cache is write-back");
    // A write hit stays a plain write-back hit.
    let _ = cache.access(0x2000, false);
    let result = cache.access(0x2000, true);
    assert!(result.hit);
    assert!(!result.forwarded_write);
    assert_eq!(cache.stats().write_throughs, 0);
}

/// The explicit allocate override installs write misses even under
/// write-through.
#[test]
fn write_allocate_override_installs() {
    let config = CacheLevelConfig {
        write_policy: WritePolicyKind::WriteThrough,
        write_allocate: Some(true),
        ..tiny_l1()
    };
    let mut cache = Cache::new("L1", &config);
    let result = cache.access(0x1000, true);
    assert!(result.installed);
    assert!(result.forwarded_write, "write-through still forwards");
    assert!(cache.contains(0x1000));
}

// ══════════════════════════════════════════════════════════
// 5. Installs and coherence hooks
// ══════════════════════════════════════════════════════════

/// `install` preserves the caller's dirty bit and skips demand counters.
#[test]
fn install_preserves_dirty_and_counters() {
    let mut cache = test_cache();
    let _ = cache.install(0x1000, true);
    assert!(cache.contains(0x1000));
    assert_eq!(cache.stats().hits + cache.stats().misses, 0);
    // Evicting it later must write back: fill way 1, then displace the
    // now-LRU installed block.
    let _ = cache.access(0x0000, false);
    let result = cache.access(0x2000, false);
    let evicted = result.evicted.expect("installed block displaced");
    assert_eq!(evicted.address, 0x1000);
    assert!(evicted.dirty);
}

/// Prefetch installs mark the block and count separately; the first demand
/// hit claims a prefetch hit and clears the mark.
#[test]
fn prefetch_install_counts_first_use() {
    let mut cache = test_cache();
    let _ = cache.install_prefetch(0x1000);
    assert_eq!(cache.stats().prefetch_installs, 1);
    assert_eq!(cache.stats().misses, 0);
    assert!(cache.access(0x1000, false).hit);
    assert_eq!(cache.stats().prefetch_hits, 1);
    // Second hit is an ordinary hit.
    assert!(cache.access(0x1000, false).hit);
    assert_eq!(cache.stats().prefetch_hits, 1);
}

/// A remote write invalidates the line, reporting whether it was Modified.
#[test]
fn remote_write_invalidates() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, true);
    assert_eq!(cache.line_state(0x1000), Some(MesiState::Modified));
    assert_eq!(cache.apply_remote_write(0x1000), Some(true));
    assert!(!cache.contains(0x1000));
    // Absent lines report None.
    assert_eq!(cache.apply_remote_write(0x1000), None);
}

/// A remote read downgrades M and E to S.
#[test]
fn remote_read_downgrades_to_shared() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, true);
    assert_eq!(cache.apply_remote_read(0x1000), Some(true), "M supplies data");
    assert_eq!(cache.line_state(0x1000), Some(MesiState::Shared));
    let _ = cache.access(0x2000, false);
    assert_eq!(cache.apply_remote_read(0x2000), Some(false), "E is clean");
    assert_eq!(cache.line_state(0x2000), Some(MesiState::Shared));
}

// ══════════════════════════════════════════════════════════
// 6. Flush and snapshots
// ══════════════════════════════════════════════════════════

/// Flush invalidates dirty lines (counting writebacks) and keeps clean
/// ones.
#[test]
fn flush_invalidates_dirty_keeps_clean() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, true);
    let _ = cache.access(0x1040, false);
    assert_eq!(cache.flush(), 1);
    assert!(!cache.contains(0x1000));
    assert!(cache.contains(0x1040));
}

/// Snapshots report exactly the valid blocks with their states.
#[test]
fn snapshot_reflects_contents() {
    let mut cache = test_cache();
    let _ = cache.access(0x1000, true);
    let _ = cache.access(0x1040, false);
    let snap = cache.snapshot();
    assert_eq!(snap.ways, 2);
    let blocks: usize = snap.sets.iter().map(Vec::len).sum();
    assert_eq!(blocks, 2);
    let dirty: Vec<_> = snap
        .sets
        .iter()
        .flatten()
        .filter(|b| b.dirty)
        .collect();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].state, 'M');
}
