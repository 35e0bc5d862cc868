//! Statistics derivation tests.

use cachesim_core::stats::{CacheStats, InterconnectStats, PrefetchStats, SimulationReport};
use pretty_assertions::assert_eq;

/// Rates divide hits by total accesses and survive the idle case.
#[test]
fn cache_rates() {
    let mut stats = CacheStats::default();
    assert_eq!(stats.hit_rate(), 0.0);
    assert_eq!(stats.miss_rate(), 0.0);
    stats.hits = 3;
    stats.misses = 1;
    assert!((stats.hit_rate() - 0.75).abs() < 1e-9);
    assert!((stats.miss_rate() - 0.25).abs() < 1e-9);
    assert_eq!(stats.accesses(), 4);
}

/// Merging folds every counter.
#[test]
fn cache_merge_folds_all_counters() {
    let mut a = CacheStats {
        hits: 1,
        misses: 2,
        reads: 2,
        writes: 1,
        writebacks: 1,
        ..CacheStats::default()
    };
    let b = CacheStats {
        hits: 10,
        misses: 20,
        reads: 25,
        writes: 5,
        prefetch_hits: 7,
        ..CacheStats::default()
    };
    a.merge(&b);
    assert_eq!(a.hits, 11);
    assert_eq!(a.misses, 22);
    assert_eq!(a.reads, 27);
    assert_eq!(a.writes, 6);
    assert_eq!(a.writebacks, 1);
    assert_eq!(a.prefetch_hits, 7);
}

/// Prefetch accuracy is confirmed / issued.
#[test]
fn prefetch_accuracy() {
    let stats = PrefetchStats {
        issued: 8,
        confirmed: 6,
        ..PrefetchStats::default()
    };
    assert!((stats.accuracy() - 0.75).abs() < 1e-9);
    assert_eq!(PrefetchStats::default().accuracy(), 0.0);
}

/// Interconnect derivations: average hops and utilization.
#[test]
fn interconnect_derivations() {
    let stats = InterconnectStats {
        total_messages: 4,
        total_latency: 40,
        total_hops: 10,
        busy_cycles: 30,
        congestion_events: 1,
    };
    assert!((stats.avg_hops() - 2.5).abs() < 1e-9);
    assert!((stats.utilization() - 0.75).abs() < 1e-9);
}

/// CSV rows carry the headline counters under stable dotted keys.
#[test]
fn report_rows_expose_dotted_keys() {
    let report = SimulationReport {
        l1: CacheStats {
            hits: 5,
            misses: 5,
            reads: 10,
            ..CacheStats::default()
        },
        ..SimulationReport::default()
    };
    let rows = report.rows();
    let get = |key: &str| {
        rows.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| panic!("missing row {key}"))
    };
    assert_eq!(get("l1.hits"), "5");
    assert_eq!(get("l1.hit_rate"), "0.500000");
    assert_eq!(get("accesses"), "10");
    assert!(!rows.iter().any(|(k, _)| k.starts_with("l2.")), "no L2 configured");
}
