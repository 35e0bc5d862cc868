//! Configuration parsing and validation tests.

use cachesim_core::config::{
    InterconnectKind, ReplacementPolicyKind, SimConfig, WritePolicyKind, defaults,
};
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Parsing and defaults
// ══════════════════════════════════════════════════════════

/// An empty object yields the documented defaults.
#[test]
fn empty_object_is_all_defaults() {
    let config = SimConfig::from_json("{}").expect("valid");
    assert_eq!(config.l1.size, defaults::L1_SIZE);
    assert_eq!(config.l1.associativity, defaults::L1_ASSOCIATIVITY);
    assert_eq!(config.l1.block_size, defaults::BLOCK_SIZE);
    assert_eq!(config.l1.replacement_policy, ReplacementPolicyKind::Lru);
    assert_eq!(config.l1.write_policy, WritePolicyKind::WriteBack);
    assert!(config.l2.is_none());
    assert!(!config.victim_cache.enabled);
    assert!(!config.multiprocessor.enabled);
    assert!(!config.strict);
}

/// The documented keys round-trip into the right fields.
#[test]
fn full_config_parses() {
    let json = r#"{
        "l1": {
            "size": 1024,
            "associativity": 2,
            "blockSize": 32,
            "replacementPolicy": "PLRU",
            "writePolicy": "WriteThrough",
            "writeAllocate": true,
            "prefetching": {
                "enabled": true,
                "distance": 8,
                "adaptive": true,
                "stridePrediction": true
            }
        },
        "l2": { "size": 8192, "associativity": 4, "blockSize": 32 },
        "victimCache": { "enabled": true, "size": 8 },
        "multiprocessor": {
            "enabled": true,
            "numProcessors": 4,
            "coherenceProtocol": "MESI",
            "interconnect": "Mesh",
            "interconnectLatency": 3
        },
        "writeCombining": { "enabled": true, "bufferSize": 4, "timeout": 16 },
        "strict": true
    }"#;
    let config = SimConfig::from_json(json).expect("valid");
    assert_eq!(config.l1.replacement_policy, ReplacementPolicyKind::Plru);
    assert_eq!(config.l1.write_policy, WritePolicyKind::WriteThrough);
    assert_eq!(config.l1.write_allocate, Some(true));
    assert!(config.l1.allocates_on_write());
    assert!(config.l1.prefetching.stride_prediction);
    assert_eq!(config.l2.as_ref().map(|l| l.size), Some(8192));
    assert_eq!(config.victim_cache.size, 8);
    assert_eq!(config.multiprocessor.num_processors, 4);
    assert_eq!(config.multiprocessor.interconnect, InterconnectKind::Mesh);
    assert_eq!(config.write_combining.buffer_size, 4);
    assert!(config.strict);
}

/// Policy names accept both canonical uppercase and mixed-case aliases.
#[test]
fn policy_names_accept_aliases() {
    for (name, expected) in [
        ("\"LRU\"", ReplacementPolicyKind::Lru),
        ("\"Lru\"", ReplacementPolicyKind::Lru),
        ("\"FIFO\"", ReplacementPolicyKind::Fifo),
        ("\"Random\"", ReplacementPolicyKind::Random),
        ("\"NRU\"", ReplacementPolicyKind::Nru),
        ("\"MRU\"", ReplacementPolicyKind::Mru),
    ] {
        let json = format!(r#"{{ "l1": {{ "replacementPolicy": {name} }} }}"#);
        let config = SimConfig::from_json(&json).expect("valid");
        assert_eq!(config.l1.replacement_policy, expected, "{name}");
    }
}

/// Write-back pairs with allocate, write-through with no-allocate, unless
/// overridden.
#[test]
fn allocate_defaults_follow_write_policy() {
    let back = SimConfig::from_json(r#"{ "l1": { "writePolicy": "WriteBack" } }"#).unwrap();
    assert!(back.l1.allocates_on_write());
    let through = SimConfig::from_json(r#"{ "l1": { "writePolicy": "WriteThrough" } }"#).unwrap();
    assert!(!through.l1.allocates_on_write());
}

/// Derived geometry: sets = size / (ways × block).
#[test]
fn num_sets_derivation() {
    let config =
        SimConfig::from_json(r#"{ "l1": { "size": 256, "associativity": 2, "blockSize": 64 } }"#)
            .unwrap();
    assert_eq!(config.l1.num_sets(), 2);
}

// ══════════════════════════════════════════════════════════
// 2. Validation failures name the offending key
// ══════════════════════════════════════════════════════════

#[test]
fn rejects_non_power_of_two_size() {
    let err = SimConfig::from_json(r#"{ "l1": { "size": 300 } }"#).unwrap_err();
    assert_eq!(err.key, "l1.size");
}

#[test]
fn rejects_oversized_associativity() {
    let err = SimConfig::from_json(
        r#"{ "l1": { "size": 128, "associativity": 4, "blockSize": 64 } }"#,
    )
    .unwrap_err();
    assert_eq!(err.key, "l1.associativity");
}

#[test]
fn rejects_zero_prefetch_distance() {
    let err = SimConfig::from_json(
        r#"{ "l1": { "prefetching": { "enabled": true, "distance": 0 } } }"#,
    )
    .unwrap_err();
    assert_eq!(err.key, "l1.prefetching.distance");
}

#[test]
fn rejects_bad_l2_under_its_own_prefix() {
    let err = SimConfig::from_json(r#"{ "l2": { "blockSize": 48 } }"#).unwrap_err();
    assert_eq!(err.key, "l2.blockSize");
}

#[test]
fn rejects_processor_count_out_of_range() {
    let err = SimConfig::from_json(
        r#"{ "multiprocessor": { "enabled": true, "numProcessors": 65 } }"#,
    )
    .unwrap_err();
    assert_eq!(err.key, "multiprocessor.numProcessors");
}

#[test]
fn rejects_empty_enabled_victim_cache() {
    let err =
        SimConfig::from_json(r#"{ "victimCache": { "enabled": true, "size": 0 } }"#).unwrap_err();
    assert_eq!(err.key, "victimCache.size");
}

#[test]
fn rejects_unknown_keys() {
    assert!(SimConfig::from_json(r#"{ "l9": {} }"#).is_err());
    assert!(SimConfig::from_json(r#"{ "l1": { "sizeBytes": 64 } }"#).is_err());
}

#[test]
fn rejects_unknown_policy_name() {
    let err = SimConfig::from_json(r#"{ "l1": { "replacementPolicy": "CLOCK" } }"#).unwrap_err();
    assert!(err.to_string().contains("CLOCK") || !err.reason.is_empty());
}
