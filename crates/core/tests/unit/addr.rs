//! Address decoder unit tests.
//!
//! Verifies the (tag, set index, offset) decomposition and its encode
//! round-trip across geometries, including the degenerate block-size-1 and
//! single-set cases.

use cachesim_core::common::AddressDecoder;
use proptest::prelude::*;

// ══════════════════════════════════════════════════════════
// 1. Bit slicing
// ══════════════════════════════════════════════════════════

/// 64-byte blocks and 2 sets: offset is the low 6 bits, the set index the
/// next bit, the tag the rest.
#[test]
fn decodes_tag_set_offset() {
    let decoder = AddressDecoder::new(64, 2);
    let d = decoder.decode(0x1234);
    assert_eq!(d.offset, 0x34);
    assert_eq!(d.set_index, (0x1234 >> 6) & 1);
    assert_eq!(d.tag, 0x1234 >> 7);
}

/// Block size 1: every byte is its own block and the offset is always 0.
#[test]
fn block_size_one_has_no_offset_bits() {
    let decoder = AddressDecoder::new(1, 64);
    let d = decoder.decode(0xABCD);
    assert_eq!(d.offset, 0);
    assert_eq!(d.set_index, 0xABCD & 63);
    assert_eq!(d.tag, 0xABCD >> 6);
}

/// A single set contributes no index bits.
#[test]
fn single_set_has_no_index_bits() {
    let decoder = AddressDecoder::new(64, 1);
    let d = decoder.decode(0xFFFF_FFC0);
    assert_eq!(d.set_index, 0);
    assert_eq!(d.tag, 0xFFFF_FFC0 >> 6);
}

/// `block_base` zeroes exactly the offset bits.
#[test]
fn block_base_zeroes_offset() {
    let decoder = AddressDecoder::new(64, 4);
    assert_eq!(decoder.block_base(0x12F7), 0x12C0);
    assert_eq!(decoder.block_base(0x12C0), 0x12C0);
}

/// `block_addr` reconstructs the base address an evicted block came from.
#[test]
fn block_addr_reconstructs_eviction_address() {
    let decoder = AddressDecoder::new(64, 2);
    let d = decoder.decode(0x1040);
    assert_eq!(decoder.block_addr(d.tag, d.set_index), 0x1040);
}

// ══════════════════════════════════════════════════════════
// 2. Round-trip property
// ══════════════════════════════════════════════════════════

proptest! {
    /// encode(decode(a)) == a for every address and power-of-two geometry.
    #[test]
    fn roundtrip(addr in any::<u32>(), block_log in 0u32..8, set_log in 0u32..10) {
        let decoder = AddressDecoder::new(1 << block_log, 1 << set_log);
        let decoded = decoder.decode(addr);
        prop_assert_eq!(decoder.encode(decoded), addr);
    }

    /// The decomposition never loses bits: offset < block, set < sets.
    #[test]
    fn components_in_range(addr in any::<u32>(), block_log in 0u32..8, set_log in 0u32..10) {
        let decoder = AddressDecoder::new(1 << block_log, 1 << set_log);
        let d = decoder.decode(addr);
        prop_assert!(d.offset < 1 << block_log);
        prop_assert!(d.set_index < 1 << set_log);
    }
}

// ══════════════════════════════════════════════════════════
// 3. Invalid geometry
// ══════════════════════════════════════════════════════════

/// Non-power-of-two geometry is a construction bug, caught loudly.
#[test]
#[should_panic(expected = "power of two")]
fn non_power_of_two_block_panics() {
    let _ = AddressDecoder::new(48, 2);
}
