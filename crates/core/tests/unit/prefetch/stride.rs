//! Stride predictor unit tests.

use cachesim_core::prefetch::StridePredictor;

// ══════════════════════════════════════════════════════════
// 1. Confidence ramp
// ══════════════════════════════════════════════════════════

/// Predictions start once the same stride has repeated twice (confidence 2).
#[test]
fn predicts_after_two_confirmations() {
    let mut sp = StridePredictor::new(64);
    assert_eq!(sp.observe(0x1000), None, "first touch only records");
    assert_eq!(sp.observe(0x1040), None, "stride learned, confidence 0");
    assert_eq!(sp.observe(0x1080), None, "confidence 1");
    assert_eq!(sp.observe(0x10c0), Some(0x1100), "confidence 2 predicts");
    assert_eq!(sp.observe(0x1100), Some(0x1140));
    assert_eq!(sp.predictions_issued(), 2);
}

/// Negative strides predict downward.
#[test]
fn negative_stride_predicts_downward() {
    let mut sp = StridePredictor::new(64);
    let _ = sp.observe(0x1300);
    let _ = sp.observe(0x12c0);
    let _ = sp.observe(0x1280);
    assert_eq!(sp.observe(0x1240), Some(0x1200));
}

/// A zero stride (repeated address) never predicts.
#[test]
fn zero_stride_never_predicts() {
    let mut sp = StridePredictor::new(64);
    for _ in 0..8 {
        assert_eq!(sp.observe(0x2000), None);
    }
    assert_eq!(sp.predictions_issued(), 0);
}

// ══════════════════════════════════════════════════════════
// 2. Stride breaks
// ══════════════════════════════════════════════════════════

/// A broken stride resets confidence; prediction resumes only after the
/// new stride repeats.
#[test]
fn broken_stride_resets_confidence() {
    let mut sp = StridePredictor::new(64);
    let _ = sp.observe(0x1000);
    let _ = sp.observe(0x1040);
    let _ = sp.observe(0x1080);
    assert!(sp.observe(0x10c0).is_some());
    // Jump within the same region breaks the pattern.
    assert_eq!(sp.observe(0x1008), None);
    assert_eq!(sp.observe(0x1048), None, "new stride recorded");
    assert_eq!(sp.observe(0x1088), None, "confidence 1");
    assert_eq!(sp.observe(0x10c8), Some(0x1108), "re-established");
}

/// Accesses in different 4 KiB regions use independent table entries.
#[test]
fn regions_are_independent() {
    let mut sp = StridePredictor::new(64);
    // Interleave two strided streams, one per region.
    let _ = sp.observe(0x1000);
    let _ = sp.observe(0x5000);
    let _ = sp.observe(0x1040);
    let _ = sp.observe(0x5080);
    let _ = sp.observe(0x1080);
    let _ = sp.observe(0x5100);
    assert_eq!(sp.observe(0x10c0), Some(0x1100));
    assert_eq!(sp.observe(0x5180), Some(0x5200));
}

/// Predictions that would leave the 32-bit space are suppressed.
#[test]
fn out_of_range_prediction_dropped() {
    let mut sp = StridePredictor::new(64);
    let top = 0xFFFF_F000u32;
    let _ = sp.observe(top);
    let _ = sp.observe(top + 0x400);
    let _ = sp.observe(top + 0x800);
    assert_eq!(sp.observe(top + 0xC00), None, "0x1_0000_0000 is unreachable");
}
