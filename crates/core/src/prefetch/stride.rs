//! Constant-stride predictor.
//!
//! A reference prediction table detecting constant strides per address
//! region. Trace records carry no program counter, so entries are keyed by
//! the 4 KiB region of the access: strided walks through an array share an
//! entry while unrelated regions stay apart.
//!
//! Each entry tracks the last address, the last observed stride, and a
//! saturating confidence counter. A prediction is emitted only once the
//! same nonzero stride has repeated (confidence ≥ 2).

use crate::common::Addr;

/// Confidence ceiling (2-bit saturating counter).
const CONFIDENCE_MAX: u8 = 3;

/// Confidence required before predictions are emitted.
const CONFIDENCE_THRESHOLD: u8 = 2;

/// Region granularity used as the table key (4 KiB).
const REGION_SHIFT: u32 = 12;

#[derive(Clone, Copy, Debug, Default)]
struct StrideEntry {
    last: Addr,
    stride: i64,
    confidence: u8,
    live: bool,
}

/// Per-region stride detection table.
#[derive(Debug)]
pub struct StridePredictor {
    table: Vec<StrideEntry>,
    mask: usize,
    predictions_issued: u64,
}

impl StridePredictor {
    /// Creates a predictor with `table_size` entries (rounded up to a power
    /// of two).
    pub fn new(table_size: usize) -> Self {
        let size = table_size.max(1).next_power_of_two();
        Self {
            table: vec![StrideEntry::default(); size],
            mask: size - 1,
            predictions_issued: 0,
        }
    }

    /// Observes a demand access; returns a predicted byte address once the
    /// region's stride is established.
    pub fn observe(&mut self, addr: Addr) -> Option<Addr> {
        let idx = ((addr >> REGION_SHIFT) as usize) & self.mask;
        let entry = &mut self.table[idx];

        if !entry.live {
            entry.live = true;
            entry.last = addr;
            entry.stride = 0;
            entry.confidence = 0;
            return None;
        }

        let observed = i64::from(addr) - i64::from(entry.last);
        let mut prediction = None;
        if observed == entry.stride && entry.stride != 0 {
            entry.confidence = (entry.confidence + 1).min(CONFIDENCE_MAX);
            if entry.confidence >= CONFIDENCE_THRESHOLD {
                let target = i64::from(addr) + entry.stride;
                // Predictions falling outside the 32-bit space are dropped.
                if (0..=i64::from(Addr::MAX)).contains(&target) {
                    self.predictions_issued += 1;
                    prediction = Some(target as Addr);
                }
            }
        } else {
            entry.stride = observed;
            entry.confidence = 0;
        }
        entry.last = addr;
        prediction
    }

    /// Predictions emitted so far.
    pub fn predictions_issued(&self) -> u64 {
        self.predictions_issued
    }

    /// Forgets all history.
    pub fn reset(&mut self) {
        self.table.fill(StrideEntry::default());
        self.predictions_issued = 0;
    }
}
