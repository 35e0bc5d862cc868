//! Not Recently Used (NRU) replacement.
//!
//! One reference bit per way. Accesses set the bit; when every valid way has
//! its bit set, all bits are cleared globally and only the current way is
//! re-marked. The victim is the lowest way whose bit is clear.

use super::ValidMask;

/// Per-set NRU state.
#[derive(Clone, Debug)]
pub struct NruState {
    referenced: Vec<bool>,
}

impl NruState {
    /// Creates state for a set of `ways` ways, all bits clear.
    pub fn new(ways: usize) -> Self {
        Self {
            referenced: vec![false; ways],
        }
    }

    /// Sets the reference bit for `way`, clearing all bits first if the set
    /// would otherwise be saturated.
    pub fn touch(&mut self, way: usize) {
        self.referenced[way] = true;
        if self.referenced.iter().all(|&r| r) {
            self.referenced.fill(false);
            self.referenced[way] = true;
        }
    }

    /// Returns the lowest valid way with a clear reference bit.
    ///
    /// If every candidate is referenced (possible when invalid ways hold the
    /// clear bits), clears all bits and returns the lowest valid way.
    pub fn victim(&mut self, valid: &ValidMask) -> usize {
        for way in 0..self.referenced.len() {
            if valid.get(way) && !self.referenced[way] {
                return way;
            }
        }
        self.referenced.fill(false);
        (0..self.referenced.len())
            .find(|&w| valid.get(w))
            .unwrap_or(0)
    }

    /// Clears every reference bit.
    pub fn reset(&mut self) {
        self.referenced.fill(false);
    }
}
