//! Tree-based Pseudo-LRU (PLRU) replacement.
//!
//! Approximates LRU with a binary tree of W-1 decision bits per set. Each
//! bit points toward the subtree that was used *less* recently. An access
//! flips the bits on its root-to-leaf path to point away from the accessed
//! way; a victim lookup walks the tree following the bits.
//!
//! # Performance
//!
//! - `touch()` / `victim()`: O(log W).
//! - Space: W-1 bits per set (stored as `Vec<bool>` heap-indexed from 1).
//! - Worst case: pathological interleavings can evict a recently-used way,
//!   which exact LRU would not.

/// Per-set tree-PLRU state.
#[derive(Clone, Debug)]
pub struct PlruState {
    /// Heap-indexed decision bits; node 1 is the root, nodes `ways..2*ways`
    /// are the leaves. `false` points left, `true` points right.
    bits: Vec<bool>,
    ways: usize,
    levels: u32,
}

impl PlruState {
    /// Creates state for a set of `ways` ways (a power of two).
    pub fn new(ways: usize) -> Self {
        debug_assert!(ways.is_power_of_two());
        Self {
            bits: vec![false; 2 * ways],
            ways,
            levels: ways.trailing_zeros(),
        }
    }

    /// Repoints the path bits away from the accessed way.
    pub fn touch(&mut self, way: usize) {
        let mut node = 1;
        for level in (0..self.levels).rev() {
            let went_right = (way >> level) & 1 == 1;
            // Point toward the sibling of the branch we take.
            self.bits[node] = !went_right;
            node = node * 2 + usize::from(went_right);
        }
    }

    /// Walks the tree following the decision bits to the pseudo-LRU way.
    ///
    /// Ties (untouched subtrees, bits still `false`) resolve to the lowest
    /// index because `false` points left.
    pub fn victim(&self) -> usize {
        let mut node = 1;
        for _ in 0..self.levels {
            node = node * 2 + usize::from(self.bits[node]);
        }
        node - self.ways
    }

    /// Clears every decision bit.
    pub fn reset(&mut self) {
        self.bits.fill(false);
    }
}
