//! Address decomposition for set-associative caches.
//!
//! This module defines the address arithmetic shared by every cache level:
//! 1. **Decoding:** Splitting a byte address into (tag, set index, block offset)
//!    for a given block size and set count.
//! 2. **Encoding:** The inverse operation, used to reconstruct block base
//!    addresses for victim-cache entries and writebacks.
//!
//! Both block size and set count must be powers of two, so the decomposition
//! is pure bit slicing: the offset occupies the low `log2(block)` bits, the
//! set index the next `log2(sets)` bits, and the tag the remainder.

/// A byte address in the simulated address space.
///
/// Traces address a 32-bit space; all internal address arithmetic uses this
/// alias so the width is stated in one place.
pub type Addr = u32;

/// An address split into its cache-indexing components.
///
/// Produced by [`AddressDecoder::decode`]; satisfies the round-trip invariant
/// `decoder.encode(decoded) == addr` for every address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddr {
    /// High-order bits distinguishing which block occupies a way.
    pub tag: Addr,
    /// Index of the set this address maps to.
    pub set_index: usize,
    /// Byte offset within the block.
    pub offset: usize,
}

/// Splits addresses into (tag, set index, offset) for one cache geometry.
///
/// Constructed once per cache from its block size and set count; decoding is
/// two shifts and two masks.
#[derive(Clone, Copy, Debug)]
pub struct AddressDecoder {
    offset_bits: u32,
    index_bits: u32,
    offset_mask: Addr,
    index_mask: Addr,
}

impl AddressDecoder {
    /// Creates a decoder for the given geometry.
    ///
    /// # Arguments
    ///
    /// * `block_size` - Block size in bytes. Must be a power of two.
    /// * `num_sets` - Number of sets. Must be a power of two.
    ///
    /// # Panics
    ///
    /// Panics if either argument is zero or not a power of two. Geometry is
    /// validated at configuration time; violating this here is a bug.
    pub fn new(block_size: usize, num_sets: usize) -> Self {
        assert!(
            block_size.is_power_of_two() && num_sets.is_power_of_two(),
            "cache geometry must be a power of two (block={block_size}, sets={num_sets})"
        );
        let offset_bits = block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        Self {
            offset_bits,
            index_bits,
            offset_mask: (block_size as Addr).wrapping_sub(1),
            index_mask: (num_sets as Addr).wrapping_sub(1),
        }
    }

    /// Splits an address into (tag, set index, offset).
    #[inline(always)]
    pub fn decode(&self, addr: Addr) -> DecodedAddr {
        DecodedAddr {
            tag: addr >> (self.offset_bits + self.index_bits),
            set_index: ((addr >> self.offset_bits) & self.index_mask) as usize,
            offset: (addr & self.offset_mask) as usize,
        }
    }

    /// Reassembles an address from its components.
    ///
    /// Inverse of [`decode`](Self::decode):
    /// `(tag << (ob + ib)) | (set_index << ob) | offset`.
    #[inline(always)]
    pub fn encode(&self, decoded: DecodedAddr) -> Addr {
        (decoded.tag << (self.offset_bits + self.index_bits))
            | ((decoded.set_index as Addr) << self.offset_bits)
            | decoded.offset as Addr
    }

    /// Returns the base address of the block containing `addr` (offset zeroed).
    #[inline(always)]
    pub fn block_base(&self, addr: Addr) -> Addr {
        addr & !self.offset_mask
    }

    /// Reconstructs a block base address from a tag and set index.
    ///
    /// Used when evicting: the stored tag plus the set the block sat in is
    /// enough to name the block for the victim cache or the next level.
    #[inline(always)]
    pub fn block_addr(&self, tag: Addr, set_index: usize) -> Addr {
        (tag << (self.offset_bits + self.index_bits)) | ((set_index as Addr) << self.offset_bits)
    }

    /// Block size in bytes.
    #[inline(always)]
    pub fn block_size(&self) -> usize {
        1usize << self.offset_bits
    }

    /// Number of sets.
    #[inline(always)]
    pub fn num_sets(&self) -> usize {
        1usize << self.index_bits
    }
}
