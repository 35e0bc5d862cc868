//! Adaptive prefetch controller.
//!
//! Combines the stream buffer and the stride predictor behind one set of
//! hierarchy callbacks:
//! - `on_access`: every demand access; probe the stream buffer, feed the
//!   stride predictor, confirm outstanding prefetches, and (when adaptive)
//!   adjust the distance at window boundaries.
//! - `on_miss`: demand misses; refill the stream buffer ahead of the miss.
//! - `on_evict`: a block left the cache, so its prefetch can no longer be
//!   confirmed.
//!
//! Effectiveness is confirmed / issued over a window of
//! [`defaults::PREFETCH_WINDOW`] accesses. At each boundary the distance
//! doubles when effectiveness is high (falling back to +1 near the cap) and
//! halves when low (falling back to −1 near the floor).

use std::collections::HashSet;

use tracing::debug;

use crate::common::Addr;
use crate::config::{PrefetchConfig, defaults};
use crate::prefetch::{StreamBuffer, StridePredictor};
use crate::stats::PrefetchStats;

/// Ceiling on remembered-but-unconfirmed prefetches.
const OUTSTANDING_CAP: usize = 8192;

/// Stream + stride prefetcher with optional distance adaptation.
#[derive(Debug)]
pub struct AdaptivePrefetcher {
    stream: StreamBuffer,
    stride: Option<StridePredictor>,
    adaptive: bool,
    block_shift: u32,
    distance: usize,
    d_min: usize,
    d_max: usize,
    window: u64,
    window_accesses: u64,
    window_issued: u64,
    window_confirmed: u64,
    /// Block numbers prefetched or predicted, awaiting first demand use.
    outstanding: HashSet<u64>,
    issued: u64,
    confirmed: u64,
    adjustments: u64,
}

impl AdaptivePrefetcher {
    /// Creates a prefetcher for blocks of `block_size` bytes.
    pub fn new(config: &PrefetchConfig, block_size: usize) -> Self {
        let distance = config.distance.max(defaults::PREFETCH_DISTANCE_MIN);
        Self {
            stream: StreamBuffer::new(distance),
            stride: config
                .stride_prediction
                .then(|| StridePredictor::new(defaults::STRIDE_TABLE_SIZE)),
            adaptive: config.adaptive,
            block_shift: block_size.trailing_zeros(),
            distance,
            d_min: defaults::PREFETCH_DISTANCE_MIN,
            d_max: defaults::PREFETCH_DISTANCE_MAX,
            window: defaults::PREFETCH_WINDOW as u64,
            window_accesses: 0,
            window_issued: 0,
            window_confirmed: 0,
            outstanding: HashSet::new(),
            issued: 0,
            confirmed: 0,
            adjustments: 0,
        }
    }

    #[inline]
    fn block_of(&self, addr: Addr) -> u64 {
        u64::from(addr) >> self.block_shift
    }

    #[inline]
    fn byte_of(&self, block: u64) -> Option<Addr> {
        let byte = block << self.block_shift;
        (byte <= u64::from(Addr::MAX)).then_some(byte as Addr)
    }

    /// Observes a demand access (hit or miss).
    ///
    /// Returns stride-predicted byte addresses the hierarchy should install.
    pub fn on_access(&mut self, addr: Addr) -> Vec<Addr> {
        let block = self.block_of(addr);

        if self.outstanding.remove(&block) {
            self.confirmed += 1;
            self.window_confirmed += 1;
        }

        if self.stream.access(block) {
            self.stream.shift();
        }

        let mut targets = Vec::new();
        if let Some(stride) = &mut self.stride {
            if let Some(predicted) = stride.observe(addr) {
                targets.push(predicted);
            }
        }

        self.window_accesses += 1;
        if self.adaptive && self.window_accesses >= self.window {
            self.adjust_distance();
        }
        targets
    }

    /// Observes a demand miss; refills the stream buffer starting one block
    /// past the miss.
    ///
    /// Returns the byte addresses of the refilled run.
    pub fn on_miss(&mut self, addr: Addr) -> Vec<Addr> {
        let base = self.block_of(addr) + 1;
        self.stream
            .prefetch(base)
            .into_iter()
            .filter_map(|b| self.byte_of(b))
            .collect()
    }

    /// Records that a prefetch for `block_addr` was actually installed.
    pub fn note_issued(&mut self, block_addr: Addr) {
        self.issued += 1;
        self.window_issued += 1;
        if self.outstanding.len() >= OUTSTANDING_CAP {
            // The set is advisory; dropping stale entries only costs
            // confirmations.
            self.outstanding.clear();
        }
        let _inserted = self.outstanding.insert(self.block_of(block_addr));
    }

    /// Forgets a block that left the cache before being referenced.
    pub fn on_evict(&mut self, block_addr: Addr) {
        let _removed = self.outstanding.remove(&self.block_of(block_addr));
    }

    fn adjust_distance(&mut self) {
        let effectiveness = if self.window_issued == 0 {
            // Nothing issued this window; leave the distance alone.
            self.window_accesses = 0;
            self.window_confirmed = 0;
            return;
        } else {
            self.window_confirmed as f64 / self.window_issued as f64
        };

        let old = self.distance;
        if effectiveness >= defaults::PREFETCH_HIGH_THRESHOLD && self.distance < self.d_max {
            self.distance = if self.distance * 2 <= self.d_max {
                self.distance * 2
            } else {
                (self.distance + 1).min(self.d_max)
            };
        } else if effectiveness < defaults::PREFETCH_LOW_THRESHOLD && self.distance > self.d_min {
            self.distance = if self.distance / 2 >= self.d_min {
                self.distance / 2
            } else {
                (self.distance - 1).max(self.d_min)
            };
        }

        if self.distance != old {
            self.adjustments += 1;
            self.stream.set_depth(self.distance);
            debug!(
                effectiveness,
                old_distance = old,
                new_distance = self.distance,
                "prefetch distance adjusted"
            );
        }
        self.window_accesses = 0;
        self.window_issued = 0;
        self.window_confirmed = 0;
    }

    /// Current prefetch distance.
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PrefetchStats {
        PrefetchStats {
            issued: self.issued,
            confirmed: self.confirmed,
            stream_hits: self.stream.hits(),
            stream_accesses: self.stream.accesses(),
            distance: self.distance as u64,
            adjustments: self.adjustments,
        }
    }
}
