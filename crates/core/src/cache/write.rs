//! Write-combining buffer.
//!
//! Holds up to K pending writes on the L1 → next-level path; writes to the
//! same block coalesce into one entry. The buffer flushes whole:
//! 1. on overflow (a K+1-th distinct block arrives),
//! 2. on timeout, measured in processed accesses since the buffer last
//!    changed (never wall-clock), and
//! 3. on any read to a block currently pending.

use crate::common::Addr;
use crate::stats::WriteCombiningStats;

/// Pending write entry: one block plus how many writes folded into it.
#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    block_addr: Addr,
    writes: u64,
}

/// Coalescing buffer for writes headed to the next level.
#[derive(Debug)]
pub struct WriteCombiningBuffer {
    entries: Vec<PendingWrite>,
    capacity: usize,
    timeout: u64,
    /// Accesses processed since the buffer last changed.
    idle_accesses: u64,
    stats: WriteCombiningStats,
}

impl WriteCombiningBuffer {
    /// Creates a buffer of `capacity` blocks flushing after `timeout` idle
    /// accesses.
    pub fn new(capacity: usize, timeout: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            timeout,
            idle_accesses: 0,
            stats: WriteCombiningStats::default(),
        }
    }

    /// Records a write to `block_addr`.
    ///
    /// Coalesces into an existing entry when possible. On overflow the
    /// existing entries are flushed and returned (the new write stays
    /// buffered).
    pub fn record_write(&mut self, block_addr: Addr) -> Vec<Addr> {
        self.idle_accesses = 0;
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.block_addr == block_addr)
        {
            entry.writes += 1;
            self.stats.coalesced += 1;
            return Vec::new();
        }
        let flushed = if self.entries.len() == self.capacity {
            self.flush()
        } else {
            Vec::new()
        };
        self.entries.push(PendingWrite {
            block_addr,
            writes: 1,
        });
        flushed
    }

    /// Notes one processed access; flushes when the buffer has sat
    /// untouched for the configured timeout.
    pub fn note_access(&mut self) -> Vec<Addr> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.idle_accesses += 1;
        if self.idle_accesses >= self.timeout {
            self.flush()
        } else {
            Vec::new()
        }
    }

    /// Flushes the buffer if `block_addr` is pending (a read is about to
    /// observe it).
    pub fn intersect_read(&mut self, block_addr: Addr) -> Vec<Addr> {
        if self.entries.iter().any(|e| e.block_addr == block_addr) {
            self.flush()
        } else {
            Vec::new()
        }
    }

    /// Drains every pending block for forwarding to the next level.
    pub fn flush(&mut self) -> Vec<Addr> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        self.idle_accesses = 0;
        self.stats.flushes += 1;
        self.stats.flushed_writes += self.entries.len() as u64;
        self.entries.drain(..).map(|e| e.block_addr).collect()
    }

    /// Number of pending blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Coalescing and flush counters.
    pub fn stats(&self) -> &WriteCombiningStats {
        &self.stats
    }
}
