//! Processor core.
//!
//! One simulated core: a handle to its private L1 (shared with the
//! directory, which delivers invalidations through it), a handle to the
//! directory, and a per-core latency accumulator.
//!
//! The access path checks the line's local state first: a hit in a
//! compatible state needs no coherence traffic. Otherwise the core consults
//! `directory.can` and, when permission is missing, issues a request whose
//! returned latency joins the access latency. The core never holds its L1
//! lock while calling the directory; that ordering is what keeps the
//! directory's `table → slot` lock order acyclic.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::cache::WriteCombiningBuffer;
use crate::coherence::{
    CoherenceDirectory, CoherenceRequest, CoreSlot, MesiState, RequestKind,
};
use crate::common::Addr;
use crate::config::defaults;
use crate::interconnect::Interconnect;
use crate::stats::{CoreStats, WriteCombiningStats};

/// One core plus its coherence client.
#[derive(Debug)]
pub struct ProcessorCore {
    id: usize,
    slot: Arc<CoreSlot>,
    directory: Arc<CoherenceDirectory>,
    fabric: Arc<Interconnect>,
    write_buffer: Option<WriteCombiningBuffer>,
    /// Set by an acquire barrier: the next read consults the directory even
    /// on a locally valid line.
    recheck_reads: bool,
    stats: CoreStats,
}

impl ProcessorCore {
    /// Wires a core to its slot, the directory, and the fabric.
    pub fn new(
        id: usize,
        slot: Arc<CoreSlot>,
        directory: Arc<CoherenceDirectory>,
        fabric: Arc<Interconnect>,
        write_buffer: Option<WriteCombiningBuffer>,
    ) -> Self {
        Self {
            id,
            slot,
            directory,
            fabric,
            write_buffer,
            recheck_reads: false,
            stats: CoreStats::default(),
        }
    }

    /// Core id (also its fabric node id).
    pub fn id(&self) -> usize {
        self.id
    }

    /// Issues one access from this core's trace; returns whether L1 hit.
    pub fn access(&mut self, addr: Addr, is_write: bool) -> bool {
        self.stats.accesses += 1;
        if is_write {
            self.stats.writes += 1;
        } else {
            self.stats.reads += 1;
        }

        let fill_state = self.ensure_permission(addr, is_write);

        let hit = {
            let mut l1 = self.slot.l1.lock().expect("core L1 poisoned");
            let result = l1.access_with_fill(addr, is_write, fill_state);
            result.hit
        };

        if hit {
            self.stats.hits += 1;
            self.stats.cycles = self.stats.cycles.saturating_add(defaults::HIT_CYCLES);
        } else {
            self.stats.misses += 1;
            self.stats.cycles = self.stats.cycles.saturating_add(defaults::MISS_PENALTY);
        }

        if is_write {
            if let Some(wb) = &mut self.write_buffer {
                let block = {
                    let l1 = self.slot.l1.lock().expect("core L1 poisoned");
                    l1.decoder().block_base(addr)
                };
                // Flushed writes terminate at the abstract memory; only the
                // counters observe them.
                let _ = wb.record_write(block);
            }
        }
        if let Some(wb) = &mut self.write_buffer {
            let _ = wb.note_access();
        }

        self.drain_messages();
        hit
    }

    /// Read-modify-write: acquires M ownership, performs the access, and
    /// leaves the line Modified. Counts as a write.
    ///
    /// Ordering against concurrent traffic for the line comes from the
    /// directory's table lock: the grant and the peer invalidations happen
    /// atomically with respect to other requests.
    pub fn atomic_access(&mut self, addr: Addr) -> bool {
        self.stats.accesses += 1;
        self.stats.writes += 1;

        if !self.directory.can(self.id, addr, true) {
            self.stats.coherence_misses += 1;
            let response = self.directory.process_request(CoherenceRequest {
                core: self.id,
                address: addr,
                kind: RequestKind::Write,
                timestamp: self.stats.cycles,
            });
            self.stats.cycles = self.stats.cycles.saturating_add(response.latency);
        }

        let hit = {
            let mut l1 = self.slot.l1.lock().expect("core L1 poisoned");
            l1.access_with_fill(addr, true, MesiState::Modified).hit
        };
        if hit {
            self.stats.hits += 1;
            self.stats.cycles = self.stats.cycles.saturating_add(defaults::HIT_CYCLES);
        } else {
            self.stats.misses += 1;
            self.stats.cycles = self.stats.cycles.saturating_add(defaults::MISS_PENALTY);
        }
        self.drain_messages();
        hit
    }

    /// Memory barrier.
    ///
    /// `release` drains pending writes: the write-combining buffer flushes,
    /// and, because directory requests complete synchronously, every
    /// write this core issued is already acknowledged. `acquire` forces the
    /// next read to re-check permission with the directory even if the line
    /// is locally valid.
    pub fn memory_barrier(&mut self, acquire: bool, release: bool) {
        if release {
            if let Some(wb) = &mut self.write_buffer {
                let _ = wb.flush();
            }
        }
        if acquire {
            self.recheck_reads = true;
        }
    }

    /// Checks local then directory permission, issuing a request when
    /// needed; returns the state a missing line should fill in.
    fn ensure_permission(&mut self, addr: Addr, is_write: bool) -> MesiState {
        let local = {
            let l1 = self.slot.l1.lock().expect("core L1 poisoned");
            l1.line_state(addr)
        };
        let force_check = !is_write && std::mem::take(&mut self.recheck_reads);
        let locally_ok = !force_check
            && local.is_some_and(|st| {
                if is_write {
                    st.permits_write()
                } else {
                    st.permits_read()
                }
            });
        if locally_ok {
            return local.unwrap_or(MesiState::Exclusive);
        }

        if self.directory.can(self.id, addr, is_write) {
            // Permission is already on file (an acquire re-check, or a line
            // granted but since evicted locally). Re-fill in the state the
            // directory records.
            return self
                .directory
                .entry_view(addr)
                .map_or(MesiState::Exclusive, |e| {
                    if e.sharers.contains(&self.id) {
                        MesiState::Shared
                    } else if e.state == MesiState::Modified && !is_write {
                        // The dirty copy was written back when it left the
                        // L1; a read refill is clean.
                        MesiState::Exclusive
                    } else {
                        e.state
                    }
                });
        }

        self.stats.coherence_misses += 1;
        let kind = if is_write {
            RequestKind::Write
        } else {
            RequestKind::Read
        };
        let response = self.directory.process_request(CoherenceRequest {
            core: self.id,
            address: addr,
            kind,
            timestamp: self.stats.cycles,
        });
        self.stats.cycles = self.stats.cycles.saturating_add(response.latency);
        response.new_state
    }

    /// Empties this core's fabric queue (grants, data, invalidation
    /// orders already applied synchronously).
    fn drain_messages(&mut self) {
        while self.fabric.recv(self.id).is_some() {}
    }

    /// Write-combining counters, when this core carries a buffer.
    pub fn write_combining_stats(&self) -> Option<WriteCombiningStats> {
        self.write_buffer.as_ref().map(|wb| *wb.stats())
    }

    /// Per-core tallies, folding in invalidations delivered by peers.
    pub fn stats(&self) -> CoreStats {
        let mut stats = self.stats;
        stats.invalidations_received = self
            .slot
            .invalidations_received
            .load(Ordering::Relaxed);
        stats
    }

    /// This core's slot (shared with the directory).
    pub fn slot(&self) -> &Arc<CoreSlot> {
        &self.slot
    }
}
