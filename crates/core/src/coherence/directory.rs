//! Directory-based coherence controller.
//!
//! One [`DirectoryEntry`] per line arbitrates every read and write across
//! cores. The directory owns handles to each core's private L1 (the
//! [`CoreSlot`] table) and delivers invalidations and downgrades as direct
//! calls on the target core's cache, taking that core's lock for the
//! shortest possible window.
//!
//! Locking discipline (deadlock freedom):
//! - The entry table lock is taken only inside `process_request` / `can`.
//! - Per-core L1 locks are taken one at a time, and only while holding the
//!   entry table lock inside `process_request`; workers never hold their
//!   L1 lock while calling the directory, so the order `table → slot` is
//!   acyclic.
//! - No lock is held across interconnect sends; messages are collected
//!   under the lock and sent after it drops.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::cache::Cache;
use crate::coherence::mesi::MesiState;
use crate::common::Addr;
use crate::interconnect::{Interconnect, Message, MessageKind};
use crate::stats::DirectoryStats;

/// Directory-side handle to one core: its private L1 plus delivery
/// counters. Shared between the core's worker and the directory.
#[derive(Debug)]
pub struct CoreSlot {
    /// The core's private L1. Remote invalidations mutate it from the
    /// requesting worker's thread, so every mutation goes through this
    /// lock.
    pub l1: Mutex<Cache>,
    /// Invalidations delivered to this core by peers.
    pub invalidations_received: AtomicU64,
}

impl CoreSlot {
    /// Wraps a freshly built L1.
    pub fn new(l1: Cache) -> Self {
        Self {
            l1: Mutex::new(l1),
            invalidations_received: AtomicU64::new(0),
        }
    }
}

/// Request kinds a core can issue to the directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Obtain read permission (fill in E or S).
    Read,
    /// Obtain write permission (fill or upgrade to M, invalidating peers).
    Write,
    /// Invalidate every other holder of the line.
    Invalidate,
    /// The owner wrote the line back; the directory copy is clean again.
    Writeback,
    /// The owner voluntarily downgrades its copy to Shared.
    Share,
    /// Evict the line from every cache and drop the entry.
    Flush,
}

/// One coherence request.
#[derive(Clone, Copy, Debug)]
pub struct CoherenceRequest {
    /// Requesting core.
    pub core: usize,
    /// Byte address (normalized to its line internally).
    pub address: Addr,
    /// What is being asked.
    pub kind: RequestKind,
    /// Requester's local cycle accumulator, stamped on messages.
    pub timestamp: u64,
}

/// Directory answer to a request.
#[derive(Clone, Debug)]
pub struct CoherenceResponse {
    /// Whether the request was honored (owner-only kinds can be refused).
    pub granted: bool,
    /// State the requester's copy should now hold.
    pub new_state: MesiState,
    /// Cores whose copies were invalidated on the requester's behalf.
    pub invalidated: Vec<usize>,
    /// Accumulated interconnect latency for every message involved.
    pub latency: u64,
}

/// Per-line directory record.
///
/// Invariants: `state = M ⇒ one owner, dirty`; `state = E ⇒ one owner,
/// clean`; `state = S ⇒ ≥ 1 sharer, clean`; `state = I ⇒ nobody`.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    /// Aggregate line state.
    pub state: MesiState,
    /// Owning core, set iff state ∈ {M, E}.
    pub owner: Option<usize>,
    /// Sharing cores, nonempty iff state = S.
    pub sharers: BTreeSet<usize>,
    /// Whether the owner's copy differs from memory (iff state = M).
    pub dirty: bool,
    /// Directory clock value at the last request touching this line.
    pub last_access_time: u64,
}

impl Default for DirectoryEntry {
    fn default() -> Self {
        Self {
            state: MesiState::Invalid,
            owner: None,
            sharers: BTreeSet::new(),
            dirty: false,
            last_access_time: 0,
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryTable {
    entries: HashMap<Addr, DirectoryEntry>,
    clock: u64,
}

#[derive(Debug, Default)]
struct DirectoryCounters {
    read_requests: AtomicU64,
    write_requests: AtomicU64,
    invalidations: AtomicU64,
    writebacks: AtomicU64,
    state_transitions: AtomicU64,
    coherence_messages: AtomicU64,
}

/// Directory-based coherence controller for one line-size domain.
#[derive(Debug)]
pub struct CoherenceDirectory {
    table: Mutex<DirectoryTable>,
    cores: Vec<Arc<CoreSlot>>,
    fabric: Arc<Interconnect>,
    /// Fabric node id of the directory (one past the last core).
    home: usize,
    line_mask: Addr,
    block_bytes: u64,
    counters: DirectoryCounters,
}

impl CoherenceDirectory {
    /// Creates a directory over the given core table and fabric.
    ///
    /// `block_size` must match the cores' L1 block size; it defines line
    /// granularity and data-transfer payloads.
    pub fn new(cores: Vec<Arc<CoreSlot>>, fabric: Arc<Interconnect>, block_size: usize) -> Self {
        let home = cores.len();
        Self {
            table: Mutex::new(DirectoryTable::default()),
            cores,
            fabric,
            home,
            line_mask: !((block_size as Addr) - 1),
            block_bytes: block_size as u64,
            counters: DirectoryCounters::default(),
        }
    }

    /// Fabric node id of the directory.
    pub fn home_node(&self) -> usize {
        self.home
    }

    /// Permission check: may core `i` perform this access without a
    /// request?
    ///
    /// A write needs `state = M ∧ owner = i`; a read needs ownership or
    /// membership in the sharer set.
    pub fn can(&self, core: usize, addr: Addr, is_write: bool) -> bool {
        let line = addr & self.line_mask;
        let table = self.table.lock().expect("directory table poisoned");
        let Some(entry) = table.entries.get(&line) else {
            return false;
        };
        if is_write {
            entry.state == MesiState::Modified && entry.owner == Some(core)
        } else {
            entry.owner == Some(core) || entry.sharers.contains(&core)
        }
    }

    /// Arbitrates one request, mutating directory state and peer caches,
    /// and returns the grant with its accumulated latency.
    pub fn process_request(&self, req: CoherenceRequest) -> CoherenceResponse {
        let line = req.address & self.line_mask;
        let mut latency = self.fabric.send(Message {
            source: req.core,
            dest: self.home,
            address: line,
            kind: MessageKind::CoherenceRequest,
            payload: 8,
            timestamp: req.timestamp,
            hop_count: 0,
        });
        self.bump_messages(1);

        // Messages generated by the decision are collected under the table
        // lock and sent after it drops.
        let mut outgoing: Vec<Message> = Vec::new();
        let response = {
            let mut table = self.table.lock().expect("directory table poisoned");
            table.clock += 1;
            let clock = table.clock;
            let entry = table.entries.entry(line).or_default();
            entry.last_access_time = clock;
            let before = entry.state;

            let mut response = match req.kind {
                RequestKind::Read => self.handle_read(req.core, line, entry, &mut outgoing, clock),
                RequestKind::Write => {
                    self.handle_write(req.core, line, entry, &mut outgoing, clock)
                }
                RequestKind::Invalidate => {
                    self.handle_invalidate(req.core, line, entry, &mut outgoing, clock)
                }
                RequestKind::Writeback => self.handle_writeback(req.core, entry),
                RequestKind::Share => self.handle_share(req.core, line, entry, &mut outgoing, clock),
                RequestKind::Flush => self.handle_flush(line, entry, &mut outgoing, clock),
            };

            if entry.state != before {
                let _ = self
                    .counters
                    .state_transitions
                    .fetch_add(1, Ordering::Relaxed);
                trace!(
                    line = format_args!("{line:#x}"),
                    from = %before.letter(),
                    to = %entry.state.letter(),
                    core = req.core,
                    "directory transition"
                );
            }

            // The grant itself.
            outgoing.push(Message {
                source: self.home,
                dest: req.core,
                address: line,
                kind: MessageKind::CoherenceResponse,
                payload: 8,
                timestamp: clock,
                hop_count: 0,
            });
            response.latency = 0;
            response
        };

        let count = outgoing.len() as u64;
        for msg in outgoing {
            latency += self.fabric.send(msg);
        }
        self.bump_messages(count);

        CoherenceResponse { latency, ..response }
    }

    fn handle_read(
        &self,
        core: usize,
        line: Addr,
        entry: &mut DirectoryEntry,
        outgoing: &mut Vec<Message>,
        clock: u64,
    ) -> CoherenceResponse {
        let _ = self.counters.read_requests.fetch_add(1, Ordering::Relaxed);
        match entry.state {
            MesiState::Invalid => {
                entry.state = MesiState::Exclusive;
                entry.owner = Some(core);
                entry.dirty = false;
                outgoing.push(self.data_to(core, line, clock));
                granted(MesiState::Exclusive, Vec::new())
            }
            MesiState::Exclusive | MesiState::Modified => {
                if entry.owner == Some(core) {
                    return granted(entry.state, Vec::new());
                }
                let owner = entry.owner.expect("E/M entry without owner");
                let was_modified = self.deliver_downgrade(owner, line);
                outgoing.push(self.order_to(owner, line, clock));
                outgoing.push(self.ack_from(owner, line, clock));
                if was_modified {
                    let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
                    // The dirty copy travels back to memory before the
                    // requester is filled.
                    outgoing.push(Message {
                        source: owner,
                        dest: self.home,
                        address: line,
                        kind: MessageKind::DataTransfer,
                        payload: self.block_bytes,
                        timestamp: clock,
                        hop_count: 0,
                    });
                }
                entry.state = MesiState::Shared;
                entry.dirty = false;
                entry.owner = None;
                entry.sharers.clear();
                let _ = entry.sharers.insert(owner);
                let _ = entry.sharers.insert(core);
                outgoing.push(self.data_to(core, line, clock));
                granted(MesiState::Shared, Vec::new())
            }
            MesiState::Shared => {
                let _ = entry.sharers.insert(core);
                outgoing.push(self.data_to(core, line, clock));
                granted(MesiState::Shared, Vec::new())
            }
        }
    }

    fn handle_write(
        &self,
        core: usize,
        line: Addr,
        entry: &mut DirectoryEntry,
        outgoing: &mut Vec<Message>,
        clock: u64,
    ) -> CoherenceResponse {
        let _ = self.counters.write_requests.fetch_add(1, Ordering::Relaxed);
        let mut invalidated = Vec::new();
        match entry.state {
            MesiState::Invalid => {
                outgoing.push(self.data_to(core, line, clock));
            }
            MesiState::Exclusive | MesiState::Modified => {
                if entry.owner != Some(core) {
                    let owner = entry.owner.expect("E/M entry without owner");
                    let was_modified = self.deliver_invalidate(owner, line);
                    if was_modified {
                        let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
                    }
                    outgoing.push(self.order_to(owner, line, clock));
                    outgoing.push(self.ack_from(owner, line, clock));
                    invalidated.push(owner);
                    outgoing.push(self.data_to(core, line, clock));
                }
            }
            MesiState::Shared => {
                let peers: Vec<usize> = entry
                    .sharers
                    .iter()
                    .copied()
                    .filter(|&s| s != core)
                    .collect();
                for peer in peers {
                    let _ = self.deliver_invalidate(peer, line);
                    outgoing.push(self.order_to(peer, line, clock));
                    outgoing.push(self.ack_from(peer, line, clock));
                    invalidated.push(peer);
                }
                if !entry.sharers.contains(&core) {
                    outgoing.push(self.data_to(core, line, clock));
                }
            }
        }
        let _ = self
            .counters
            .invalidations
            .fetch_add(invalidated.len() as u64, Ordering::Relaxed);
        entry.state = MesiState::Modified;
        entry.owner = Some(core);
        entry.sharers.clear();
        entry.dirty = true;
        granted(MesiState::Modified, invalidated)
    }

    fn handle_invalidate(
        &self,
        core: usize,
        line: Addr,
        entry: &mut DirectoryEntry,
        outgoing: &mut Vec<Message>,
        clock: u64,
    ) -> CoherenceResponse {
        let mut invalidated = Vec::new();
        let holders: Vec<usize> = entry
            .owner
            .into_iter()
            .chain(entry.sharers.iter().copied())
            .filter(|&c| c != core)
            .collect();
        for holder in holders {
            let was_modified = self.deliver_invalidate(holder, line);
            if was_modified {
                let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
            }
            outgoing.push(self.order_to(holder, line, clock));
            outgoing.push(self.ack_from(holder, line, clock));
            invalidated.push(holder);
        }
        let _ = self
            .counters
            .invalidations
            .fetch_add(invalidated.len() as u64, Ordering::Relaxed);
        entry.state = MesiState::Invalid;
        entry.owner = None;
        entry.sharers.clear();
        entry.dirty = false;
        granted(MesiState::Invalid, invalidated)
    }

    fn handle_writeback(&self, core: usize, entry: &mut DirectoryEntry) -> CoherenceResponse {
        if entry.owner != Some(core) {
            return denied(entry.state);
        }
        let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
        entry.dirty = false;
        // A written-back Modified line is clean exclusive again.
        if entry.state == MesiState::Modified {
            entry.state = MesiState::Exclusive;
        }
        granted(entry.state, Vec::new())
    }

    fn handle_share(
        &self,
        core: usize,
        line: Addr,
        entry: &mut DirectoryEntry,
        outgoing: &mut Vec<Message>,
        clock: u64,
    ) -> CoherenceResponse {
        if entry.sharers.contains(&core) {
            return granted(MesiState::Shared, Vec::new());
        }
        if entry.owner != Some(core) {
            return denied(entry.state);
        }
        if entry.dirty {
            let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
            outgoing.push(Message {
                source: core,
                dest: self.home,
                address: line,
                kind: MessageKind::DataTransfer,
                payload: self.block_bytes,
                timestamp: clock,
                hop_count: 0,
            });
        }
        let _ = self.deliver_downgrade(core, line);
        entry.state = MesiState::Shared;
        entry.owner = None;
        entry.dirty = false;
        let _ = entry.sharers.insert(core);
        granted(MesiState::Shared, Vec::new())
    }

    fn handle_flush(
        &self,
        line: Addr,
        entry: &mut DirectoryEntry,
        outgoing: &mut Vec<Message>,
        clock: u64,
    ) -> CoherenceResponse {
        let mut invalidated = Vec::new();
        let holders: Vec<usize> = entry
            .owner
            .into_iter()
            .chain(entry.sharers.iter().copied())
            .collect();
        for holder in holders {
            let was_modified = self.deliver_invalidate(holder, line);
            if was_modified {
                let _ = self.counters.writebacks.fetch_add(1, Ordering::Relaxed);
            }
            outgoing.push(self.order_to(holder, line, clock));
            invalidated.push(holder);
        }
        let _ = self
            .counters
            .invalidations
            .fetch_add(invalidated.len() as u64, Ordering::Relaxed);
        entry.state = MesiState::Invalid;
        entry.owner = None;
        entry.sharers.clear();
        entry.dirty = false;
        granted(MesiState::Invalid, invalidated)
    }

    /// Invalidates `target`'s copy; returns whether it was Modified.
    fn deliver_invalidate(&self, target: usize, line: Addr) -> bool {
        let was_modified = {
            let mut l1 = self.cores[target].l1.lock().expect("core L1 poisoned");
            l1.apply_remote_write(line).unwrap_or(false)
        };
        let _ = self.cores[target]
            .invalidations_received
            .fetch_add(1, Ordering::Relaxed);
        debug!(core = target, line = format_args!("{line:#x}"), "invalidate delivered");
        was_modified
    }

    /// Downgrades `target`'s copy to Shared; returns whether it was
    /// Modified.
    fn deliver_downgrade(&self, target: usize, line: Addr) -> bool {
        let mut l1 = self.cores[target].l1.lock().expect("core L1 poisoned");
        l1.apply_remote_read(line).unwrap_or(false)
    }

    fn data_to(&self, core: usize, line: Addr, clock: u64) -> Message {
        Message {
            source: self.home,
            dest: core,
            address: line,
            kind: MessageKind::DataTransfer,
            payload: self.block_bytes,
            timestamp: clock,
            hop_count: 0,
        }
    }

    fn order_to(&self, core: usize, line: Addr, clock: u64) -> Message {
        Message {
            source: self.home,
            dest: core,
            address: line,
            kind: MessageKind::CoherenceRequest,
            payload: 8,
            timestamp: clock,
            hop_count: 0,
        }
    }

    fn ack_from(&self, core: usize, line: Addr, clock: u64) -> Message {
        Message {
            source: core,
            dest: self.home,
            address: line,
            kind: MessageKind::Ack,
            payload: 8,
            timestamp: clock,
            hop_count: 0,
        }
    }

    fn bump_messages(&self, n: u64) {
        let _ = self
            .counters
            .coherence_messages
            .fetch_add(n, Ordering::Relaxed);
    }

    /// Read-only view of one line's directory entry.
    pub fn entry_view(&self, addr: Addr) -> Option<DirectoryEntry> {
        let line = addr & self.line_mask;
        let table = self.table.lock().expect("directory table poisoned");
        table.entries.get(&line).cloned()
    }

    /// Verifies the (state, owner, sharers, dirty) consistency of every
    /// entry. Test helper; violations in production paths panic instead.
    pub fn check_invariants(&self) -> Result<(), String> {
        let table = self.table.lock().expect("directory table poisoned");
        for (line, entry) in &table.entries {
            let ok = match entry.state {
                MesiState::Modified => {
                    entry.owner.is_some() && entry.sharers.is_empty() && entry.dirty
                }
                MesiState::Exclusive => {
                    entry.owner.is_some() && entry.sharers.is_empty() && !entry.dirty
                }
                MesiState::Shared => {
                    entry.owner.is_none() && !entry.sharers.is_empty() && !entry.dirty
                }
                MesiState::Invalid => {
                    entry.owner.is_none() && entry.sharers.is_empty() && !entry.dirty
                }
            };
            if !ok {
                return Err(format!(
                    "directory entry {line:#x} inconsistent: {entry:?}"
                ));
            }
        }
        Ok(())
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            read_requests: self.counters.read_requests.load(Ordering::Relaxed),
            write_requests: self.counters.write_requests.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            writebacks: self.counters.writebacks.load(Ordering::Relaxed),
            state_transitions: self.counters.state_transitions.load(Ordering::Relaxed),
            coherence_messages: self.counters.coherence_messages.load(Ordering::Relaxed),
        }
    }

    /// The core table (used by the system to hand slots to cores).
    pub fn core_slot(&self, core: usize) -> &Arc<CoreSlot> {
        &self.cores[core]
    }

    /// Number of cores the directory arbitrates.
    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }
}

fn granted(new_state: MesiState, invalidated: Vec<usize>) -> CoherenceResponse {
    CoherenceResponse {
        granted: true,
        new_state,
        invalidated,
        latency: 0,
    }
}

fn denied(state: MesiState) -> CoherenceResponse {
    CoherenceResponse {
        granted: false,
        new_state: state,
        invalidated: Vec::new(),
        latency: 0,
    }
}
